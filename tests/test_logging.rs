use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rss2bsky::init_logging;
use rss2bsky::services::settings::LoggingConfig;

#[test]
fn events_are_written_to_the_log_file() {
    let dir = TempDir::new().unwrap();
    let log = dir.child("logs/rss2bsky.log");
    let cfg = LoggingConfig {
        level: Some("info".into()),
        file: Some(log.path().to_str().unwrap().to_string()),
    };

    let guard = init_logging(&cfg).unwrap();
    assert!(guard.is_some());
    tracing::info!(entry_id = "post-42", "log file smoke test");
    // flushes the non-blocking writer
    drop(guard);

    log.assert(predicate::path::exists());
    log.assert(
        predicate::str::contains("log file smoke test").and(predicate::str::contains("post-42")),
    );
}
