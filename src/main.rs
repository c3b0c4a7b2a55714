use clap::Parser;
use dotenv::dotenv;
use rss2bsky::run_with_config_path;

/// rss2bsky - републикация новых записей RSS/Atom ленты в Bluesky
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Dry run: print posts instead of sending them
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from `.env` file into std::env (optional)
    dotenv().ok();

    let args = Args::parse();
    run_with_config_path(&args.config, args.offline).await?;
    Ok(())
}
