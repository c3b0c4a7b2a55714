#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};
use tera::{Context, Tera};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";
/// Raw-codec CID of `IMAGE_BYTES`, as the blob store would report it.
pub const BLOB_CID: &str = "bafkreie4alwbdx4dketusfzpagoczokskyk4tub7omgc5f52cy4i3tm3wq";
pub const POST_CID: &str = "bafyreidsemiehpaya7tpoqfsgxvxkepmwmzfljvdovbvmmiznxuks5injm";
const TIMELINE_CID: &str = "bafyreieu2gjlhizgxypqdg3r54j6uwrwp77jhhc6tkepdmtq4u3vhwkwti";
const ACCOUNT: &str = "did:plc:testaccount";

fn resource(rel: &str) -> String {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources").join(rel);
    fs::read_to_string(p).unwrap()
}

fn render(name: &str, tpl: &str, ctx: &Context) -> String {
    let mut tera = Tera::default();
    tera.add_raw_template(name, tpl).unwrap();
    tera.render(name, ctx).unwrap()
}

pub fn read_feed(base: &str) -> String {
    let mut ctx = Context::new();
    ctx.insert("base", base);
    render("feed", &resource("mocks/feed.xml"), &ctx)
}

/// Knobs of the rendered `configs/bluesky.yaml`.
pub struct TestConfig {
    pub offline: bool,
    pub strict_watermark: bool,
    pub image_source: &'static str,
    pub link_preview: &'static str,
    pub password: Option<&'static str>,
    pub log_file: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            offline: false,
            strict_watermark: false,
            image_source: "description",
            link_preview: "page",
            password: Some("app-secret"),
            log_file: None,
        }
    }
}

pub fn render_config(base: &str, cfg: &TestConfig) -> tempfile::NamedTempFile {
    let mut ctx = Context::new();
    ctx.insert("base", base);
    ctx.insert("offline", &cfg.offline);
    ctx.insert("strict_watermark", &cfg.strict_watermark);
    ctx.insert("image_source", cfg.image_source);
    ctx.insert("link_preview", cfg.link_preview);
    ctx.insert("password", &cfg.password);
    ctx.insert("log_file", &cfg.log_file);
    let config_text = render("cfg", &resource("configs/bluesky.yaml"), &ctx);
    let cfg_file = tempfile::NamedTempFile::new().unwrap();
    fs::write(cfg_file.path(), config_text).unwrap();
    cfg_file
}

pub async fn mount_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(read_feed(&server.uri())),
        )
        .mount(server)
        .await;
}

pub async fn mount_feed_error(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

/// /posts/3 has Open Graph tags, /posts/2 only plain meta, /posts/1 is gone.
pub async fn mount_pages(server: &MockServer) {
    for (p, file) in [("/posts/3", "mocks/page3.html"), ("/posts/2", "mocks/page2.html")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(resource(file)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/posts/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub async fn mount_image(server: &MockServer) {
    mount_image_as(server, "image/png").await;
}

/// Serves the full-size asset of post 3 under the given content type.
pub async fn mount_image_as(server: &MockServer, content_type: &str) {
    Mock::given(method("GET"))
        .and(path("/img/third_full.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_bytes(IMAGE_BYTES),
        )
        .mount(server)
        .await;
}

pub async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "did": ACCOUNT,
            "handle": "me.bsky.social",
            "accessJwt": "access-jwt",
            "refreshJwt": "refresh-jwt"
        })))
        .mount(server)
        .await;
}

pub fn timeline_post(created_at: &str, repost: bool, reply: bool) -> Value {
    let mut record = json!({ "$type": "app.bsky.feed.post", "text": "x", "createdAt": created_at });
    if reply {
        let parent = json!({
            "uri": format!("at://{}/app.bsky.feed.post/parent", ACCOUNT),
            "cid": TIMELINE_CID
        });
        record["reply"] = json!({ "root": parent.clone(), "parent": parent });
    }
    let mut item = json!({
        "post": {
            "uri": format!("at://{}/app.bsky.feed.post/x", ACCOUNT),
            "cid": TIMELINE_CID,
            "author": { "did": ACCOUNT, "handle": "me.bsky.social" },
            "record": record,
            "indexedAt": created_at
        }
    });
    if repost {
        item["reason"] = json!({
            "$type": "app.bsky.feed.defs#reasonRepost",
            "by": { "did": "did:plc:someoneelse", "handle": "other.bsky.social" },
            "indexedAt": created_at
        });
    }
    item
}

pub async fn mount_timeline(server: &MockServer, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "feed": items })))
        .mount(server)
        .await;
}

pub async fn mount_timeline_error(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(server)
        .await;
}

pub async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blob": {
                "$type": "blob",
                "ref": { "$link": BLOB_CID },
                "mimeType": "image/png",
                "size": IMAGE_BYTES.len()
            }
        })))
        .mount(server)
        .await;
}

pub async fn mount_upload_error(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .respond_with(ResponseTemplate::new(500).set_body_string("blob store unavailable"))
        .mount(server)
        .await;
}

pub async fn mount_create_record(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": format!("at://{}/app.bsky.feed.post/3kabc", ACCOUNT),
            "cid": POST_CID
        })))
        .mount(server)
        .await;
}

/// Everything a successful run touches, with the given timeline.
pub async fn mount_happy_path(server: &MockServer, timeline: Vec<Value>) {
    mount_feed(server).await;
    mount_pages(server).await;
    mount_image(server).await;
    mount_session(server).await;
    mount_timeline(server, timeline).await;
    mount_upload(server).await;
    mount_create_record(server).await;
}

pub async fn requests_to(server: &MockServer, endpoint: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == endpoint)
        .collect()
}

pub async fn xrpc_calls(server: &MockServer, nsid: &str) -> Vec<Request> {
    requests_to(server, &format!("/xrpc/{}", nsid)).await
}

/// The `record` objects of every createRecord call, in order.
pub async fn posted_records(server: &MockServer) -> Vec<Value> {
    xrpc_calls(server, "com.atproto.repo.createRecord")
        .await
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["record"].clone()
        })
        .collect()
}
