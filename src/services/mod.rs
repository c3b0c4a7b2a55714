pub mod crawler;
pub mod dedup;
pub mod embed;
pub mod link_metadata;
pub mod publisher;
pub mod rich_text;
pub mod settings;
pub mod worker;
