pub mod feed_source;
pub mod social_api;
