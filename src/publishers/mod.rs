pub mod bluesky;
pub mod console;
pub mod utils;
