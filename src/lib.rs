pub mod config;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod jvm;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod scraper;
pub mod store;

pub use error::{Result, ScrapeError};
pub use model::{ExtractedRecord, Link, Value};
pub use store::Dataset;
