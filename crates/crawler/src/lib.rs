pub mod error;
pub mod extract;
pub mod fetch;

pub use error::CrawlError;
pub use extract::{extract, Extracted};
pub use fetch::{CrawledPage, Crawler};
