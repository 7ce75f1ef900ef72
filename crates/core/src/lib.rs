pub mod config;
pub mod error;
pub mod url;

pub use config::Config;
pub use error::CoreError;
