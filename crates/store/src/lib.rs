pub mod audit;
pub mod content;
pub mod db;
pub mod error;
pub mod metadata;
pub mod models;
pub mod publisher;
pub mod queue;

pub use error::StoreError;
pub use models::*;
pub use queue::TransitionUpdate;
