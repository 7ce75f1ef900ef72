//! Domain-focused API endpoint modules.
//!
//! Each sub-module owns one responsibility area; the router imports the flat
//! `api::foo` names re-exported here.

mod blogs;
mod health;
mod jobs;
mod publishers;
mod qa;
mod questions;

pub use blogs::{blog_delete, blog_inspect};
pub use health::{health, metrics};
pub use jobs::{
    job_cancel, job_failures, job_history, job_process, job_recent, job_stats, job_status,
};
pub use publishers::{
    publisher_audit, publisher_create, publisher_delete, publisher_get, publisher_list,
    publisher_queue, publisher_regenerate_key, publisher_update,
};
pub use qa::qa_ask;
pub use questions::{check_and_load, questions_by_url};
