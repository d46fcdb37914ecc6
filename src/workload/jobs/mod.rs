//! # Jobs
//!
//! Tasks run as Jobs.
//!
//! - `convert.rs` - Task to Job mapping
//! - `desire.rs` - Job creation
//! - `status.rs` - task status derived from the Job status

mod convert;
mod desire;
mod status;

pub use convert::{TaskToJob, TaskToJobConverter};
pub use desire::{JobDesirer, TaskDesirer};
pub use status::job_status;
