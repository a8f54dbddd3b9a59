pub mod get_errors;
pub mod get_job;
pub mod list_jobs;

pub use get_errors::{GetErrorsError, GetErrorsQuery, GetErrorsResponse};
pub use get_job::{GetJobError, GetJobQuery};
pub use list_jobs::{ListJobsError, ListJobsQuery, ListJobsResponse};
