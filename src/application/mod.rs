pub mod artifacts;
pub mod download_job;
pub mod events;
pub mod job_host;
pub mod progress;
pub mod resume;

#[cfg(test)]
pub(crate) mod test_support;

pub use events::{ChannelSink, JobEvent};
pub use job_host::{JobHandle, JobHost, Submission};
