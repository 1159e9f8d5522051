//! Job model, the bounded job queue shared by the workers, and the URL list
//! reader that produces the jobs.

pub mod job;
pub mod queue;
pub mod source;
