//! Worker pool orchestration: the supervisor owning worker lifecycles, the
//! per-worker job loop, and the completion tracker behind `join`.

pub mod completion;
pub mod supervisor;
pub mod worker;
