//! Service plumbing shared by LookEscolar services.

pub mod batch;
pub mod config;
pub mod middleware;
pub mod retry;
pub mod serde;
pub mod tracing;
