//! Retry and backoff policy.
//!
//! One policy object shared by every retrying call site: it owns the attempt
//! limit, the exponential backoff curve, and (through [`ErrorKind`]) the
//! decision of which failures are worth another attempt.

mod policy;
mod run;

pub use policy::{ErrorKind, RetryDecision, RetryPolicy, Retryable};
pub use run::run_with_retry_and_sleep;
