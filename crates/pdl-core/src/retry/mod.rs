//! Part failures, their classification, and the backoff applied before a
//! worker returns to the part table after a failure.
//!
//! The retry cap itself lives in the part table (`retry_count` per part);
//! this module only decides how long to wait and how to label an error.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::PartError;
pub use policy::{ErrorKind, RetryPolicy};
