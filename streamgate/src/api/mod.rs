//! Shared HTTP error-response plumbing.
//!
//! The actual gateway routes and middleware chain live in [`crate::gateway`];
//! this module just carries `ApiError`, the uniform `Error` → HTTP-response
//! mapping every handler in `gateway` returns through.

pub mod error;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
