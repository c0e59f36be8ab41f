//! Request tasks.
//!
//! A [`RequestTask`] owns one request and its redirect chain, reporting
//! progress to a [`TaskDelegate`]. Tasks of the same dispatcher share a
//! [`RequestContext`].

pub mod context;
pub mod delegate;
pub mod job;

pub use context::{RequestContext, RequestContextConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
pub use delegate::{RedirectAction, TaskDelegate};
pub use job::{RequestTask, TaskHandle};
