//! Task event interface.

use crate::base::neterror::NetError;
use crate::http::{CacheStoragePolicy, RequestDescriptor, ResponseDescriptor};
use bytes::Bytes;

/// What to do with a redirect the task just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectAction {
    #[default]
    Follow,
    /// Treat the redirect response as the final response.
    Stop,
}

/// Receives the events of one task, in order:
/// `on_redirect`* → `on_response`? → `on_data`* → `on_complete` | `on_error`.
///
/// Exactly one terminal event is delivered unless the task is cancelled,
/// in which case nothing more is delivered at all. Callbacks run on the
/// task's runtime thread and should not block.
pub trait TaskDelegate: Send + 'static {
    /// A redirect hop. `request` is the follow-up request the task would
    /// send; `response` is the 3xx that triggered it.
    fn on_redirect(
        &mut self,
        _request: &RequestDescriptor,
        _response: &ResponseDescriptor,
    ) -> RedirectAction {
        RedirectAction::Follow
    }

    fn on_response(&mut self, response: &ResponseDescriptor, cache_policy: CacheStoragePolicy);

    fn on_data(&mut self, chunk: Bytes);

    fn on_complete(&mut self);

    fn on_error(&mut self, error: NetError);
}
