/// The lifecycle state of a request task.
///
/// `Created → Resolving → Connecting → HeadersReceived → Streaming → Completed`,
/// with `Cancelled` and `Failed` reachable from any non-terminal state. A
/// followed redirect loops back to `Resolving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Created,

    /// Consulting the interception policy for the current hop.
    Resolving,

    /// Opening the transport connection and sending the request.
    Connecting,

    /// Response head received, cookies captured.
    HeadersReceived,

    /// Delivering the response body.
    Streaming,

    Completed,
    Cancelled,
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadState::Completed | LoadState::Cancelled | LoadState::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Cancelled | Failed => true,
            Resolving => matches!(self, Created | HeadersReceived),
            Connecting => self == Resolving,
            HeadersReceived => self == Connecting,
            Streaming => self == HeadersReceived,
            Completed => matches!(self, HeadersReceived | Streaming),
            Created => false,
        }
    }
}
