//! Request context: the collaborators every task of one dispatcher shares.

use crate::cookies::CookieStore;
use crate::http::BodyMode;
use crate::policy::InterceptionPolicy;
use crate::socket::Transport;
use std::sync::Arc;
use std::time::Duration;

/// Chromium's default redirect limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Limits applied to every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContextConfig {
    /// Redirect hops a task may follow before failing.
    pub max_redirects: usize,
    /// Deadline for requests that carry no timeout of their own.
    pub default_timeout: Duration,
    pub default_body_mode: BodyMode,
}

impl Default for RequestContextConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_timeout: DEFAULT_TIMEOUT,
            default_body_mode: BodyMode::Streaming,
        }
    }
}

/// Shared collaborators handed to each [`RequestTask`](super::RequestTask).
///
/// Cheap to clone; clones share the same store, policy and transport.
#[derive(Clone)]
pub struct RequestContext {
    pub transport: Arc<dyn Transport>,
    pub policy: Arc<dyn InterceptionPolicy>,
    pub cookie_store: Arc<CookieStore>,
    pub config: RequestContextConfig,
}

impl RequestContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: Arc<dyn InterceptionPolicy>,
        cookie_store: Arc<CookieStore>,
    ) -> Self {
        Self {
            transport,
            policy,
            cookie_store,
            config: RequestContextConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RequestContextConfig) -> Self {
        self.config = config;
        self
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("cookie_store", &self.cookie_store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
