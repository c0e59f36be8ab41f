pub mod cachepolicy;
pub mod canonical;
pub mod redirect;
pub mod request;
pub mod requestbody;
pub mod response;
pub mod responsebody;

// Re-exports for convenience
pub use cachepolicy::{storage_policy, CacheStoragePolicy};
pub use canonical::canonicalize;
pub use request::{BodyMode, RequestDescriptor};
pub use requestbody::{HttpBody, OneShotStream, RequestBody};
pub use response::ResponseDescriptor;
pub use responsebody::ResponseBody;
