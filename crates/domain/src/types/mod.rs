//! Request, response and option types shared by every layer.

pub mod cache;
pub mod method;
pub mod priority;
pub mod request;
pub mod response;
pub mod retry;
pub mod status;
pub mod token;

pub use cache::{CacheOptions, CacheStrategy};
pub use method::Method;
pub use priority::Priority;
pub use request::{RequestDescriptor, RequestDescriptorBuilder, RequestId, RequestOptions};
pub use response::Response;
pub use retry::{BackoffKind, RetryPolicy};
pub use status::{RequestStatus, RequestSummary};
pub use token::{LinkQuality, Token};
