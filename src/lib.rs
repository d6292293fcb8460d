//! `manapool-http` is an async HTTP client for the Manapool seller API.
//!
//! Every call goes through [`ManapoolClient::execute`], which rate limits,
//! retries transient failures with exponential backoff, honors a
//! [`CancellationToken`] and classifies failures into [`ManapoolError`].
//! Typed operations built on top of it:
//! - [`ManapoolClient::seller_account`]
//! - [`ManapoolClient::seller_inventory`]

mod backoff;
mod cancel;
mod classify;
mod client;
mod decode;
mod error;
mod logger;
mod options;
mod rate_limit;
mod request;
mod timestamp;
mod types;

pub use backoff::{BackoffPolicy, RetryAfter};
pub use cancel::CancellationToken;
pub use classify::is_retryable_status;
pub use client::{ManapoolClient, ACCESS_TOKEN_HEADER, EMAIL_HEADER};
pub use error::{ApiError, ManapoolError, NetworkCause, NetworkError, ValidationError};
#[cfg(feature = "tracing")]
pub use logger::TracingLogger;
pub use logger::{Logger, NoopLogger};
pub use options::{ClientOptions, DEFAULT_BASE_URL};
pub use rate_limit::{AcquireCancelled, RateLimiter};
pub use request::RequestDescriptor;
pub use timestamp::{Timestamp, TimestampError};
pub use types::{
    Account, InventoryItem, InventoryOptions, InventoryResponse, Pagination, Product, Sealed,
    Single, MAX_INVENTORY_LIMIT,
};

pub type Result<T> = std::result::Result<T, ManapoolError>;
