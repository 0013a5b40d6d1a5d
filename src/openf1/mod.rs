//! OpenF1 API access: one fetch per upstream resource, cached and retried.

pub mod api_types;
mod client;
mod endpoint;
mod error;
mod params;
mod retry;

pub use client::{volatility_of, ClientSettings, OpenF1Client};
pub use endpoint::Endpoint;
pub use error::{Classify, ClientError, FailureKind, FetchError};
pub use params::{QueryParams, DATE_AFTER};
pub use retry::{RetryError, RetryPolicy};
