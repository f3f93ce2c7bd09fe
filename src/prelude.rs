//! Convenience re-exports for the common path.

pub use crate::api::{Device, DeviceType, FlumeClient, RequestDescriptor};
pub use crate::auth::Authorizer;
pub use crate::config::FlumeConfig;
pub use crate::error::{ApiError, Result};
