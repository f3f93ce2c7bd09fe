//! flume-water — async client for the Flume water-monitor cloud API.
//!
//! Manages an OAuth-style access/refresh token pair with expiry tracking,
//! guarantees concurrent callers never trigger redundant token requests,
//! wraps outbound calls so they are transparently (re-)authorized, and
//! classifies the service's inconsistent response envelope into a small set
//! of actionable error kinds.
//!
//! # Quick Start
//!
//! ```no_run
//! use flume_water::{FlumeClient, FlumeConfig};
//!
//! # async fn example() -> flume_water::Result<()> {
//! let config = FlumeConfig::from_env().expect("FLUME_* environment variables");
//! let client = FlumeClient::new(config)?;
//!
//! let devices = client.list_devices().await?;
//! let gallons = client.get_water_usage(&devices[0].id, 15).await?;
//! println!("water used in the last 15 minutes: {gallons}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod prelude;

pub use api::{Device, DeviceType, FlumeClient, RequestDescriptor};
pub use config::{ConfigError, FlumeConfig};
pub use error::{ApiError, Result};
