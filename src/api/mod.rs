//! Device API facade and the authorized request pipeline beneath it.

pub mod client;
pub mod request;
pub mod types;

pub use client::FlumeClient;
pub use request::{Method, RequestDescriptor};
pub use types::{Device, DeviceType, Location, UsageQueryResult, UsageSample};
