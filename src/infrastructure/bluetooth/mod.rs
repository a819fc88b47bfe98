//! Bluetooth Module
//!
//! BLE implementation of the [`Transport`](crate::domain::transport::Transport)
//! collaborator, for cars driven through a serial-over-BLE module
//! (HM-10, HC-08, JDY-08 and similar).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      BleTransport                        │
//! │        (Transport impl handed to the session loop)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - device  │  │ - connect  │  │ - UUIDs  │
//! │   listing │  │ - writer   │  │ - char   │
//! │           │  │   task     │  │   choice │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs and serial characteristic selection
//! - [`scanner`] - bounded device discovery
//! - [`connection`] - connect, and the byte stream with its writer task
//! - [`service`] - the transport tying them together

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;

pub use service::BleTransport;

use crate::domain::transport::TransportError;

impl From<btleplug::Error> for TransportError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::PermissionDenied => TransportError::PermissionDenied,
            btleplug::Error::DeviceNotFound => TransportError::DeviceNotFound("unknown".to_string()),
            btleplug::Error::NotConnected => TransportError::Closed,
            other => TransportError::Backend(other.to_string()),
        }
    }
}
