//! Collaborator traits for the Bluetooth link.
//!
//! The controller never talks to a Bluetooth stack directly. It enumerates
//! devices and opens a stream through a [`Transport`], then owns the returned
//! [`ByteStream`] until it is closed.

use crate::domain::models::PairedDevice;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Bluetooth permission denied")]
    PermissionDenied,
    #[error("no Bluetooth adapter available")]
    NoAdapter,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("device has no writable serial characteristic")]
    NoWritableCharacteristic,
    #[error("connection closed")]
    Closed,
    #[error("{0}")]
    Backend(String),
}

/// An open byte-stream connection to the vehicle.
///
/// `write` must not block the caller; implementations queue or write
/// immediately. `close` may be called more than once and only the first call
/// releases the underlying connection.
pub trait ByteStream: Send + 'static {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    fn close(&mut self);
}

pub trait Transport: Send + Sync + 'static {
    type Stream: ByteStream;

    /// Devices the user may pick from.
    fn paired_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<PairedDevice>, TransportError>> + Send;

    /// Open a byte stream to `address`. Called at most once per connect attempt.
    fn open(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;

    /// Resolves once every closed stream has finished releasing its device.
    /// `close` only starts the release on transports that disconnect in the
    /// background.
    fn wait_released(&self) -> impl Future<Output = ()> + Send;
}
