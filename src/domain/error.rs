use crate::domain::store::StorageError;
use crate::domain::transport::TransportError;

/// Why a controller operation did not go through. None of these are fatal;
/// each leaves the controller in a state from which the user can try again.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Bluetooth permission denied")]
    PermissionDenied,
    #[error("No paired devices found")]
    NoPairedDevices,
    #[error("no device selected")]
    NoDeviceSelected,
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("A connection attempt is already in progress")]
    ConnectInProgress,
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Command code {0:?} is not a single ASCII character")]
    NonAsciiCode(char),
    #[error("Could not save controls: {0}")]
    Storage(#[from] StorageError),
}

impl From<TransportError> for ControlError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PermissionDenied => Self::PermissionDenied,
            other => Self::ConnectFailed(other.to_string()),
        }
    }
}
