use crate::domain::direction::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// A device the transport can open a byte stream to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub name: String,
    pub address: String,
}

impl PairedDevice {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() {
                "Unknown".to_string()
            } else {
                name
            },
            address: address.into(),
        }
    }
}

/// Notifications from the controller to whatever is presenting it.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
    /// The control that should blink, if any.
    IndicatorChanged(Option<Direction>),
    /// A connect attempt is waiting for the user to pick one of these.
    ChooseDevice(Vec<PairedDevice>),
    SpeedChanged(u8),
}

/// Input to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Connect,
    Disconnect,
    /// Answer to [`AppEvent::ChooseDevice`]; `None` declines.
    SelectDevice(Option<String>),
    Press(Direction),
    Release(Direction),
    ReleaseAll,
    SetSpeed(f32),
    Remap(Direction, char),
    ResetKeys,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
