use crate::domain::command_map::CommandMap;
use crate::domain::direction::{ActiveDirections, Direction};
use crate::domain::error::ControlError;
use crate::domain::models::{
    AppEvent, ConnectionStatus, MessageSeverity, PairedDevice, StatusMessage,
};
use crate::domain::protocol;
use crate::domain::store::KeyValueStore;
use crate::domain::transport::ByteStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Owns the connection handle, the held directions and the command map.
///
/// All methods are synchronous and expected to run on one control loop; the
/// suspending part of connecting lives outside and reports back through
/// [`Controller::finish_connect`].
pub struct Controller<S: ByteStream> {
    status: ConnectionStatus,
    link: Option<S>,
    active: ActiveDirections,
    indicated: Option<Direction>,
    commands: CommandMap,
    store: Box<dyn KeyValueStore>,
    speed: f32,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl<S: ByteStream> Controller<S> {
    pub fn new(store: Box<dyn KeyValueStore>, event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        let commands = CommandMap::load(store.as_ref());
        Self {
            status: ConnectionStatus::Disconnected,
            link: None,
            active: ActiveDirections::new(),
            indicated: None,
            commands,
            store,
            speed: 0.0,
            event_sender,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.link.is_some()
    }

    pub fn active_directions(&self) -> &ActiveDirections {
        &self.active
    }

    pub fn indicated_direction(&self) -> Option<Direction> {
        self.active.indicated()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn command_code(&self, direction: Direction) -> char {
        self.commands.code(direction)
    }

    // ---- connection lifecycle ----

    /// Busy guard for the connect sequence. On success the controller is
    /// `Connecting` until [`finish_connect`](Self::finish_connect) is called.
    pub fn begin_connect(&mut self) -> Result<(), ControlError> {
        match self.status {
            ConnectionStatus::Connecting => {
                debug!("Ignoring connect request: attempt already in flight");
                Err(ControlError::ConnectInProgress)
            }
            ConnectionStatus::Connected => {
                debug!("Ignoring connect request: already connected");
                Err(ControlError::AlreadyConnected)
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => {
                info!("Starting connection attempt");
                self.set_status(ConnectionStatus::Connecting);
                self.send_log("Looking for paired devices...", MessageSeverity::Info);
                Ok(())
            }
        }
    }

    /// Apply the outcome of a connect attempt started with `begin_connect`.
    pub fn finish_connect(&mut self, outcome: Result<(PairedDevice, S), ControlError>) {
        match outcome {
            Ok((device, mut stream)) => {
                if self.status != ConnectionStatus::Connecting || self.link.is_some() {
                    warn!("Discarding stream to {}: no attempt pending", device.address);
                    stream.close();
                    return;
                }
                info!("Connected to {} ({})", device.name, device.address);
                self.link = Some(stream);
                self.set_status(ConnectionStatus::Connected);
                self.send_log(format!("Connected to {}", device.name), MessageSeverity::Success);
            }
            Err(ControlError::NoDeviceSelected) => {
                info!("Connect attempt ended without a device selection");
                self.set_status(ConnectionStatus::Disconnected);
                self.send_log(ControlError::NoDeviceSelected.to_string(), MessageSeverity::Info);
            }
            Err(e) => {
                warn!("Connect attempt failed: {}", e);
                self.set_status(ConnectionStatus::Failed);
                self.send_log(e.to_string(), MessageSeverity::Error);
            }
        }
    }

    /// Close the connection if there is one. No-op otherwise.
    pub fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        link.close();
        info!("Disconnected from device");
        self.set_status(ConnectionStatus::Disconnected);
        self.send_log("Disconnected from device", MessageSeverity::Info);
    }

    /// Release everything the controller holds. Must be called by whoever
    /// owns the controller before it goes away.
    pub fn shutdown(&mut self) {
        if let Some(mut link) = self.link.take() {
            info!("Closing connection on shutdown");
            link.close();
        }
        self.status = ConnectionStatus::Disconnected;
    }

    // ---- direction input ----

    /// Start holding `direction`. Sends its code only on the transition from
    /// not held to held.
    pub fn press(&mut self, direction: Direction) {
        if self.active.insert(direction) {
            trace!("Pressed {}", direction);
            self.send_command(direction);
        }
        self.publish_indicator();
    }

    /// Stop holding `direction`. Never transmits.
    pub fn release(&mut self, direction: Direction) {
        if self.active.remove(direction) {
            trace!("Released {}", direction);
        }
        self.publish_indicator();
    }

    /// Cancel every held input, e.g. when the input surface loses focus.
    pub fn release_all(&mut self) {
        self.active.clear();
        self.publish_indicator();
    }

    // ---- transmission ----

    /// Send the code mapped to `direction`. Dropped silently while not connected.
    pub fn send_command(&mut self, direction: Direction) {
        let code = self.commands.code(direction);
        self.write(&protocol::encode_command(code));
    }

    /// Send `v<percent>` for a normalized speed. Dropped silently while not connected.
    pub fn send_speed(&mut self, value: f32) {
        self.write(&protocol::encode_speed(value));
    }

    /// Record a speed change from the user and transmit it.
    pub fn set_speed(&mut self, value: f32) {
        self.speed = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let _ = self
            .event_sender
            .send(AppEvent::SpeedChanged(protocol::speed_percent(self.speed)));
        self.send_speed(self.speed);
    }

    // ---- customization ----

    pub fn set_command_code(&mut self, direction: Direction, code: char) -> Result<(), ControlError> {
        self.commands.set(direction, code, self.store.as_mut())?;
        info!("Mapped {} to {:?}", direction, code);
        Ok(())
    }

    pub fn reset_command_codes(&mut self) -> Result<(), ControlError> {
        self.commands.reset(self.store.as_mut())?;
        info!("Restored default command codes");
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) {
        if self.status != ConnectionStatus::Connected {
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };
        trace!("Sending {:?}", String::from_utf8_lossy(bytes));
        if let Err(e) = link.write(bytes) {
            warn!("Write failed: {}", e);
            self.send_log(format!("Send failed: {}", e), MessageSeverity::Warning);
        }
    }

    fn publish_indicator(&mut self) {
        let indicated = self.active.indicated();
        if indicated != self.indicated {
            self.indicated = indicated;
            let _ = self.event_sender.send(AppEvent::IndicatorChanged(indicated));
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        let _ = self.event_sender.send(AppEvent::ConnectionStatus(status));
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

impl<S: ByteStream> Drop for Controller<S> {
    fn drop(&mut self) {
        if let Some(mut link) = self.link.take() {
            warn!("Controller dropped without shutdown; closing connection");
            link.close();
        }
    }
}
