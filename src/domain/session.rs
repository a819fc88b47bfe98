//! Session Loop
//!
//! Serializes every external event onto the [`Controller`]. The only step
//! that suspends, the connect sequence, runs as its own task so presses and
//! speed changes keep flowing while the controller is `Connecting`:
//!
//! ```text
//! RemoteCommand ──► Session ──► Controller ──► ByteStream
//!                     │  ▲
//!          spawn      │  │ (device, stream) | ControlError
//!                     ▼  │
//!               connect attempt ──► Transport
//!                     │  ▲
//!     ChooseDevice ◄──┘  └── SelectDevice
//! ```

use crate::domain::controller::Controller;
use crate::domain::error::ControlError;
use crate::domain::models::{AppEvent, MessageSeverity, PairedDevice, RemoteCommand, StatusMessage};
use crate::domain::store::KeyValueStore;
use crate::domain::transport::Transport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

type ConnectOutcome<S> = Result<(PairedDevice, S), ControlError>;

pub struct Session<T: Transport> {
    transport: Arc<T>,
    controller: Controller<T::Stream>,
    commands: mpsc::UnboundedReceiver<RemoteCommand>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    pending_selection: Option<oneshot::Sender<Option<String>>>,
    attempt: Option<JoinHandle<ConnectOutcome<T::Stream>>>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: Arc<T>,
        store: Box<dyn KeyValueStore>,
        commands: mpsc::UnboundedReceiver<RemoteCommand>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            transport,
            controller: Controller::new(store, event_sender.clone()),
            commands,
            event_sender,
            pending_selection: None,
            attempt: None,
        }
    }

    /// Run until `Shutdown` arrives or every command sender is dropped.
    /// The connection, if any, is closed and released before returning.
    pub async fn run(mut self) {
        info!("Session started");
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(RemoteCommand::Shutdown) | None => break,
                        Some(command) => self.handle(command),
                    }
                }
                joined = wait_for(&mut self.attempt), if self.attempt.is_some() => {
                    self.attempt = None;
                    self.pending_selection = None;
                    let outcome = joined.unwrap_or_else(|e| {
                        Err(ControlError::ConnectFailed(format!("connect task ended: {}", e)))
                    });
                    self.controller.finish_connect(outcome);
                }
            }
        }
        self.shutdown();
        self.transport.wait_released().await;
        info!("Session stopped");
    }

    fn handle(&mut self, command: RemoteCommand) {
        debug!("Handling {:?}", command);
        match command {
            RemoteCommand::Connect => self.connect(),
            RemoteCommand::Disconnect => self.controller.disconnect(),
            RemoteCommand::SelectDevice(choice) => match self.pending_selection.take() {
                Some(reply) => {
                    let _ = reply.send(choice);
                }
                None => debug!("No device choice pending; ignoring selection"),
            },
            RemoteCommand::Press(direction) => self.controller.press(direction),
            RemoteCommand::Release(direction) => self.controller.release(direction),
            RemoteCommand::ReleaseAll => self.controller.release_all(),
            RemoteCommand::SetSpeed(value) => self.controller.set_speed(value),
            RemoteCommand::Remap(direction, code) => {
                if let Err(e) = self.controller.set_command_code(direction, code) {
                    error!("Failed to remap {}: {}", direction, e);
                    self.send_log(e.to_string(), MessageSeverity::Error);
                }
            }
            RemoteCommand::ResetKeys => {
                if let Err(e) = self.controller.reset_command_codes() {
                    error!("Failed to reset keys: {}", e);
                    self.send_log(e.to_string(), MessageSeverity::Error);
                }
            }
            RemoteCommand::Shutdown => {}
        }
    }

    fn connect(&mut self) {
        if let Err(e) = self.controller.begin_connect() {
            self.send_log(e.to_string(), MessageSeverity::Warning);
            return;
        }
        let (reply, selection) = oneshot::channel();
        self.pending_selection = Some(reply);
        self.attempt = Some(tokio::spawn(attempt_connect(
            self.transport.clone(),
            self.event_sender.clone(),
            selection,
        )));
    }

    fn shutdown(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            info!("Abandoning in-flight connect attempt");
            attempt.abort();
        }
        self.pending_selection = None;
        self.controller.shutdown();
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

async fn wait_for<O>(attempt: &mut Option<JoinHandle<O>>) -> Result<O, JoinError> {
    match attempt {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Enumerate, ask the user, open once. No retries.
async fn attempt_connect<T: Transport>(
    transport: Arc<T>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    selection: oneshot::Receiver<Option<String>>,
) -> ConnectOutcome<T::Stream> {
    let devices = transport.paired_devices().await?;
    if devices.is_empty() {
        return Err(ControlError::NoPairedDevices);
    }
    info!("Found {} device(s)", devices.len());

    let _ = event_sender.send(AppEvent::ChooseDevice(devices.clone()));
    // A dropped reply sender means nobody will ever answer.
    let address = selection
        .await
        .ok()
        .flatten()
        .ok_or(ControlError::NoDeviceSelected)?;

    let device = devices
        .into_iter()
        .find(|d| d.address.eq_ignore_ascii_case(&address))
        .unwrap_or_else(|| {
            warn!("Selected address {} was not in the device list", address);
            PairedDevice::new("", address.clone())
        });

    info!("Opening connection to {}", device.address);
    let stream = transport.open(&device.address).await?;
    Ok((device, stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::controller::tests::RecordingStream;
    use crate::domain::direction::Direction;
    use crate::domain::models::ConnectionStatus;
    use crate::domain::transport::TransportError;
    use crate::infrastructure::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Default)]
    struct MockTransport {
        devices: Vec<PairedDevice>,
        deny_permission: bool,
        fail_open: bool,
        opens: AtomicUsize,
        stream: RecordingStream,
        closes_at_release: std::sync::Mutex<Option<usize>>,
    }

    impl MockTransport {
        fn with_car() -> Self {
            Self {
                devices: vec![PairedDevice::new("RC Car", "AA:BB:CC:DD:EE:FF")],
                ..Default::default()
            }
        }
    }

    impl Transport for MockTransport {
        type Stream = RecordingStream;

        async fn paired_devices(&self) -> Result<Vec<PairedDevice>, TransportError> {
            if self.deny_permission {
                return Err(TransportError::PermissionDenied);
            }
            Ok(self.devices.clone())
        }

        async fn open(&self, address: &str) -> Result<RecordingStream, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(TransportError::DeviceNotFound(address.to_string()));
            }
            Ok(self.stream.clone())
        }

        async fn wait_released(&self) {
            *self.closes_at_release.lock().unwrap() = Some(self.stream.close_count());
        }
    }

    struct Harness {
        commands: mpsc::UnboundedSender<RemoteCommand>,
        events: mpsc::UnboundedReceiver<AppEvent>,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn start(transport: Arc<MockTransport>, store: MemoryStore) -> Self {
            let (commands, command_rx) = mpsc::unbounded_channel();
            let (event_tx, events) = mpsc::unbounded_channel();
            let session = Session::new(transport, Box::new(store), command_rx, event_tx);
            Self {
                commands,
                events,
                task: tokio::spawn(session.run()),
            }
        }

        fn send(&self, command: RemoteCommand) {
            self.commands.send(command).unwrap();
        }

        /// Wait for the first event matching `pick`.
        async fn expect<R>(&mut self, mut pick: impl FnMut(&AppEvent) -> Option<R>) -> R {
            timeout(Duration::from_secs(2), async {
                loop {
                    let event = self.events.recv().await.expect("session ended");
                    if let Some(found) = pick(&event) {
                        return found;
                    }
                }
            })
            .await
            .expect("timed out waiting for event")
        }

        async fn expect_status(&mut self, wanted: ConnectionStatus) {
            self.expect(|e| match e {
                AppEvent::ConnectionStatus(s) if *s == wanted => Some(()),
                _ => None,
            })
            .await
        }

        async fn stop(self) {
            self.send(RemoteCommand::Shutdown);
            timeout(Duration::from_secs(2), self.task)
                .await
                .expect("session did not stop")
                .unwrap();
        }
    }

    async fn connect(harness: &mut Harness) {
        harness.send(RemoteCommand::Connect);
        let devices = harness
            .expect(|e| match e {
                AppEvent::ChooseDevice(d) => Some(d.clone()),
                _ => None,
            })
            .await;
        harness.send(RemoteCommand::SelectDevice(Some(devices[0].address.clone())));
        harness.expect_status(ConnectionStatus::Connected).await;
    }

    #[tokio::test]
    async fn test_connect_and_drive() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());
        connect(&mut harness).await;

        harness.send(RemoteCommand::Press(Direction::Forward));
        harness.send(RemoteCommand::Press(Direction::Forward));
        harness.send(RemoteCommand::SetSpeed(0.5));
        harness.expect(|e| matches!(e, AppEvent::SpeedChanged(50)).then_some(())).await;
        harness.stop().await;

        assert_eq!(transport.stream.sent(), vec!["f", "v50"]);
        assert_eq!(transport.stream.close_count(), 1);
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_awaited_after_close() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());
        connect(&mut harness).await;
        assert_eq!(*transport.closes_at_release.lock().unwrap(), None);

        harness.stop().await;
        assert_eq!(*transport.closes_at_release.lock().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_second_connect_while_connecting_ignored() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());

        harness.send(RemoteCommand::Connect);
        harness
            .expect(|e| matches!(e, AppEvent::ChooseDevice(_)).then_some(()))
            .await;
        harness.send(RemoteCommand::Connect);
        harness
            .expect(|e| match e {
                AppEvent::LogMessage(m) if m.severity == MessageSeverity::Warning => Some(()),
                _ => None,
            })
            .await;

        harness.send(RemoteCommand::SelectDevice(Some("aa:bb:cc:dd:ee:ff".into())));
        harness.expect_status(ConnectionStatus::Connected).await;
        harness.stop().await;

        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_presses_flow_while_connecting() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());

        harness.send(RemoteCommand::Connect);
        harness
            .expect(|e| matches!(e, AppEvent::ChooseDevice(_)).then_some(()))
            .await;
        harness.send(RemoteCommand::Press(Direction::Left));
        let indicated = harness
            .expect(|e| match e {
                AppEvent::IndicatorChanged(d) => Some(*d),
                _ => None,
            })
            .await;
        assert_eq!(indicated, Some(Direction::Left));
        harness.stop().await;

        // Nothing was open while the key went down
        assert!(transport.stream.sent().is_empty());
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_declined_selection() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());

        harness.send(RemoteCommand::Connect);
        harness
            .expect(|e| matches!(e, AppEvent::ChooseDevice(_)).then_some(()))
            .await;
        harness.send(RemoteCommand::SelectDevice(None));
        harness.expect_status(ConnectionStatus::Disconnected).await;
        harness.stop().await;

        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_devices_fails() {
        let transport = Arc::new(MockTransport::default());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());

        harness.send(RemoteCommand::Connect);
        harness.expect_status(ConnectionStatus::Failed).await;
        let message = harness
            .expect(|e| match e {
                AppEvent::LogMessage(m) if m.severity == MessageSeverity::Error => {
                    Some(m.message.clone())
                }
                _ => None,
            })
            .await;
        assert_eq!(message, "No paired devices found");
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_permission_denied_fails() {
        let transport = Arc::new(MockTransport {
            deny_permission: true,
            ..MockTransport::with_car()
        });
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());
        harness.send(RemoteCommand::Connect);
        harness.expect_status(ConnectionStatus::Failed).await;
        harness.stop().await;
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_failure_then_manual_retry() {
        let transport = Arc::new(MockTransport {
            fail_open: true,
            ..MockTransport::with_car()
        });
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());

        harness.send(RemoteCommand::Connect);
        harness
            .expect(|e| matches!(e, AppEvent::ChooseDevice(_)).then_some(()))
            .await;
        harness.send(RemoteCommand::SelectDevice(Some("AA:BB:CC:DD:EE:FF".into())));
        harness.expect_status(ConnectionStatus::Failed).await;
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);

        // A new attempt only happens when asked for
        harness.send(RemoteCommand::Connect);
        harness.expect_status(ConnectionStatus::Connecting).await;
        harness.stop().await;
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remap_through_session() {
        let transport = Arc::new(MockTransport::with_car());
        let store = MemoryStore::default();
        let mut harness = Harness::start(transport.clone(), store.clone());
        connect(&mut harness).await;

        harness.send(RemoteCommand::Remap(Direction::Forward, 'T'));
        harness.send(RemoteCommand::Press(Direction::Forward));
        harness
            .expect(|e| matches!(e, AppEvent::IndicatorChanged(Some(_))).then_some(()))
            .await;
        harness.stop().await;

        assert_eq!(transport.stream.sent(), vec!["T"]);
        assert_eq!(store.get("key_forward").as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_dropping_senders_closes_connection() {
        let transport = Arc::new(MockTransport::with_car());
        let mut harness = Harness::start(transport.clone(), MemoryStore::default());
        connect(&mut harness).await;

        let Harness { commands, task, .. } = harness;
        drop(commands);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(transport.stream.close_count(), 1);
    }
}
