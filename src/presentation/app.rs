use crate::domain::models::{
    AppEvent, ConnectionStatus, MessageSeverity, PairedDevice, RemoteCommand, StatusMessage,
};
use crate::domain::session::Session;
use crate::domain::settings::SettingsService;
use crate::domain::store::KeyValueStore;
use crate::domain::transport::Transport;
use crate::presentation::keymap::{self, KeyAction};
use anyhow::Result;
use crossterm::event::{
    self, Event, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::style::Print;
use crossterm::{execute, queue, terminal};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Raw mode plus, where supported, key release reporting. Restored on drop.
struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(Self { enhanced })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
    }
}

/// Terminal stand-in for the touchscreen: keys are buttons.
pub struct RemoteApp {
    commands: mpsc::UnboundedSender<RemoteCommand>,
    settings: SettingsService,

    // State
    connection_status: ConnectionStatus,
    speed: f32,
    choosing: Option<Vec<PairedDevice>>,

    /// False when the terminal cannot report releases; every press is then a tap.
    releases_reported: bool,
}

impl RemoteApp {
    /// Run the remote until the user quits. The session owns the connection
    /// and is shut down, closing it, before this returns.
    pub async fn run<T: Transport>(
        transport: T,
        store: Box<dyn KeyValueStore>,
        settings: SettingsService,
    ) -> Result<()> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let session = Session::new(Arc::new(transport), store, command_rx, event_tx);
        let session_task = tokio::spawn(session.run());

        let guard = TerminalGuard::enter()?;
        let mut app = Self {
            commands: command_tx,
            settings,
            connection_status: ConnectionStatus::Disconnected,
            speed: 0.0,
            choosing: None,
            releases_reported: guard.enhanced,
        };
        if !app.releases_reported {
            warn!("Terminal does not report key releases; keys act as taps");
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        let input_thread = {
            let stop = stop.clone();
            std::thread::spawn(move || read_keys(key_tx, stop))
        };

        let outcome = app.event_loop(&mut event_rx, &mut key_rx).await;

        info!("Shutting down remote");
        let _ = app.commands.send(RemoteCommand::Shutdown);
        stop.store(true, Ordering::Relaxed);
        if let Err(e) = session_task.await {
            error!("Session task failed: {}", e);
        }
        let _ = input_thread.join();
        drop(guard);
        outcome
    }

    async fn event_loop(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<AppEvent>,
        keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
    ) -> Result<()> {
        for line in keymap::help_lines() {
            self.print(line)?;
        }
        self.print("Press Enter to connect.")?;

        loop {
            tokio::select! {
                Some(event) = events.recv() => self.on_event(event)?,
                key = keys.recv() => match key {
                    Some(key) => {
                        if !self.on_key(key)? {
                            return Ok(());
                        }
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// Returns false when the user asked to quit.
    fn on_key(&mut self, key: KeyEvent) -> Result<bool> {
        let Some(action) = keymap::action_for(key.code) else {
            return Ok(true);
        };
        match key.kind {
            KeyEventKind::Release => {
                if let KeyAction::Direction(direction) = action {
                    self.send(RemoteCommand::Release(direction));
                }
                return Ok(true);
            }
            KeyEventKind::Repeat => return Ok(true),
            KeyEventKind::Press => {}
        }

        match action {
            KeyAction::Direction(direction) => {
                self.send(RemoteCommand::Press(direction));
                if !self.releases_reported {
                    self.send(RemoteCommand::Release(direction));
                }
            }
            KeyAction::Digit(n) => {
                if self.choosing.is_some() {
                    self.choose(n as usize)?;
                } else {
                    self.set_speed(n as f32 / 10.0);
                }
            }
            KeyAction::SpeedUp => self.set_speed(keymap::step_speed(self.speed, true)),
            KeyAction::SpeedDown => self.set_speed(keymap::step_speed(self.speed, false)),
            KeyAction::Connect => self.send(RemoteCommand::Connect),
            KeyAction::Disconnect => {
                if self.connection_status == ConnectionStatus::Connected {
                    self.send(RemoteCommand::Disconnect);
                } else {
                    self.print("Not connected")?;
                }
            }
            KeyAction::Escape => {
                if self.choosing.take().is_some() {
                    self.send(RemoteCommand::SelectDevice(None));
                } else {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn on_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::ConnectionStatus(status) => {
                self.connection_status = status;
                if status != ConnectionStatus::Connecting {
                    self.choosing = None;
                }
                self.print(&format!("[{}]", status_label(status)))?;
            }
            AppEvent::LogMessage(message) => self.print(&format_message(&message))?,
            AppEvent::IndicatorChanged(direction) => {
                let label = direction.map_or("-", |d| d.name());
                self.print(&format!("> {}", label))?;
            }
            AppEvent::SpeedChanged(percent) => self.print(&format!("speed {}%", percent))?,
            AppEvent::ChooseDevice(devices) => {
                self.print("Choose a device (Esc to cancel):")?;
                let last = self.settings.get().last_connected_address.clone();
                for (i, device) in devices.iter().enumerate().take(10) {
                    let marker = if last.as_deref() == Some(device.address.as_str()) {
                        " (last used)"
                    } else {
                        ""
                    };
                    self.print(&format!("  {}: {} [{}]{}", i, device.name, device.address, marker))?;
                }
                self.choosing = Some(devices);
            }
        }
        Ok(())
    }

    fn choose(&mut self, index: usize) -> Result<()> {
        let Some(devices) = self.choosing.as_ref() else {
            return Ok(());
        };
        let Some(device) = devices.get(index).cloned() else {
            self.print(&format!("No device {}", index))?;
            return Ok(());
        };
        self.choosing = None;
        if let Err(e) = self.settings.remember_address(&device.address) {
            warn!("Could not remember {}: {}", device.address, e);
        }
        self.send(RemoteCommand::SelectDevice(Some(device.address)));
        Ok(())
    }

    fn set_speed(&mut self, value: f32) {
        self.speed = value;
        self.send(RemoteCommand::SetSpeed(value));
    }

    fn send(&self, command: RemoteCommand) {
        if self.commands.send(command).is_err() {
            error!("Session is gone; command dropped");
        }
    }

    fn print(&self, line: &str) -> Result<()> {
        let mut stdout = io::stdout();
        queue!(stdout, Print(line), Print("\r\n"))?;
        stdout.flush()?;
        Ok(())
    }
}

/// Blocking reader; polls so it notices `stop` within a tick.
fn read_keys(keys: mpsc::UnboundedSender<KeyEvent>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if keys.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Failed to read terminal event: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                error!("Failed to poll terminal: {}", e);
                break;
            }
        }
    }
    debug!("Input thread stopped");
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "CONNECTED",
        ConnectionStatus::Connecting => "CONNECTING...",
        ConnectionStatus::Disconnected => "DISCONNECTED",
        ConnectionStatus::Failed => "FAILED",
    }
}

fn format_message(message: &StatusMessage) -> String {
    let tag = match message.severity {
        MessageSeverity::Info => "info",
        MessageSeverity::Success => "ok",
        MessageSeverity::Warning => "warn",
        MessageSeverity::Error => "error",
    };
    format!("{}: {}", tag, message.message)
}
