use anyhow::Context;
use bt_rc_remote::domain::command_map::CommandMap;
use bt_rc_remote::domain::direction::Direction;
use bt_rc_remote::domain::settings::SettingsService;
use bt_rc_remote::domain::transport::Transport;
use bt_rc_remote::infrastructure::bluetooth::BleTransport;
use bt_rc_remote::infrastructure::logging::init_logger;
use bt_rc_remote::infrastructure::storage::JsonFileStore;
use bt_rc_remote::presentation::app::RemoteApp;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bt-rc-remote", about = "Bluetooth remote control for serial RC cars")]
struct Cli {
    /// Directory holding settings.json, controls.json and logs
    #[arg(long, env = "BT_RC_REMOTE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the car from the keyboard (default)
    Drive,
    /// Scan and list devices that can be connected to
    Devices,
    /// Show the character sent for each direction
    Keys,
    /// Change the character sent for a direction
    Remap { direction: Direction, code: char },
    /// Restore the default character for every direction
    ResetKeys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = SettingsService::new(cli.config_dir).context("Failed to load settings")?;
    let _logging_guard = init_logger(&settings.get().log_settings, settings.config_dir())
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Bluetooth RC remote");
    let mut store = JsonFileStore::in_dir(settings.config_dir());

    match cli.command.unwrap_or(Command::Drive) {
        Command::Drive => {
            let transport = BleTransport::new(&settings.get().ble)
                .await
                .context("Bluetooth is not available")?;
            RemoteApp::run(transport, Box::new(store), settings).await?;
        }
        Command::Devices => {
            let transport = BleTransport::new(&settings.get().ble)
                .await
                .context("Bluetooth is not available")?;
            let devices = transport.paired_devices().await?;
            if devices.is_empty() {
                println!("No devices found");
            }
            for device in devices {
                println!("{}\t{}", device.address, device.name);
            }
        }
        Command::Keys => {
            for (direction, code) in CommandMap::load(&store).entries() {
                println!("{:<15} {}", direction, code);
            }
        }
        Command::Remap { direction, code } => {
            let mut map = CommandMap::load(&store);
            map.set(direction, code, &mut store)?;
            println!("{} now sends {:?}", direction, code);
        }
        Command::ResetKeys => {
            CommandMap::load(&store).reset(&mut store)?;
            println!("Restored default keys");
        }
    }

    Ok(())
}
