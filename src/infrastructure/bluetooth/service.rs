//! Bluetooth Service Module
//!
//! [`Transport`] implementation over btleplug.

use crate::domain::models::PairedDevice;
use crate::domain::settings::BleSettings;
use crate::domain::transport::{Transport, TransportError};
use crate::infrastructure::bluetooth::{
    connection::{open_serial, BleStream, WriterRegistry},
    protocol,
    scanner::BleScanner,
};
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub struct BleTransport {
    scanner: BleScanner,
    serial_char: Option<Uuid>,
    writers: WriterRegistry,
}

impl BleTransport {
    /// Bind to the configured adapter.
    pub async fn new(settings: &BleSettings) -> Result<Self, TransportError> {
        let service_filter = protocol::parse_uuid(&settings.service_uuid)?;
        let serial_char = protocol::parse_uuid(&settings.serial_char_uuid)?;

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(settings.adapter_index)
            .ok_or(TransportError::NoAdapter)?;
        info!("Using Bluetooth adapter #{}", settings.adapter_index);

        Ok(Self {
            scanner: BleScanner::new(
                adapter,
                service_filter,
                Duration::from_millis(settings.scan_duration_ms),
            ),
            serial_char,
            writers: WriterRegistry::default(),
        })
    }
}

impl Transport for BleTransport {
    type Stream = BleStream;

    async fn paired_devices(&self) -> Result<Vec<PairedDevice>, TransportError> {
        self.scanner.list_devices().await
    }

    async fn open(&self, address: &str) -> Result<BleStream, TransportError> {
        self.writers.wait_for(address).await;
        let peripheral = self.scanner.find(address).await?;
        let (stream, writer) = open_serial(peripheral, self.serial_char).await?;
        self.writers.track(address, writer).await;
        Ok(stream)
    }

    async fn wait_released(&self) {
        self.writers.wait_all().await;
    }
}
