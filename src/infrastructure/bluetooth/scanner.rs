//! BLE Scanner Module
//!
//! BLE has no paired-device list to read, so "paired devices" are the ones
//! the adapter has seen by the end of a bounded scan window.

use crate::domain::models::PairedDevice;
use crate::domain::transport::TransportError;
use btleplug::api::{Central, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct BleScanner {
    adapter: Adapter,
    service_filter: Option<Uuid>,
    scan_window: Duration,
}

impl BleScanner {
    pub fn new(adapter: Adapter, service_filter: Option<Uuid>, scan_window: Duration) -> Self {
        Self {
            adapter,
            service_filter,
            scan_window,
        }
    }

    /// Scan for `scan_window` and return every device seen, named ones first.
    pub async fn list_devices(&self) -> Result<Vec<PairedDevice>, TransportError> {
        let filter = ScanFilter {
            services: self.service_filter.into_iter().collect(),
        };
        info!("Scanning for {:?}", self.scan_window);
        self.adapter.start_scan(filter).await?;
        tokio::time::sleep(self.scan_window).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let name = match peripheral.properties().await {
                Ok(Some(props)) => props.local_name.unwrap_or_default(),
                Ok(None) => String::new(),
                Err(e) => {
                    debug!("Skipping peripheral without properties: {}", e);
                    continue;
                }
            };
            devices.push(PairedDevice::new(name, device_address(&peripheral)));
        }
        devices.sort_by_key(|d| (d.name == "Unknown", d.name.clone()));
        info!("Scan found {} device(s)", devices.len());
        Ok(devices)
    }

    /// Find a previously seen peripheral by the address reported in `list_devices`.
    pub async fn find(&self, address: &str) -> Result<Peripheral, TransportError> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| device_address(p).eq_ignore_ascii_case(address))
            .ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
    }
}

/// macOS hides MAC addresses, so fall back to the platform peripheral id there.
pub fn device_address(peripheral: &Peripheral) -> String {
    let address = peripheral.address();
    if address == btleplug::api::BDAddr::default() {
        format!("{:?}", peripheral.id())
    } else {
        address.to_string()
    }
}
