//! BLE Connection Module
//!
//! Connects to the car's serial module and hands back a [`BleStream`].

use crate::domain::transport::{ByteStream, TransportError};
use crate::infrastructure::bluetooth::protocol::{select_serial_characteristic, write_type_for};
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on waiting for a closed stream's writer to disconnect.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `peripheral` and locate the characteristic commands go to.
/// Also returns the writer task, which finishes once the stream is closed
/// and the device has been disconnected.
pub async fn open_serial(
    peripheral: Peripheral,
    preferred_char: Option<Uuid>,
) -> Result<(BleStream, JoinHandle<()>), TransportError> {
    if !peripheral.is_connected().await? {
        peripheral.connect().await?;
    }
    info!("Connected, discovering services");
    peripheral.discover_services().await?;

    let characteristics = peripheral.characteristics();
    debug!("Found {} characteristics", characteristics.len());
    let Some(characteristic) = select_serial_characteristic(&characteristics, preferred_char).cloned()
    else {
        warn!("No writable characteristic; disconnecting");
        if let Err(e) = peripheral.disconnect().await {
            warn!("Disconnect after failed discovery also failed: {}", e);
        }
        return Err(TransportError::NoWritableCharacteristic);
    };

    let write_type = write_type_for(characteristic.properties);
    info!(
        "Using characteristic {} ({:?})",
        characteristic.uuid, write_type
    );
    Ok(BleStream::spawn(peripheral, characteristic, write_type))
}

/// Byte stream backed by a writer task. Writes are queued so the control
/// loop never waits on the radio; closing ends the queue, and the task
/// flushes what is left and then disconnects.
pub struct BleStream {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl BleStream {
    fn spawn(
        peripheral: Peripheral,
        characteristic: Characteristic,
        write_type: WriteType,
    ) -> (Self, JoinHandle<()>) {
        let (outbound, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(writer_loop(peripheral, characteristic, write_type, queue));
        let stream = Self {
            outbound: Some(outbound),
        };
        (stream, writer)
    }
}

impl ByteStream for BleStream {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if self.outbound.take().is_some() {
            debug!("Closing BLE stream");
        }
    }
}

impl Drop for BleStream {
    fn drop(&mut self) {
        self.close();
    }
}

async fn writer_loop(
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = peripheral.write(&characteristic, &bytes, write_type).await {
            warn!("BLE write of {} byte(s) failed: {}", bytes.len(), e);
        }
    }

    match peripheral.disconnect().await {
        Ok(()) => info!("Disconnected from device"),
        Err(e) => warn!("Disconnect failed: {}", e),
    }
}

/// Writer tasks by device address.
///
/// A device is only reopened after its previous writer has disconnected,
/// otherwise the old task's late `disconnect` would drop the new link.
#[derive(Default)]
pub struct WriterRegistry {
    writers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl WriterRegistry {
    pub async fn track(&self, address: &str, writer: JoinHandle<()>) {
        let previous = self.writers.lock().await.insert(registry_key(address), writer);
        if previous.is_some() {
            warn!("Replaced a writer for {} that was never joined", address);
        }
    }

    /// Wait for the writer of a closed stream to `address`, if any.
    pub async fn wait_for(&self, address: &str) {
        let writer = self.writers.lock().await.remove(&registry_key(address));
        if let Some(writer) = writer {
            join_writer(address, writer).await;
        }
    }

    /// Wait for every tracked writer. Streams must be closed first.
    pub async fn wait_all(&self) {
        let writers: Vec<_> = self.writers.lock().await.drain().collect();
        for (address, writer) in writers {
            join_writer(&address, writer).await;
        }
    }
}

fn registry_key(address: &str) -> String {
    address.to_ascii_uppercase()
}

async fn join_writer(address: &str, writer: JoinHandle<()>) {
    match timeout(RELEASE_TIMEOUT, writer).await {
        Ok(Ok(())) => debug!("Writer for {} finished", address),
        Ok(Err(e)) => warn!("Writer for {} ended abnormally: {}", address, e),
        Err(_) => warn!("Gave up waiting for {} to disconnect", address),
    }
}
