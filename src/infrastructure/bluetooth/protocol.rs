//! Serial-over-BLE Protocol
//!
//! The car's module exposes a transparent UART: whatever is written to its
//! serial characteristic comes out of the microcontroller's RX pin.

use crate::domain::transport::TransportError;
use btleplug::api::{CharPropFlags, Characteristic, WriteType};
use uuid::Uuid;

/// HM-10 / HC-08 UART characteristic (write + notify)
pub const HM10_SERIAL_CHAR_UUID: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";

/// Nordic UART Service RX characteristic, used by many ESP32 sketches
pub const NUS_RX_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Parse a UUID from settings. An empty string means "not set".
pub fn parse_uuid(uuid_str: &str) -> Result<Option<Uuid>, TransportError> {
    let trimmed = uuid_str.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(trimmed)
        .map(Some)
        .map_err(|e| TransportError::Backend(format!("invalid UUID {:?}: {}", uuid_str, e)))
}

fn is_writable(props: CharPropFlags) -> bool {
    props.intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
}

/// Lower is better; `None` means the characteristic cannot take commands.
fn serial_rank(uuid: Uuid, props: CharPropFlags, preferred: Option<Uuid>) -> Option<u8> {
    if !is_writable(props) {
        return None;
    }
    let known = [HM10_SERIAL_CHAR_UUID, NUS_RX_CHAR_UUID]
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .any(|u| u == uuid);
    if Some(uuid) == preferred {
        Some(0)
    } else if known {
        Some(1)
    } else {
        Some(2)
    }
}

/// Commands are fire-and-forget, so skip the round trip when the module allows it.
pub fn write_type_for(props: CharPropFlags) -> WriteType {
    if props.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

/// Pick the characteristic to send commands to: the configured one, then a
/// well-known UART characteristic, then the first writable one.
pub fn select_serial_characteristic<'a>(
    characteristics: impl IntoIterator<Item = &'a Characteristic>,
    preferred: Option<Uuid>,
) -> Option<&'a Characteristic> {
    characteristics
        .into_iter()
        .filter_map(|c| serial_rank(c.uuid, c.properties, preferred).map(|rank| (rank, c)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c)
}
