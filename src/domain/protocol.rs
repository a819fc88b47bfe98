//! Vehicle Wire Protocol
//!
//! Everything sent to the car is raw ASCII, one command per write, with no
//! terminator and no acknowledgement:
//!
//! ```text
//! direction   : <code>          single character, e.g. "f"
//! speed       : v<percent>      percent is 0..=100 in decimal, e.g. "v42"
//! ```

/// Prefix of a speed command
pub const SPEED_PREFIX: char = 'v';

/// Encode a direction code. ASCII codes always produce a single byte.
pub fn encode_command(code: char) -> Vec<u8> {
    let mut buf = [0u8; 4];
    code.encode_utf8(&mut buf).as_bytes().to_vec()
}

/// Convert a normalized speed to a whole percentage.
pub fn speed_percent(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Encode a speed command, e.g. `0.5` becomes `b"v50"`.
pub fn encode_speed(value: f32) -> Vec<u8> {
    format!("{}{}", SPEED_PREFIX, speed_percent(value)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(encode_command('f'), b"f".to_vec());
        assert_eq!(encode_command('T'), vec![0x54]);
    }

    #[test]
    fn test_speed_bytes() {
        assert_eq!(encode_speed(0.5), b"v50".to_vec());
        assert_eq!(encode_speed(1.0), b"v100".to_vec());
        assert_eq!(encode_speed(0.004), b"v0".to_vec());
        assert_eq!(encode_speed(0.42), b"v42".to_vec());
    }

    #[test]
    fn test_speed_out_of_range() {
        assert_eq!(speed_percent(-0.3), 0);
        assert_eq!(speed_percent(1.7), 100);
        assert_eq!(speed_percent(f32::NAN), 0);
    }
}
