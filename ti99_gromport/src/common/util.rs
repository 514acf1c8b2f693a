//! General utility functions and types.
use bitcode::Decode;
use bitcode::Encode;
use itertools::Itertools;

/// A simple edge detector that can be used to detect rising edges of a signal.
/// Used for the GROM clock input.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub struct EdgeDetector {
    pub value: bool,
    pub rise_triggered: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self {
            value: false,
            rise_triggered: false,
        }
    }

    pub fn update_signal(&mut self, value: bool) {
        if value && !self.value {
            self.rise_triggered = true;
        }
        self.value = value;
    }

    pub fn consume_rise(&mut self) -> bool {
        let rise_triggered = self.rise_triggered;
        self.rise_triggered = false;
        rise_triggered
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower case hex representation of `bytes`, as used in SHA1 manifest attributes.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).join("")
}

/// Parses a hexadecimal attribute value like `crc="9a1b2c3d"`. Returns 0 for malformed values.
pub fn parse_hex_u32(value: &str) -> u32 {
    let value = value.trim();
    let value = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(value, 16).unwrap_or(0)
}
