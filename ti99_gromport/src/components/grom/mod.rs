//! Model of the TMC0430 GROM (graphics read-only memory) chip.
//!
//! A GROM is a 6 KiB serial ROM with an internal 16 bit address counter. All GROMs on the bus
//! see every access, each chip only drives the data bus for addresses inside its own 8 KiB
//! band (`ident * 0x2000`). Since every chip keeps its own copy of the address counter, all
//! chips have to see all address writes and data reads to stay in sync.

use bitcode::Decode;
use bitcode::Encode;

use crate::common::bus::GromLines;
use crate::common::util::EdgeDetector;

pub const GROM_BAND_SIZE: usize = 0x2000;

/// Only 6 KiB of each band are populated.
const GROM_POPULATED: usize = 0x1800;

#[derive(Clone, Debug, Default, Encode, Decode)]
struct GromState {
    address: u16,
    /// Byte fetched from the last address, valid only if `buffer_in_band` is set.
    buffer: u8,
    buffer_in_band: bool,
    /// Set after the first byte of an address write or read.
    low_byte_next: bool,
    selected: bool,
    read_mode: bool,
    address_mode: bool,
    idle: bool,
    clock: EdgeDetector,
}

#[derive(Clone, Encode, Decode)]
pub struct Grom {
    ident: u8,
    memory: Vec<u8>,
    state: GromState,
}

impl Grom {
    /// Creates chip `ident` (0..=7) with the given band contents. Missing bytes read as 0.
    pub fn new(ident: u8, contents: &[u8]) -> Self {
        let mut memory = vec![0; GROM_BAND_SIZE];
        let length = contents.len().min(GROM_BAND_SIZE);
        memory[..length].copy_from_slice(&contents[..length]);
        Self {
            ident: ident & 0x07,
            memory,
            state: GromState {
                idle: true,
                ..Default::default()
            },
        }
    }

    pub fn ident(&self) -> u8 {
        self.ident
    }

    /// Current value of the address counter.
    pub fn address(&self) -> u16 {
        self.state.address
    }

    pub fn is_idle(&self) -> bool {
        self.state.idle
    }

    /// Reads the byte at `address` if it belongs to this chip, without side effects.
    pub fn peek(&self, address: u16) -> Option<u8> {
        if address >> 13 != self.ident as u16 {
            return None;
        }
        Some(self.read_band((address & 0x1FFF) as usize))
    }

    /// Updates the GS*, M and MO lines.
    pub fn set_lines(&mut self, lines: GromLines, asserted: bool) {
        self.state.selected = asserted;
        self.state.read_mode = lines.read;
        self.state.address_mode = lines.address;
        if asserted {
            self.state.idle = false;
        }
    }

    pub fn gclock_in(&mut self, asserted: bool) {
        self.state.clock.update_signal(asserted);
        if self.state.clock.consume_rise() && !self.state.selected {
            self.state.idle = true;
        }
    }

    pub fn readz(&mut self) -> Option<u8> {
        if !self.state.selected || !self.state.read_mode {
            return None;
        }
        if self.state.address_mode {
            let [high, low] = self.state.address.to_be_bytes();
            let value = if self.state.low_byte_next { low } else { high };
            self.state.low_byte_next = !self.state.low_byte_next;
            log::trace!(
                target: "grom",
                "GROM {}: address read {:02x}",
                self.ident,
                value
            );
            return Some(value);
        }
        self.state.low_byte_next = false;
        let value = self.state.buffer_in_band.then_some(self.state.buffer);
        self.prefetch();
        value
    }

    pub fn write(&mut self, value: u8) {
        if !self.state.selected || self.state.read_mode {
            return;
        }
        if self.state.address_mode {
            self.state.address = (self.state.address << 8) | value as u16;
            if self.state.low_byte_next {
                log::trace!(
                    target: "grom",
                    "GROM {}: address set to {:04x}",
                    self.ident,
                    self.state.address
                );
                self.prefetch();
            }
            self.state.low_byte_next = !self.state.low_byte_next;
        } else {
            self.state.low_byte_next = false;
            log::warn!(
                target: "illwrite",
                "GROM {}: Cannot write to GROM address {:04x}",
                self.ident,
                self.state.address
            );
        }
    }

    /// Fetches the byte at the address counter and advances the counter inside its band.
    fn prefetch(&mut self) {
        let address = self.state.address;
        self.state.buffer_in_band = address >> 13 == self.ident as u16;
        if self.state.buffer_in_band {
            self.state.buffer = self.read_band((address & 0x1FFF) as usize);
        }
        self.state.address = (address & 0xE000) | (address.wrapping_add(1) & 0x1FFF);
    }

    /// The upper 2 KiB of a band are not decoded separately, they return the OR of the two
    /// 2 KiB blocks below.
    fn read_band(&self, offset: usize) -> u8 {
        if offset >= GROM_POPULATED {
            self.memory[offset - 0x1000] | self.memory[offset - 0x0800]
        } else {
            self.memory[offset]
        }
    }
}
