//! Boards that emulate GROMs with an EPROM and address counter logic.
//!
//! The emulated GROM space covers 0x6000-0xFFFF with 8 KiB per GROM. Unlike real GROMs, the
//! address counter does not wrap at 8 KiB boundaries, and it cannot be read back: the console
//! GROMs deliver the address on address reads.
//!
//! The ROM window has two switchable 8 KiB banks. Boards with RAM (Super-MiniMemory) instead
//! map 4 KiB RAM at 0x7000 and do not switch banks.
use bitcode::Decode;
use bitcode::Encode;

use super::RomImage;
use super::RomWindow;
use crate::common::bus::GromLines;

#[derive(Clone, Encode, Decode)]
pub struct GromEmu {
    rom: RomImage,
    ram: Vec<u8>,
    /// Contents of 0x6000-0xFFFF, empty if the board has no GROM dump.
    grom: Vec<u8>,
    page: u16,
    grom_address: u16,
    waddr_lsb: bool,
    grom_selected: bool,
    grom_read_mode: bool,
    grom_address_mode: bool,
}

impl GromEmu {
    pub fn new(rom: RomImage, ram: Vec<u8>, grom: &[u8]) -> Self {
        Self {
            rom,
            ram,
            grom: grom.to_vec(),
            page: 0,
            grom_address: 0,
            waddr_lsb: false,
            grom_selected: false,
            grom_read_mode: false,
            grom_address_mode: false,
        }
    }

    pub fn grom_address(&self) -> u16 {
        self.grom_address
    }

    pub fn grom_selected(&self) -> bool {
        self.grom_selected
    }

    pub fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        if self.grom.is_empty() {
            return;
        }
        self.grom_selected = asserted;
        self.grom_read_mode = lines.read;
        self.grom_address_mode = lines.address;
    }

    pub fn peek_grom(&self, address: u16) -> Option<u8> {
        if address < 0x6000 {
            return None;
        }
        self.grom.get((address - 0x6000) as usize).copied()
    }

    pub fn readz(&mut self, offset: u16, romspace_selected: bool) -> Option<u8> {
        if self.grom_selected {
            if self.grom_read_mode && !self.grom_address_mode {
                return self.grom_read();
            }
            return None;
        }
        if romspace_selected {
            return RomWindow::read(self, offset);
        }
        None
    }

    pub fn write(&mut self, offset: u16, value: u8, romspace_selected: bool, tag: &str) {
        if romspace_selected {
            RomWindow::write(self, offset, value, tag);
        } else if self.grom_selected && !self.grom_read_mode {
            self.grom_write(value, tag);
        }
    }

    fn grom_read(&mut self) -> Option<u8> {
        // The console GROMs 0-2 serve 0x0000-0x5FFF.
        let value = if self.grom_address >> 13 > 2 {
            self.peek_grom(self.grom_address)
        } else {
            None
        };
        self.grom_address = self.grom_address.wrapping_add(1);
        self.waddr_lsb = false;
        value
    }

    fn grom_write(&mut self, value: u8, tag: &str) {
        if !self.grom_address_mode {
            log::warn!(
                target: "illwrite",
                "{}: Ignoring write to GROM area at address {:04x}",
                tag,
                self.grom_address
            );
            return;
        }
        if self.waddr_lsb {
            self.grom_address = (self.grom_address << 8) | value as u16;
            self.waddr_lsb = false;
            log::trace!(
                target: "grom",
                "{}: GROM address set to {:04x}",
                tag,
                self.grom_address
            );
        } else {
            self.grom_address = value as u16;
            self.waddr_lsb = true;
        }
    }
}

impl RomWindow for GromEmu {
    fn read(&self, offset: u16) -> Option<u8> {
        if !self.ram.is_empty() && offset & 0x1000 != 0 {
            return self.ram.get((offset & 0x0FFF) as usize).copied();
        }
        self.rom
            .read(((offset & 0x1FFF) | (self.page << 13)) as usize)
    }

    fn write(&mut self, offset: u16, value: u8, tag: &str) {
        if !self.ram.is_empty() {
            if offset & 0x1000 != 0 {
                if let Some(byte) = self.ram.get_mut((offset & 0x0FFF) as usize) {
                    *byte = value;
                }
            }
            return;
        }
        self.page = (offset >> 1) & 1;
        if offset & 1 == 0 {
            log::trace!(
                target: "bankswitch",
                "{}: Set ROM page = {} (writing to {:04x})",
                tag,
                self.page,
                offset | 0x6000
            );
        }
    }

    fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}
