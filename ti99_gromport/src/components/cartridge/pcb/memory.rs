//! Boards that carry RAM in the ROM window.
use bitcode::Decode;
use bitcode::Encode;

use super::RomImage;
use super::RomWindow;

fn log_missing_ram(tag: &str, offset: u16) {
    log::warn!(
        target: "illwrite",
        "{}: No RAM at address {:04x}, write ignored",
        tag,
        offset | 0x6000
    );
}

/// Mini Memory: 4 KiB ROM at 0x6000, 4 KiB (battery backed) RAM at 0x7000.
#[derive(Clone, Encode, Decode)]
pub struct MiniMem {
    rom: RomImage,
    ram: Vec<u8>,
}

impl MiniMem {
    pub fn new(rom: RomImage, ram: Vec<u8>) -> Self {
        Self { rom, ram }
    }
}

impl RomWindow for MiniMem {
    fn read(&self, offset: u16) -> Option<u8> {
        if offset & 0x1000 == 0 {
            self.rom.read((offset & 0x0FFF) as usize)
        } else {
            self.ram.get((offset & 0x0FFF) as usize).copied()
        }
    }

    fn write(&mut self, offset: u16, value: u8, tag: &str) {
        if offset & 0x1000 == 0 {
            log::warn!(
                target: "illwrite",
                "{}: Write access to cartridge ROM at address {:04x} ignored",
                tag,
                offset | 0x6000
            );
            return;
        }
        match self.ram.get_mut((offset & 0x0FFF) as usize) {
            Some(byte) => *byte = value,
            None => log_missing_ram(tag, offset),
        }
    }

    fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}

/// Super Space II: 32 KiB RAM in four 8 KiB banks, selected by CRU bits at base 0x0800.
///
/// Setting CRU bit 4n+1 (CRU address 0x0802 + 4n) selects bank n. Reading back the bits
/// shows which bank is active.
#[derive(Clone, Encode, Decode)]
pub struct SuperSpace {
    ram: Vec<u8>,
    page: u16,
}

impl SuperSpace {
    pub fn new(ram: Vec<u8>) -> Self {
        Self { ram, page: 0 }
    }

    fn ram_address(&self, offset: u16) -> usize {
        ((self.page as usize) << 13) | (offset & 0x1FFF) as usize
    }

    fn is_bank_register(offset: u16) -> bool {
        offset & 0xFFF0 == 0x0800
    }
}

impl RomWindow for SuperSpace {
    fn read(&self, offset: u16) -> Option<u8> {
        self.ram.get(self.ram_address(offset)).copied()
    }

    fn write(&mut self, offset: u16, value: u8, tag: &str) {
        let address = self.ram_address(offset);
        match self.ram.get_mut(address) {
            Some(byte) => *byte = value,
            None => log_missing_ram(tag, offset),
        }
    }

    fn crureadz(&self, offset: u16) -> Option<u8> {
        if !Self::is_bank_register(offset) {
            return None;
        }
        let bits = 0x02u32 << (self.page << 1);
        Some(((bits >> ((offset - 0x0800) >> 1)) & 0xFF) as u8)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool, tag: &str) {
        if !Self::is_bank_register(offset) {
            return;
        }
        if !bit {
            log::debug!(
                target: "cru",
                "{}: Ignoring CRU write of 0 to {:04x}",
                tag,
                offset
            );
            return;
        }
        if offset >= 0x0802 {
            self.page = ((offset - 0x0802) >> 2) & 0x03;
            log::trace!(
                target: "bankswitch",
                "{}: Set RAM page = {} (CRU address {:04x})",
                tag,
                self.page,
                offset
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

/// MBX cartridges: 4 KiB fixed ROM at 0x6000, four switchable 4 KiB ROM banks at 0x7000 and
/// 1 KiB RAM at 0x6C00 overlaying the ROM.
///
/// The bank register shares its address with the last RAM word (0x6FFE/0x6FFF). Writes to it
/// select the bank and are stored in RAM as well.
///
/// ```text
/// 6000   6c00  7000        7fff
/// |=ROM0=|=RAM=|=== ROM1-3 ===|
/// ```
#[derive(Clone, Encode, Decode)]
pub struct Mbx {
    rom: RomImage,
    ram: Vec<u8>,
    page: u16,
}

impl Mbx {
    pub fn new(rom: RomImage, ram: Vec<u8>) -> Self {
        Self { rom, ram, page: 0 }
    }

    fn is_ram_area(offset: u16) -> bool {
        offset & 0x1C00 == 0x0C00
    }
}

impl RomWindow for Mbx {
    fn read(&self, offset: u16) -> Option<u8> {
        if Self::is_ram_area(offset) && !self.ram.is_empty() {
            return self.ram.get((offset & 0x03FF) as usize).copied();
        }
        let address = if offset & 0x1000 == 0 {
            offset & 0x0FFF
        } else {
            (offset & 0x0FFF) | (self.page << 12)
        };
        self.rom.read(address as usize)
    }

    fn write(&mut self, offset: u16, value: u8, tag: &str) {
        if !Self::is_ram_area(offset) {
            log::warn!(
                target: "illwrite",
                "{}: Cannot write to ROM space at {:04x}",
                tag,
                offset | 0x6000
            );
            return;
        }
        if offset & 0x0FFE == 0x0FFE {
            self.page = (value & 0x03) as u16;
            log::trace!(
                target: "bankswitch",
                "{}: Set ROM page = {} (writing to {:04x})",
                tag,
                self.page,
                offset | 0x6000
            );
        }
        match self.ram.get_mut((offset & 0x03FF) as usize) {
            Some(byte) => *byte = value,
            None => log_missing_ram(tag, offset),
        }
    }

    fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}
