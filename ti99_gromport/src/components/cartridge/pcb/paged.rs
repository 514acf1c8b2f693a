//! ROM-only boards, with and without bank switching.
use bitcode::Decode;
use bitcode::Encode;

use super::RomImage;
use super::RomWindow;

fn log_bank(tag: &str, page: u16, offset: u16) {
    log::trace!(
        target: "bankswitch",
        "{}: Set ROM page = {} (writing to {:04x})",
        tag,
        page,
        offset | 0x6000
    );
}

/// Plain 8 KiB ROM without bank switching.
#[derive(Clone, Encode, Decode)]
pub struct Standard {
    rom: RomImage,
}

impl Standard {
    pub fn new(rom: RomImage) -> Self {
        Self { rom }
    }
}

impl RomWindow for Standard {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom.read((offset & 0x1FFF) as usize)
    }
}

/// 12 KiB in two dumps: a fixed 4 KiB bank at 0x6000, and two switchable 4 KiB banks at 0x7000
/// taken from the second dump. Writing to an even word address selects bank 0, odd words
/// select bank 1.
///
/// ```text
/// 6000         7000        7fff
/// |=== ROM1 ====|=== ROM2a ===|   write to 6000
/// |=== ROM1 ====|=== ROM2b ===|   write to 6002
/// ```
#[derive(Clone, Encode, Decode)]
pub struct Paged12k {
    rom: RomImage,
    page: u16,
}

impl Paged12k {
    pub fn new(rom: RomImage) -> Self {
        Self { rom, page: 0 }
    }
}

impl RomWindow for Paged12k {
    fn read(&self, offset: u16) -> Option<u8> {
        let address = if offset & 0x1000 == 0 {
            offset & 0x0FFF
        } else {
            (offset & 0x0FFF) | 0x2000 | (self.page << 12)
        };
        self.rom.read(address as usize)
    }

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        self.page = (offset >> 1) & 1;
        log_bank(tag, self.page, offset);
    }
}

/// Two 8 KiB banks switched like `Paged12k`. Most cartridges of this type ("Extended BASIC")
/// have GROMs as well.
#[derive(Clone, Encode, Decode)]
pub struct Paged16k {
    rom: RomImage,
    page: u16,
}

impl Paged16k {
    pub fn new(rom: RomImage) -> Self {
        Self { rom, page: 0 }
    }
}

impl RomWindow for Paged16k {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom
            .read(((offset & 0x1FFF) | (self.page << 13)) as usize)
    }

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        self.page = (offset >> 1) & 1;
        log_bank(tag, self.page, offset);
    }
}

/// Up to 16 banks of 8 KiB, selected through the inverted outputs of an LS379 latch: writing
/// to 0x601E selects bank 0, writing to 0x6000 selects the highest bank.
///
/// The number of latch bits in use follows the ROM size (2, 4, 8 or 16 banks).
#[derive(Clone, Encode, Decode)]
pub struct Paged379i {
    rom: RomImage,
    rom_size: u32,
    page: u16,
}

impl Paged379i {
    pub fn new(rom: RomImage, rom_size: usize) -> Self {
        Self {
            rom,
            rom_size: rom_size as u32,
            page: 0,
        }
    }

    fn mask(&self) -> u16 {
        // ROM sizes below one bank yield the full 4 bit mask.
        ((self.rom_size as i64 / 8192 - 1) & 0x0F) as u16
    }
}

impl RomWindow for Paged379i {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom
            .read(((self.page as usize) << 13) | (offset & 0x1FFF) as usize)
    }

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        self.page = (!offset >> 1) & self.mask();
        if offset & 1 == 0 {
            log_bank(tag, self.page, offset);
        }
    }
}

/// Up to 64 banks of 8 KiB, the bank is the word address of a write to the ROM window.
#[derive(Clone, Encode, Decode)]
pub struct Paged378 {
    rom: RomImage,
    page: u16,
}

impl Paged378 {
    pub fn new(rom: RomImage) -> Self {
        Self { rom, page: 0 }
    }
}

impl RomWindow for Paged378 {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom
            .read(((self.page as usize) << 13) | (offset & 0x1FFF) as usize)
    }

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        self.page = (offset >> 1) & 0x003F;
        log_bank(tag, self.page, offset);
    }
}

/// Up to 256 banks of 8 KiB (2 MiB), selected like `Paged378`.
#[derive(Clone, Encode, Decode)]
pub struct Paged377 {
    rom: RomImage,
    page: u16,
}

impl Paged377 {
    pub fn new(rom: RomImage) -> Self {
        Self { rom, page: 0 }
    }
}

impl RomWindow for Paged377 {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom
            .read(((self.page as usize) << 13) | (offset & 0x1FFF) as usize)
    }

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        self.page = (offset >> 1) & 0x00FF;
        log_bank(tag, self.page, offset);
    }
}

/// Banks of 8 KiB selected through CRU bits at base 0x0800. Setting CRU bit 2n+1 selects bank
/// n and reading the bits back shows the current bank.
///
/// Memory writes have no effect.
#[derive(Clone, Encode, Decode)]
pub struct PagedCru {
    rom: RomImage,
    page: u16,
}

impl PagedCru {
    pub fn new(rom: RomImage) -> Self {
        Self { rom, page: 0 }
    }

    fn cru_bit(offset: u16) -> Option<u16> {
        (offset & 0xF800 == 0x0800).then_some((offset & 0x001E) >> 1)
    }
}

impl RomWindow for PagedCru {
    fn read(&self, offset: u16) -> Option<u8> {
        self.rom
            .read(((self.page as usize) << 13) | (offset & 0x1FFF) as usize)
    }

    fn write(&mut self, _offset: u16, _value: u8, _tag: &str) {}

    fn crureadz(&self, offset: u16) -> Option<u8> {
        let bit = Self::cru_bit(offset)?;
        // Eight CRU bits report four banks.
        let page = self.page as i32 - (bit / 2) as i32;
        let shift = page * 2 + 1;
        Some(if (0..8).contains(&shift) {
            1 << shift
        } else {
            0
        })
    }

    fn cruwrite(&mut self, offset: u16, bit: bool, tag: &str) {
        if let Some(line) = Self::cru_bit(offset) {
            if bit && line > 0 {
                self.page = (line - 1) / 2;
                log::trace!(
                    target: "bankswitch",
                    "{}: Set ROM page = {} (CRU address {:04x})",
                    tag,
                    self.page,
                    offset
                );
            }
        }
    }
}
