//! Circuit boards of GROM port cartridges.
//!
//! A `Board` owns everything that is plugged onto the cartridge board: up to five GROM chips
//! for the GROM address space 0x6000-0xFFFF, and a `Pcb` variant which decides how ROM and RAM
//! appear in the 8 KiB ROM window at 0x6000-0x7FFF and which bank switching scheme is used.
//!
//! Accesses outside of the ROM window (ROMG* not asserted) are GROM accesses and go to every
//! GROM chip of the board, even for board types that usually come without GROMs.
mod gromemu;
mod memory;
mod paged;

use bitcode::Decode;
use bitcode::Encode;

use self::gromemu::GromEmu;
use self::memory::Mbx;
use self::memory::MiniMem;
use self::memory::SuperSpace;
use self::paged::Paged12k;
use self::paged::Paged16k;
use self::paged::Paged377;
use self::paged::Paged378;
use self::paged::Paged379i;
use self::paged::PagedCru;
use self::paged::Standard;
use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::common::pcb_type::PcbType;
use crate::components::grom::Grom;
use crate::components::grom::GROM_BAND_SIZE;

/// Size of the cartridge GROM space 0x6000-0xFFFF.
pub const GROM_REGION_SIZE: usize = 0xA000;

/// Offset of the second ROM dump in the ROM image.
const ROM2_OFFSET: usize = 0x2000;

/// ROM contents of a board. Addresses beyond the loaded dumps read as 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct RomImage {
    data: Vec<u8>,
}

impl RomImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Places `rom` at 0 and the optional second dump at 0x2000.
    pub fn with_dumps(rom: &[u8], rom2: Option<&[u8]>) -> Self {
        let mut data = rom.to_vec();
        if let Some(rom2) = rom2.filter(|rom2| !rom2.is_empty()) {
            let end = ROM2_OFFSET + rom2.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            data[ROM2_OFFSET..end].copy_from_slice(rom2);
        }
        Self { data }
    }

    pub fn is_present(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `None` if the board has no ROM at all.
    pub fn read(&self, address: usize) -> Option<u8> {
        if !self.is_present() {
            return None;
        }
        Some(self.data.get(address).copied().unwrap_or(0))
    }
}

/// Memory dumps that are plugged into the sockets of a board.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardContents {
    pub grom: Vec<u8>,
    pub rom: Vec<u8>,
    pub rom2: Option<Vec<u8>>,
    pub ram: Vec<u8>,
}

/// Behavior of the ROM window that differs between board types.
trait RomWindow {
    fn read(&self, offset: u16) -> Option<u8>;

    fn write(&mut self, offset: u16, _value: u8, tag: &str) {
        log::warn!(target: "illwrite", "{}: Cannot write to ROM space at {:04x}", tag, offset);
    }

    fn crureadz(&self, _offset: u16) -> Option<u8> {
        None
    }

    fn cruwrite(&mut self, _offset: u16, _bit: bool, _tag: &str) {}

    fn ram(&self) -> &[u8] {
        &[]
    }

    fn ram_mut(&mut self) -> &mut [u8] {
        &mut []
    }
}

#[derive(Clone, Encode, Decode)]
pub enum Pcb {
    Standard(Standard),
    Paged12k(Paged12k),
    Paged16k(Paged16k),
    MiniMem(MiniMem),
    SuperSpace(SuperSpace),
    Mbx(Mbx),
    Paged379i(Paged379i),
    Paged378(Paged378),
    Paged377(Paged377),
    PagedCru(PagedCru),
    GromEmu(GromEmu),
}

impl Pcb {
    fn new(pcb_type: PcbType, rom: RomImage, rom_size: usize, ram: Vec<u8>, grom: &[u8]) -> Self {
        match pcb_type {
            PcbType::Standard => Pcb::Standard(Standard::new(rom)),
            PcbType::Paged12k => Pcb::Paged12k(Paged12k::new(rom)),
            PcbType::Paged16k => Pcb::Paged16k(Paged16k::new(rom)),
            PcbType::MiniMem => Pcb::MiniMem(MiniMem::new(rom, ram)),
            PcbType::SuperSpace => Pcb::SuperSpace(SuperSpace::new(ram)),
            PcbType::Mbx => Pcb::Mbx(Mbx::new(rom, ram)),
            PcbType::Paged379i => Pcb::Paged379i(Paged379i::new(rom, rom_size)),
            PcbType::Paged378 => Pcb::Paged378(Paged378::new(rom)),
            PcbType::Paged377 => Pcb::Paged377(Paged377::new(rom)),
            PcbType::PagedCru => Pcb::PagedCru(PagedCru::new(rom)),
            PcbType::GromEmu => Pcb::GromEmu(GromEmu::new(rom, ram, grom)),
        }
    }

    pub fn pcb_type(&self) -> PcbType {
        match self {
            Pcb::Standard(_) => PcbType::Standard,
            Pcb::Paged12k(_) => PcbType::Paged12k,
            Pcb::Paged16k(_) => PcbType::Paged16k,
            Pcb::MiniMem(_) => PcbType::MiniMem,
            Pcb::SuperSpace(_) => PcbType::SuperSpace,
            Pcb::Mbx(_) => PcbType::Mbx,
            Pcb::Paged379i(_) => PcbType::Paged379i,
            Pcb::Paged378(_) => PcbType::Paged378,
            Pcb::Paged377(_) => PcbType::Paged377,
            Pcb::PagedCru(_) => PcbType::PagedCru,
            Pcb::GromEmu(_) => PcbType::GromEmu,
        }
    }

    fn window(&self) -> &dyn RomWindow {
        match self {
            Pcb::Standard(pcb) => pcb,
            Pcb::Paged12k(pcb) => pcb,
            Pcb::Paged16k(pcb) => pcb,
            Pcb::MiniMem(pcb) => pcb,
            Pcb::SuperSpace(pcb) => pcb,
            Pcb::Mbx(pcb) => pcb,
            Pcb::Paged379i(pcb) => pcb,
            Pcb::Paged378(pcb) => pcb,
            Pcb::Paged377(pcb) => pcb,
            Pcb::PagedCru(pcb) => pcb,
            Pcb::GromEmu(pcb) => pcb,
        }
    }

    fn window_mut(&mut self) -> &mut dyn RomWindow {
        match self {
            Pcb::Standard(pcb) => pcb,
            Pcb::Paged12k(pcb) => pcb,
            Pcb::Paged16k(pcb) => pcb,
            Pcb::MiniMem(pcb) => pcb,
            Pcb::SuperSpace(pcb) => pcb,
            Pcb::Mbx(pcb) => pcb,
            Pcb::Paged379i(pcb) => pcb,
            Pcb::Paged378(pcb) => pcb,
            Pcb::Paged377(pcb) => pcb,
            Pcb::PagedCru(pcb) => pcb,
            Pcb::GromEmu(pcb) => pcb,
        }
    }
}

/// A cartridge board with its GROMs and bank switching logic.
#[derive(Clone, Encode, Decode)]
pub struct Board {
    tag: String,
    pcb: Pcb,
    groms: Vec<Grom>,
    romspace_selected: bool,
    grom_idle: bool,
}

impl Board {
    /// Assembles a board of `pcb_type` from the socket contents. `tag` names the owning
    /// cartridge in diagnostics.
    pub fn new(tag: &str, pcb_type: PcbType, contents: BoardContents) -> Self {
        if contents.grom.len() > GROM_REGION_SIZE {
            log::warn!(
                target: "config",
                "{}: GROM dump has {} bytes, only {} bytes are used",
                tag,
                contents.grom.len(),
                GROM_REGION_SIZE
            );
        }
        let mut grom_region = vec![0; GROM_REGION_SIZE];
        let grom_length = contents.grom.len().min(GROM_REGION_SIZE);
        grom_region[..grom_length].copy_from_slice(&contents.grom[..grom_length]);

        // The GROM emulation serves the GROM space itself.
        let groms = if pcb_type == PcbType::GromEmu {
            Vec::new()
        } else {
            grom_chips(&grom_region, contents.grom.len())
        };

        let rom_size = contents.rom.len();
        let rom = RomImage::with_dumps(&contents.rom, contents.rom2.as_deref());
        log::debug!(
            target: "config",
            "{}: {} board with {} GROMs, {} bytes ROM, {} bytes RAM",
            tag,
            pcb_type,
            groms.len(),
            rom.len(),
            contents.ram.len()
        );
        let grom: &[u8] = if contents.grom.is_empty() {
            &[]
        } else {
            &grom_region
        };
        Self {
            tag: tag.to_string(),
            pcb: Pcb::new(pcb_type, rom, rom_size, contents.ram, grom),
            groms,
            romspace_selected: false,
            grom_idle: true,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn pcb(&self) -> &Pcb {
        &self.pcb
    }

    pub fn pcb_type(&self) -> PcbType {
        self.pcb.pcb_type()
    }

    pub fn groms(&self) -> &[Grom] {
        &self.groms
    }

    pub fn ram(&self) -> &[u8] {
        self.pcb.window().ram()
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        self.pcb.window_mut().ram_mut()
    }

    /// Restores the registers and memory contents of a board from a save state.
    pub fn restore(&mut self, saved: Board) {
        *self = Board {
            tag: std::mem::take(&mut self.tag),
            ..saved
        };
    }
}

/// One chip per started 8 KiB of GROM content, starting with GROM 3 at 0x6000.
fn grom_chips(region: &[u8], content_length: usize) -> Vec<Grom> {
    (0..GROM_REGION_SIZE / GROM_BAND_SIZE)
        .take_while(|chip| content_length > chip * GROM_BAND_SIZE)
        .map(|chip| {
            let start = chip * GROM_BAND_SIZE;
            Grom::new(3 + chip as u8, &region[start..start + GROM_BAND_SIZE])
        })
        .collect()
}

impl CartridgeBus for Board {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        if let Pcb::GromEmu(emu) = &mut self.pcb {
            return emu.readz(offset, self.romspace_selected);
        }
        if self.romspace_selected {
            let value = self.pcb.window().read(offset);
            log::trace!(target: "read", "{}: {:04x} -> {:02x?}", self.tag, offset, value);
            value
        } else {
            // Every chip has to see the access to keep its address counter in sync.
            self.groms
                .iter_mut()
                .fold(None, |value, grom| grom.readz().or(value))
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        if let Pcb::GromEmu(emu) = &mut self.pcb {
            emu.write(offset, value, self.romspace_selected, &self.tag);
            return;
        }
        if self.romspace_selected {
            log::trace!(target: "write", "{}: {:04x} <- {:02x}", self.tag, offset, value);
            self.pcb.window_mut().write(offset, value, &self.tag);
        } else {
            for grom in &mut self.groms {
                grom.write(value);
            }
        }
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.pcb.window().crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        self.pcb.window_mut().cruwrite(offset, bit, &self.tag);
    }

    fn romgq_line(&mut self, asserted: bool) {
        self.romspace_selected = asserted;
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        if let Pcb::GromEmu(emu) = &mut self.pcb {
            emu.set_gromlines(lines, asserted);
        }
        for grom in &mut self.groms {
            grom.set_lines(lines, asserted);
        }
        if asserted {
            self.grom_idle = false;
        }
    }

    fn gclock_in(&mut self, asserted: bool) {
        if let Pcb::GromEmu(emu) = &self.pcb {
            if asserted {
                self.grom_idle = !emu.grom_selected();
            }
        }
        for grom in &mut self.groms {
            grom.gclock_in(asserted);
            self.grom_idle = grom.is_idle();
        }
    }

    fn is_grom_idle(&self) -> bool {
        self.grom_idle
    }
}

/// Debug access to the image contents.
impl Board {
    /// Reads a byte of the cartridge GROM space without side effects.
    pub fn peek_grom(&self, address: u16) -> Option<u8> {
        if let Pcb::GromEmu(emu) = &self.pcb {
            return emu.peek_grom(address);
        }
        self.groms.iter().find_map(|grom| grom.peek(address))
    }
}
