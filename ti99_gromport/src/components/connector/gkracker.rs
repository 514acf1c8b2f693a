//! The GRAM Kracker by Miller's Graphics.
//!
//! A cartridge-shaped device with 80 KiB battery backed RAM that can stand in for the console
//! GROMs, the cartridge GROMs and the cartridge ROM. A guest cartridge plugs into its top; the
//! guest receives every access and overrides the GRAM Kracker on reads, which is how its
//! contents get copied into the GRAM Kracker RAM.
//!
//! RAM layout:
//!
//! | Range           | Contents                        |
//! |-----------------|---------------------------------|
//! | 0x00000-0x0FFFF | GRAM 0-7 (GROM address space)   |
//! | 0x10000-0x11FFF | ROM bank 1 (0x6000 CPU space)   |
//! | 0x12000-0x13FFF | ROM bank 2                      |
//!
//! GRAM 1 is shadowed by the 8 KiB loader GROM unless switch 5 turns the loader off. The
//! address counter cannot be read back; it follows the console GROMs and does not wrap at
//! 8 KiB boundaries.
use std::io::ErrorKind;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use bitcode::Decode;
use bitcode::Encode;
use intbits::Bits;
use serde::Deserialize;
use serde::Serialize;
use sha1::Digest;
use sha1::Sha1;

use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::common::nvram::NvramStore;
use crate::common::util::hex_string;
use crate::components::cartridge::Cartridge;

pub const GK_RAM_SIZE: usize = 0x14000;
pub const GK_LOADER_SIZE: usize = 0x2000;
pub const GK_NVRAM_FILE: &str = "gkracker.nv";
/// SHA1 of the known good loader ROM dump (gkracker.bin)
pub const GK_LOADER_SHA1: &str = "a3bd5257c63e190800921b52dbe3ffa91ad91113";

const BANK1_BASE: usize = 0x10000;
const BANK2_BASE: usize = 0x12000;

/// Switch 1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum KrackerMode {
    Off,
    #[default]
    Normal,
}

/// Switch 2
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum Gram0Switch {
    Gram0,
    #[default]
    OpSys,
}

/// Switch 3
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum Gram12Switch {
    Gram12,
    #[default]
    TiBasic,
}

/// Switch 4, a three position switch. The middle position write-protects the ROM banks and
/// selects them with the page flag instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum BankSwitch {
    Bank1,
    #[default]
    WriteProtect,
    Bank2,
}

/// Switch 5
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum LoaderSwitch {
    #[default]
    On,
    Off,
}

/// Positions of the five front switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(default)]
pub struct GkSwitches {
    pub mode: KrackerMode,
    pub gram0: Gram0Switch,
    pub gram12: Gram12Switch,
    pub bank: BankSwitch,
    pub loader: LoaderSwitch,
}

impl GkSwitches {
    /// Sets switch `number` (1-5) to the numeric `position` of its DIP setting.
    pub fn set(&mut self, number: u8, position: u8) -> Result<()> {
        match (number, position) {
            (1, 0) => self.mode = KrackerMode::Off,
            (1, 1) => self.mode = KrackerMode::Normal,
            (2, 0) => self.gram0 = Gram0Switch::Gram0,
            (2, 1) => self.gram0 = Gram0Switch::OpSys,
            (3, 0) => self.gram12 = Gram12Switch::Gram12,
            (3, 1) => self.gram12 = Gram12Switch::TiBasic,
            (4, 0) => self.bank = BankSwitch::Bank1,
            (4, 1) => self.bank = BankSwitch::WriteProtect,
            (4, 2) => self.bank = BankSwitch::Bank2,
            (5, 0) => self.loader = LoaderSwitch::On,
            (5, 1) => self.loader = LoaderSwitch::Off,
            (1..=5, _) => bail!("Invalid position {} for GRAM Kracker switch {}", position, number),
            _ => bail!("GRAM Kracker has no switch {}", number),
        }
        Ok(())
    }

    pub fn position(&self, number: u8) -> Option<u8> {
        Some(match number {
            1 => self.mode as u8,
            2 => self.gram0 as u8,
            3 => self.gram12 as u8,
            4 => self.bank as u8,
            5 => self.loader as u8,
            _ => return None,
        })
    }

    fn gram_readable(&self, id: u16) -> bool {
        match id {
            0 => self.gram0 == Gram0Switch::Gram0,
            1 => self.loader == LoaderSwitch::Off && self.gram12 == Gram12Switch::Gram12,
            2 => self.gram12 == Gram12Switch::Gram12,
            _ => self.mode == KrackerMode::Normal,
        }
    }

    fn gram_writable(&self, id: u16) -> bool {
        match id {
            0 => self.gram0 == Gram0Switch::Gram0 && self.bank != BankSwitch::WriteProtect,
            1 => self.gram12 == Gram12Switch::Gram12 && self.loader == LoaderSwitch::Off,
            2 => self.gram12 == Gram12Switch::Gram12,
            _ => self.mode == KrackerMode::Normal,
        }
    }
}

#[derive(Clone, Encode, Decode)]
pub struct GramKrackerState {
    pub switches: GkSwitches,
    pub grom_address: u16,
    /// Next address write sets the low byte.
    pub waddr_lsb: bool,
    pub ram_page: u8,
    pub grom_selected: bool,
    pub romspace_selected: bool,
    ram: Vec<u8>,
}

impl GramKrackerState {
    fn new(switches: GkSwitches, ram: Vec<u8>) -> Self {
        Self {
            switches,
            grom_address: 0,
            waddr_lsb: false,
            ram_page: 0,
            grom_selected: false,
            romspace_selected: false,
            ram,
        }
    }

    pub fn ram_len(&self) -> usize {
        self.ram.len()
    }
}

pub struct GramKrackerConnector {
    guest: Cartridge,
    loader: Vec<u8>,
    state: GramKrackerState,
}

impl GramKrackerConnector {
    pub fn new(switches: GkSwitches, loader_rom: Option<&Path>, nvram: &NvramStore) -> Result<Self> {
        let ram = match nvram.load(GK_NVRAM_FILE, GK_RAM_SIZE)? {
            Some(ram) => {
                log::debug!(target: "gkracker", "Reading NVRAM");
                ram
            }
            None => default_nvram(),
        };
        Ok(Self {
            guest: Cartridge::new("cartridge"),
            loader: load_loader_rom(loader_rom)?,
            state: GramKrackerState::new(switches, ram),
        })
    }

    pub fn guest(&self) -> &Cartridge {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut Cartridge {
        &mut self.guest
    }

    pub fn ram(&self) -> &[u8] {
        &self.state.ram
    }

    pub fn switches(&self) -> GkSwitches {
        self.state.switches
    }

    pub fn grom_address(&self) -> u16 {
        self.state.grom_address
    }

    pub fn ram_page(&self) -> u8 {
        self.state.ram_page
    }

    pub fn set_switch(&mut self, number: u8, position: u8) -> Result<()> {
        self.state.switches.set(number, position)?;
        log::debug!(target: "config", "GRAM Kracker switch {} set to {}", number, position);
        Ok(())
    }

    pub fn reset(&mut self, switches: GkSwitches) {
        self.state.switches = switches;
        self.state.grom_address = 0;
        self.state.ram_page = 0;
        self.state.waddr_lsb = false;
        self.state.grom_selected = false;
    }

    pub fn state(&self) -> GramKrackerState {
        self.state.clone()
    }

    pub fn restore(&mut self, state: GramKrackerState) {
        self.state = state;
    }

    pub fn save_nvram(&self, nvram: &NvramStore) -> Result<()> {
        log::debug!(target: "gkracker", "Writing NVRAM");
        nvram
            .save(GK_NVRAM_FILE, &self.state.ram)
            .context("Cannot save GRAM Kracker memory")
    }

    /// Advances the address counter after a data access. No wrap at 8 KiB boundaries.
    fn advance_address(&mut self) {
        self.state.grom_address = self.state.grom_address.wrapping_add(1);
        self.state.waddr_lsb = false;
    }

    fn grom_read(&mut self) -> Option<u8> {
        let address = self.state.grom_address;
        let id = address >> 13;
        let switches = self.state.switches;
        let mut value = None;
        if switches.gram_readable(id) {
            value = Some(self.state.ram[address as usize]);
        }
        if id == 1 && switches.loader == LoaderSwitch::On {
            value = self.loader.get((address & 0x1FFF) as usize).copied();
        }
        self.advance_address();
        log::trace!(target: "gkracker", "GROM read {:04x} -> {:02x?}", address, value);
        value
    }

    fn grom_write(&mut self, offset: u16, value: u8) {
        if offset.bit(1) {
            if self.state.waddr_lsb {
                self.state.grom_address = (self.state.grom_address & 0xFF00) | value as u16;
                self.state.waddr_lsb = false;
                log::trace!(
                    target: "gkracker",
                    "Set GROM address {:04x}",
                    self.state.grom_address
                );
            } else {
                self.state.grom_address = (self.state.grom_address & 0x00FF) | (value as u16) << 8;
                self.state.waddr_lsb = true;
            }
            return;
        }
        let address = self.state.grom_address;
        if self.state.switches.gram_writable(address >> 13) {
            log::trace!(target: "gkracker", "GROM write {:04x} <- {:02x}", address, value);
            self.state.ram[address as usize] = value;
        } else {
            log::debug!(
                target: "gkracker",
                "GROM write {:04x} <- {:02x} blocked by switches",
                address,
                value
            );
        }
        self.advance_address();
    }

    fn bank_base(&self) -> usize {
        match self.state.switches.bank {
            BankSwitch::Bank1 => BANK1_BASE,
            BankSwitch::Bank2 => BANK2_BASE,
            BankSwitch::WriteProtect if self.state.ram_page == 0 => BANK1_BASE,
            BankSwitch::WriteProtect => BANK2_BASE,
        }
    }
}

impl CartridgeBus for GramKrackerConnector {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        let mut value = None;
        if self.state.grom_selected && !offset.bit(1) {
            value = self.grom_read();
        }
        if self.state.romspace_selected && self.state.switches.mode == KrackerMode::Normal {
            let address = (offset & 0x1FFF) as usize | self.bank_base();
            value = Some(self.state.ram[address]);
            log::trace!(
                target: "gkracker",
                "Read {:04x} -> {:02x}",
                offset | 0x6000,
                self.state.ram[address]
            );
        }
        // Guest contents take precedence.
        self.guest.readz(offset).or(value)
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.guest.write(offset, value);
        if self.state.grom_selected {
            self.grom_write(offset, value);
        }
        if self.state.romspace_selected && self.state.switches.mode == KrackerMode::Normal {
            let offset = offset & 0x1FFF;
            log::trace!(target: "gkracker", "Write {:04x} <- {:02x}", offset | 0x6000, value);
            match self.state.switches.bank {
                BankSwitch::Bank1 => self.state.ram[offset as usize | BANK1_BASE] = value,
                BankSwitch::Bank2 => self.state.ram[offset as usize | BANK2_BASE] = value,
                BankSwitch::WriteProtect => self.state.ram_page = offset.bit(1) as u8,
            }
        }
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.guest.crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        self.guest.cruwrite(offset, bit);
    }

    fn romgq_line(&mut self, asserted: bool) {
        self.state.romspace_selected = asserted;
        self.guest.romgq_line(asserted);
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        self.state.grom_selected = asserted;
        self.guest.set_gromlines(lines, asserted);
    }

    fn gclock_in(&mut self, asserted: bool) {
        self.guest.gclock_in(asserted);
    }

    fn is_grom_idle(&self) -> bool {
        self.guest.is_grom_idle()
    }
}

/// Writes one entry of the GPL program menu chain into `ram`.
fn install_menu(ram: &mut [u8], text: &str, entry: usize, next: u16, start: u16) {
    ram[entry..entry + 2].copy_from_slice(&next.to_be_bytes());
    ram[entry + 2..entry + 4].copy_from_slice(&start.to_be_bytes());
    ram[entry + 4] = text.len() as u8;
    ram[entry + 5..entry + 5 + text.len()].copy_from_slice(text.as_bytes());
}

/// Factory contents: a GROM 3 header with a menu that reports the memory as tested.
pub fn default_nvram() -> Vec<u8> {
    log::debug!(target: "gkracker", "Creating default NVRAM");
    let mut ram = vec![0; GK_RAM_SIZE];
    ram[0x6000..0x6003].copy_from_slice(&[0xAA, 0x01, 0x01]);
    ram[0x6006..0x6008].copy_from_slice(&[0x60, 0x20]);
    let menu = [
        ("GROM 3 OK", 0x60E0, 0x0000),
        ("GROM 4 OK", 0x60C0, 0x60E0),
        ("GROM 5 OK", 0x60A0, 0x60C0),
        ("GROM 6 OK", 0x6080, 0x60A0),
        ("PROM   OK", 0x6060, 0x6080),
        ("RAMS   OK", 0x6040, 0x6060),
        ("OPTION GRAMS OK", 0x6020, 0x6040),
    ];
    for (text, entry, next) in menu {
        install_menu(&mut ram, text, entry, next, 0x6100);
    }
    // GPL EXIT
    ram[0x6100] = 0x0B;
    ram
}

fn load_loader_rom(path: Option<&Path>) -> Result<Vec<u8>> {
    let Some(path) = path else {
        log::warn!("No GRAM Kracker loader ROM configured, loader GROM reads as 0");
        return Ok(vec![0; GK_LOADER_SIZE]);
    };
    let mut rom = match std::fs::read(path) {
        Ok(rom) => rom,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::warn!(
                "GRAM Kracker loader ROM {} not found, loader GROM reads as 0",
                path.display()
            );
            return Ok(vec![0; GK_LOADER_SIZE]);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Cannot read {}", path.display()));
        }
    };
    let digest = hex_string(&Sha1::digest(&rom));
    if digest != GK_LOADER_SHA1 {
        log::warn!(
            "GRAM Kracker loader ROM {} has unexpected SHA1 {}",
            path.display(),
            digest
        );
    }
    rom.resize(GK_LOADER_SIZE, 0);
    Ok(rom)
}
