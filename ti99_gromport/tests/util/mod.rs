//! Helpers that drive the GROM port like the console does.
#![allow(dead_code)]
use std::path::PathBuf;

use tempfile::TempDir;
use ti99_gromport::common::logging;
use ti99_gromport::CartridgeBus;
use ti99_gromport::GromLines;
use ti99_gromport::GromPort;
use ti99_gromport::PortConfig;
use ti99_gromport::RpkBuilder;

/// CPU address of the GROM read data port of slot 0.
pub const GROM_READ_DATA: u16 = 0x9800;
/// CPU address of the GROM write data port.
pub const GROM_WRITE_DATA: u16 = 0x9C00;
/// CPU address of the GROM write address port of slot 0.
pub const GROM_WRITE_ADDRESS: u16 = 0x9C02;
/// Each slot of the multi-cartridge expander answers 4 bytes further up.
pub const SLOT_STRIDE: u16 = 4;

/// A port with its NVRAM directory inside a temporary directory.
pub struct TestPort {
    pub dir: TempDir,
    pub port: GromPort,
}

impl TestPort {
    pub fn new() -> Self {
        Self::with_config(PortConfig::default())
    }

    pub fn with_config(config: PortConfig) -> Self {
        logging::test_init(false);
        let dir = tempfile::tempdir().unwrap();
        let port = GromPort::new(PortConfig {
            nvram_directory: dir.path().join("nvram"),
            ..config
        })
        .unwrap();
        Self { dir, port }
    }

    pub fn nvram_path(&self, file: &str) -> PathBuf {
        self.dir.path().join("nvram").join("ti99_4a").join(file)
    }

    /// Writes `rpk` into the temporary directory and inserts it into `slot`.
    pub fn insert(&mut self, slot: usize, name: &str, rpk: &RpkBuilder) {
        let path = self.dir.path().join(name);
        rpk.write_to(&path).unwrap();
        self.port.load_rpk(slot, &path).unwrap();
    }

    pub fn rom_read(&mut self, address: u16) -> Option<u8> {
        self.port.romgq_line(true);
        let value = self.port.readz(address);
        self.port.romgq_line(false);
        value
    }

    pub fn rom_write(&mut self, address: u16, value: u8) {
        self.port.romgq_line(true);
        self.port.write(address, value);
        self.port.romgq_line(false);
    }

    pub fn grom_set_address(&mut self, slot: u16, address: u16) {
        let port_address = GROM_WRITE_ADDRESS + SLOT_STRIDE * slot;
        self.port.set_gromlines(GromLines::write_address(), true);
        self.port.write(port_address, (address >> 8) as u8);
        self.port.write(port_address, address as u8);
        self.port.set_gromlines(GromLines::write_address(), false);
        self.port.gclock_in(true);
        self.port.gclock_in(false);
    }

    pub fn grom_read(&mut self, slot: u16) -> Option<u8> {
        self.port.set_gromlines(GromLines::read_data(), true);
        let value = self.port.readz(GROM_READ_DATA + SLOT_STRIDE * slot);
        self.port.set_gromlines(GromLines::read_data(), false);
        self.port.gclock_in(true);
        self.port.gclock_in(false);
        value
    }

    pub fn grom_write(&mut self, value: u8) {
        self.port.set_gromlines(GromLines::write_data(), true);
        self.port.write(GROM_WRITE_DATA, value);
        self.port.set_gromlines(GromLines::write_data(), false);
    }
}

/// ROM of `banks` 8 KiB banks, every byte holds its bank number.
pub fn bank_numbered_rom(banks: u8) -> Vec<u8> {
    (0..banks).flat_map(|bank| vec![bank; 0x2000]).collect()
}

/// Standard cartridge with GROM bytes `grom` and ROM bytes `rom`.
pub fn standard_rpk(grom: u8, rom: u8) -> RpkBuilder {
    RpkBuilder::new("standard")
        .rom("gromimage", "phm3055g.bin", &[grom; 0x2000])
        .rom("romimage", "phm3055c.bin", &[rom; 0x2000])
        .socket("grom_socket", "gromimage")
        .socket("rom_socket", "romimage")
}
