//! Emulation of the GROM port of the TI-99/4A and TI-99/8 home computers.
//!
//! The GROM port is the cartridge slot of the console. Besides the cartridge ROM window at
//! 0x6000 it carries the GROM bus, so cartridges can bring their own GROMs. `GromPort` is the
//! front end the console talks to; behind it sits one connector (a single slot, the
//! multi-cartridge expander or the GRAM Kracker) holding the cartridges.
//!
//! Log output is enabled with `logging::init()` and filtered by the `GROMPORT_LOG` variable,
//! e.g. `GROMPORT_LOG=bankswitch=debug,grom=trace`.
//!
//! ```no_run
//! use ti99_gromport::common::logging;
//! use ti99_gromport::CartridgeBus;
//! use ti99_gromport::GromLines;
//! use ti99_gromport::GromPort;
//! use ti99_gromport::PortConfig;
//!
//! logging::init();
//! let mut port = GromPort::new(PortConfig::default())?;
//! port.load_rpk(0, "extended_basic.rpk".as_ref())?;
//!
//! port.romgq_line(true);
//! let value = port.readz(0x6000);
//! port.romgq_line(false);
//!
//! port.set_gromlines(GromLines::read_data(), true);
//! let grom_value = port.readz(0x9800);
//! port.set_gromlines(GromLines::read_data(), false);
//!
//! port.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod common;
pub mod components;
pub mod config;

use std::io::Read;
use std::io::Seek;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use bitcode::Decode;
use bitcode::Encode;

pub use crate::common::bus::CartridgeBus;
pub use crate::common::bus::GromLines;
pub use crate::common::pcb_type::PcbType;
pub use crate::components::cartridge::SoftwareCartridge;
pub use crate::components::connector::ConnectorKind;
pub use crate::components::rpk::RpkBuilder;
pub use crate::components::rpk::RpkError;
pub use crate::components::rpk::RpkErrorKind;
pub use crate::config::Machine;
pub use crate::config::PortConfig;
use crate::common::nvram::NvramStore;
use crate::components::cartridge::Cartridge;
use crate::components::cartridge::CartridgeImage;
use crate::components::connector::Connector;
use crate::components::connector::ConnectorState;
use crate::components::connector::MULTI_SLOTS;
use crate::components::rpk::RpkReader;

type ResetHandler = Box<dyn FnMut(bool)>;

#[derive(Encode, Decode)]
struct PortState {
    romgq: bool,
    connector: ConnectorState,
}

pub struct GromPort {
    config: PortConfig,
    address_mask: u16,
    nvram: NvramStore,
    reader: RpkReader,
    connector: Connector,
    romgq: bool,
    reset_pulses: usize,
    console_reset: Option<ResetHandler>,
}

impl GromPort {
    pub fn new(config: PortConfig) -> Result<Self> {
        config.validate()?;
        let nvram = NvramStore::new(&config.nvram_directory, &config.system_name);
        let connector = Connector::new(&config, &nvram)?;
        log::info!(
            target: "config",
            "GROM port with {} connector ({} slots)",
            connector.kind(),
            connector.slot_count()
        );
        Ok(Self {
            address_mask: config.machine.address_mask(),
            reader: RpkReader::new(&config.nvram_directory),
            config,
            nvram,
            connector,
            romgq: false,
            reset_pulses: 0,
            console_reset: None,
        })
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut Connector {
        &mut self.connector
    }

    pub fn cartridge(&self, slot: usize) -> Option<&Cartridge> {
        self.connector.cartridges().get(slot)
    }

    pub fn is_loaded(&self, slot: usize) -> bool {
        self.cartridge(slot).is_some_and(Cartridge::is_loaded)
    }

    /// Opens the RPK package at `path` and inserts it into `slot`.
    ///
    /// A cartridge already in `slot` is removed before the package is opened, so that its
    /// persistent memory is on disk when the new board reads it.
    pub fn load_rpk(&mut self, slot: usize, path: &Path) -> Result<()> {
        self.prepare_slot(slot)?;
        let rpk = self
            .reader
            .open(path, &self.config.system_name)
            .with_context(|| format!("Cannot load {}", path.display()))?;
        self.insert(slot, CartridgeImage::Rpk(rpk))
    }

    pub fn load_rpk_from<R: Read + Seek>(&mut self, slot: usize, reader: R) -> Result<()> {
        self.prepare_slot(slot)?;
        let rpk = self.reader.open_archive(reader, &self.config.system_name)?;
        self.insert(slot, CartridgeImage::Rpk(rpk))
    }

    pub fn load_software(&mut self, slot: usize, software: SoftwareCartridge) -> Result<()> {
        self.prepare_slot(slot)?;
        self.insert(slot, CartridgeImage::Software(software))
    }

    /// Removes the cartridge in `slot`, writing back its persistent memory.
    pub fn unload(&mut self, slot: usize) -> Result<()> {
        let Some(cartridge) = self.connector.cartridge_mut(slot) else {
            bail!("Connector has no slot {}", slot)
        };
        cartridge.unload(&self.nvram)
    }

    /// Removes all cartridges and stores the memory of the GRAM Kracker.
    ///
    /// All cartridges are removed even if saving one of them fails; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut result = Ok(());
        for cartridge in self.connector.cartridges_mut() {
            let unloaded = cartridge.unload(&self.nvram);
            if result.is_ok() {
                result = unloaded;
            }
        }
        let saved = self.connector.save_nvram(&self.nvram);
        result.and(saved)
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.connector.slot_count() {
            bail!(
                "The {} connector has no slot {}",
                self.connector.kind(),
                slot
            );
        }
        Ok(())
    }

    fn prepare_slot(&mut self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.unload(slot)
    }

    fn insert(&mut self, slot: usize, image: CartridgeImage) -> Result<()> {
        let Some(cartridge) = self.connector.cartridge_mut(slot) else {
            bail!("Connector has no slot {}", slot)
        };
        cartridge.load(image, &self.nvram)?;
        self.cartridge_inserted();
        Ok(())
    }

    /// Called after a cartridge was plugged in. Pulses the console reset line if enabled.
    pub fn cartridge_inserted(&mut self) {
        if !self.config.reset_on_insert {
            return;
        }
        log::info!(target: "change", "Resetting console after cartridge insertion");
        if let Some(handler) = self.console_reset.as_mut() {
            handler(true);
            handler(false);
        }
        self.reset_pulses += 1;
    }

    /// Connects the console reset line. `handler` receives the line state.
    pub fn on_console_reset(&mut self, handler: impl FnMut(bool) + 'static) {
        self.console_reset = Some(Box::new(handler));
    }

    /// Number of reset pulses sent to the console.
    pub fn reset_pulses(&self) -> usize {
        self.reset_pulses
    }

    /// Device reset. Switch positions are read again from the configuration.
    pub fn reset(&mut self) {
        self.romgq = false;
        self.connector.reset(&self.config);
    }

    pub fn set_reset_on_insert(&mut self, enabled: bool) {
        self.config.reset_on_insert = enabled;
    }

    /// Moves the slot switch of the multi-cartridge expander (0 = auto).
    pub fn set_multi_slot_switch(&mut self, value: u8) -> Result<()> {
        if value as usize > MULTI_SLOTS {
            bail!("Invalid multi-cartridge slot {}", value);
        }
        let Connector::Multi(multi) = &mut self.connector else {
            bail!("The {} connector has no slot switch", self.connector.kind())
        };
        multi.switch_changed(value);
        self.config.multi_slot = value;
        Ok(())
    }

    pub fn set_gkracker_switch(&mut self, number: u8, position: u8) -> Result<()> {
        let Connector::GramKracker(gkracker) = &mut self.connector else {
            bail!("The {} connector has no GRAM Kracker switches", self.connector.kind())
        };
        gkracker.set_switch(number, position)?;
        self.config.gkracker = gkracker.switches();
        Ok(())
    }

    pub fn save_state(&self) -> Vec<u8> {
        bitcode::encode(&PortState {
            romgq: self.romgq,
            connector: self.connector.save_state(),
        })
    }

    /// Restores a state from `save_state`. Fails without changes if the connector or the
    /// inserted cartridges differ.
    pub fn load_state(&mut self, encoded: &[u8]) -> Result<()> {
        let state: PortState = bitcode::decode(encoded)?;
        self.connector.load_state(state.connector)?;
        self.romgq = state.romgq;
        Ok(())
    }
}

impl CartridgeBus for GromPort {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        self.connector.readz(offset & self.address_mask)
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.connector.write(offset & self.address_mask, value);
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.connector.crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        self.connector.cruwrite(offset, bit);
    }

    fn romgq_line(&mut self, asserted: bool) {
        self.romgq = asserted;
        self.connector.romgq_line(asserted);
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        self.connector.set_gromlines(lines, asserted);
    }

    fn gclock_in(&mut self, asserted: bool) {
        self.connector.gclock_in(asserted);
    }

    fn is_grom_idle(&self) -> bool {
        self.connector.is_grom_idle()
    }
}
