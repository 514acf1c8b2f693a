//! Configuration of the GROM port, loaded from JSON.
//!
//! All fields have defaults, so `{}` is a valid configuration: a single cartridge slot on a
//! TI-99/4A that resets the console when a cartridge is plugged in.
//!
//! ```json
//! {
//!     "machine": "ti99_4a",
//!     "connector": "gkracker",
//!     "gkracker": { "mode": "normal", "bank": "bank1" },
//!     "gkracker_rom": "roms/gkracker.bin"
//! }
//! ```
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::components::connector::ConnectorKind;
use crate::components::connector::GkSwitches;
use crate::components::connector::MULTI_SLOTS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Machine {
    #[default]
    #[serde(rename = "ti99_4a")]
    Ti99_4a,
    #[serde(rename = "ti99_8")]
    Ti99_8,
}

impl Machine {
    /// Mask for the port offset. The TI-99/4A decodes 13 address lines, the TI-99/8 14.
    pub fn address_mask(self) -> u16 {
        match self {
            Machine::Ti99_4a => 0x1FFF,
            Machine::Ti99_8 => 0x3FFF,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub machine: Machine,
    pub connector: ConnectorKind,
    /// Pulse the console reset line when a cartridge is inserted.
    pub reset_on_insert: bool,
    /// Multi-cartridge switch: 0 selects slots automatically, 1-4 fixes the slot.
    pub multi_slot: u8,
    pub gkracker: GkSwitches,
    /// Loader ROM of the GRAM Kracker (gkracker.bin, 8 KiB)
    pub gkracker_rom: Option<PathBuf>,
    pub system_name: String,
    pub nvram_directory: PathBuf,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            machine: Machine::default(),
            connector: ConnectorKind::default(),
            reset_on_insert: true,
            multi_slot: 0,
            gkracker: GkSwitches::default(),
            gkracker_rom: None,
            system_name: "ti99_4a".to_string(),
            nvram_directory: PathBuf::from("nvram"),
        }
    }
}

impl PortConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        let config: PortConfig =
            serde_path_to_error::deserialize(deserializer).context("Invalid port configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Cannot load {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.machine == Machine::Ti99_8 && self.connector == ConnectorKind::Gkracker {
            bail!("The GRAM Kracker does not fit into the TI-99/8");
        }
        if self.multi_slot as usize > MULTI_SLOTS {
            bail!(
                "Invalid multi-cartridge slot {} (0 = auto, 1-{})",
                self.multi_slot,
                MULTI_SLOTS
            );
        }
        if self.system_name.is_empty() {
            bail!("system_name must not be empty");
        }
        log::debug!(
            target: "config",
            "{:?} with {} connector, reset on insert: {}",
            self.machine,
            self.connector,
            self.reset_on_insert
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::components::connector::BankSwitch;
    use crate::components::connector::KrackerMode;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(PortConfig::from_json_str("{}").unwrap(), PortConfig::default());
        assert!(PortConfig::default().reset_on_insert);
        assert_eq!(PortConfig::default().machine.address_mask(), 0x1FFF);
    }

    #[test]
    fn test_parse_config() {
        let config = PortConfig::from_json_str(
            r#"{
                "machine": "ti99_8",
                "connector": "multi",
                "multi_slot": 2,
                "reset_on_insert": false,
                "nvram_directory": "/tmp/nvram"
            }"#,
        )
        .unwrap();
        assert_eq!(config.machine.address_mask(), 0x3FFF);
        assert_eq!(config.connector, ConnectorKind::Multi);
        assert_eq!(config.multi_slot, 2);
        assert!(!config.reset_on_insert);
        assert_eq!(config.nvram_directory, PathBuf::from("/tmp/nvram"));
        assert_eq!(config.system_name, "ti99_4a");
    }

    #[test]
    fn test_partial_gkracker_switches() {
        let config = PortConfig::from_json_str(
            r#"{ "connector": "gkracker", "gkracker": { "mode": "off", "bank": "bank2" } }"#,
        )
        .unwrap();
        assert_eq!(config.gkracker.mode, KrackerMode::Off);
        assert_eq!(config.gkracker.bank, BankSwitch::Bank2);
        assert_eq!(config.gkracker.loader, GkSwitches::default().loader);
    }

    #[test]
    fn test_errors_name_the_field() {
        let error = PortConfig::from_json_str(r#"{ "gkracker": { "bank": "bank3" } }"#)
            .unwrap_err();
        assert!(format!("{:#}", error).contains("gkracker.bank"));
    }

    #[test]
    fn test_validation() {
        assert!(PortConfig::from_json_str(r#"{ "machine": "ti99_8", "connector": "gkracker" }"#)
            .is_err());
        assert!(PortConfig::from_json_str(r#"{ "multi_slot": 5 }"#).is_err());
        assert!(PortConfig::from_json_str(r#"{ "system_name": "" }"#).is_err());
    }
}
