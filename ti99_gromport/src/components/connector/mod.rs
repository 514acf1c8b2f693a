//! Connectors between the GROM port and the cartridges.
//!
//! The port holds exactly one connector, chosen by configuration:
//! - `SingleConnector`: one cartridge, plugged directly into the port.
//! - `MultiConnector`: the cartridge expander with four slots. Slots are selected by the GROM
//!   address bits or fixed by a switch.
//! - `GramKrackerConnector`: the GRAM Kracker, a battery backed GROM/ROM emulator with a
//!   guest cartridge slot on top.
mod gkracker;
mod multi;
mod single;
#[cfg(test)]
mod test;

use anyhow::ensure;
use anyhow::Result;
use bitcode::Decode;
use bitcode::Encode;
use serde::Deserialize;
use serde::Serialize;
use strum::Display;

pub use self::gkracker::BankSwitch;
pub use self::gkracker::Gram0Switch;
pub use self::gkracker::Gram12Switch;
pub use self::gkracker::GramKrackerConnector;
pub use self::gkracker::GramKrackerState;
pub use self::gkracker::GkSwitches;
pub use self::gkracker::KrackerMode;
pub use self::gkracker::LoaderSwitch;
pub use self::gkracker::GK_LOADER_SHA1;
pub use self::gkracker::GK_LOADER_SIZE;
pub use self::gkracker::GK_NVRAM_FILE;
pub use self::gkracker::GK_RAM_SIZE;
pub use self::multi::MultiConnector;
pub use self::multi::MultiState;
pub use self::multi::MULTI_SLOTS;
pub use self::single::SingleConnector;
use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::common::nvram::NvramStore;
use crate::components::cartridge::pcb::Board;
use crate::components::cartridge::Cartridge;
use crate::config::PortConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    #[default]
    #[strum(to_string = "single")]
    Single,
    #[strum(to_string = "multi")]
    Multi,
    #[strum(to_string = "gkracker")]
    Gkracker,
}

/// Register state of a connector and its inserted boards.
#[derive(Clone, Encode, Decode)]
pub enum ConnectorState {
    Single {
        board: Option<Board>,
    },
    Multi {
        state: MultiState,
        boards: Vec<Option<Board>>,
    },
    GramKracker {
        state: GramKrackerState,
        guest: Option<Board>,
    },
}

pub enum Connector {
    Single(SingleConnector),
    Multi(MultiConnector),
    GramKracker(GramKrackerConnector),
}

impl Connector {
    pub fn new(config: &PortConfig, nvram: &NvramStore) -> Result<Self> {
        Ok(match config.connector {
            ConnectorKind::Single => Connector::Single(SingleConnector::new()),
            ConnectorKind::Multi => Connector::Multi(MultiConnector::new(config.multi_slot)),
            ConnectorKind::Gkracker => Connector::GramKracker(GramKrackerConnector::new(
                config.gkracker,
                config.gkracker_rom.as_deref(),
                nvram,
            )?),
        })
    }

    pub fn kind(&self) -> ConnectorKind {
        match self {
            Connector::Single(_) => ConnectorKind::Single,
            Connector::Multi(_) => ConnectorKind::Multi,
            Connector::GramKracker(_) => ConnectorKind::Gkracker,
        }
    }

    pub fn cartridges(&self) -> &[Cartridge] {
        match self {
            Connector::Single(connector) => std::slice::from_ref(connector.cartridge()),
            Connector::Multi(connector) => connector.cartridges(),
            Connector::GramKracker(connector) => std::slice::from_ref(connector.guest()),
        }
    }

    pub fn cartridges_mut(&mut self) -> &mut [Cartridge] {
        match self {
            Connector::Single(connector) => std::slice::from_mut(connector.cartridge_mut()),
            Connector::Multi(connector) => connector.cartridges_mut(),
            Connector::GramKracker(connector) => std::slice::from_mut(connector.guest_mut()),
        }
    }

    pub fn cartridge_mut(&mut self, slot: usize) -> Option<&mut Cartridge> {
        self.cartridges_mut().get_mut(slot)
    }

    pub fn slot_count(&self) -> usize {
        self.cartridges().len()
    }

    /// Device reset: re-applies the configured switch positions.
    pub fn reset(&mut self, config: &PortConfig) {
        match self {
            Connector::Single(_) => {}
            Connector::Multi(connector) => connector.reset(config.multi_slot),
            Connector::GramKracker(connector) => connector.reset(config.gkracker),
        }
    }

    /// Writes memory of the connector itself that has to survive power off.
    pub fn save_nvram(&self, nvram: &NvramStore) -> Result<()> {
        match self {
            Connector::GramKracker(connector) => connector.save_nvram(nvram),
            _ => Ok(()),
        }
    }

    pub fn save_state(&self) -> ConnectorState {
        match self {
            Connector::Single(connector) => ConnectorState::Single {
                board: connector.cartridge().board().cloned(),
            },
            Connector::Multi(connector) => ConnectorState::Multi {
                state: connector.state(),
                boards: saved_boards(connector.cartridges()),
            },
            Connector::GramKracker(connector) => ConnectorState::GramKracker {
                state: connector.state(),
                guest: connector.guest().board().cloned(),
            },
        }
    }

    /// Restores a saved state. Nothing is changed if the state does not fit the connector or
    /// the inserted cartridges.
    pub fn load_state(&mut self, state: ConnectorState) -> Result<()> {
        match (self, state) {
            (Connector::Single(connector), ConnectorState::Single { board }) => {
                restore_boards(std::slice::from_mut(connector.cartridge_mut()), vec![board])
            }
            (Connector::Multi(connector), ConnectorState::Multi { state, boards }) => {
                restore_boards(connector.cartridges_mut(), boards)?;
                connector.restore(state);
                Ok(())
            }
            (Connector::GramKracker(connector), ConnectorState::GramKracker { state, guest }) => {
                ensure!(
                    state.ram_len() == GK_RAM_SIZE,
                    "Saved GRAM Kracker RAM has the wrong size"
                );
                restore_boards(std::slice::from_mut(connector.guest_mut()), vec![guest])?;
                connector.restore(state);
                Ok(())
            }
            (connector, _) => {
                anyhow::bail!("Saved state does not match the {} connector", connector.kind())
            }
        }
    }
}

fn saved_boards(cartridges: &[Cartridge]) -> Vec<Option<Board>> {
    cartridges
        .iter()
        .map(|cartridge| cartridge.board().cloned())
        .collect()
}

fn restore_boards(cartridges: &mut [Cartridge], boards: Vec<Option<Board>>) -> Result<()> {
    ensure!(
        cartridges.len() == boards.len(),
        "Saved state has {} slots, connector has {}",
        boards.len(),
        cartridges.len()
    );
    for (cartridge, saved) in cartridges.iter().zip(&boards) {
        ensure!(
            cartridge.board().map(Board::pcb_type) == saved.as_ref().map(Board::pcb_type),
            "Saved state does not match the cartridge in {}",
            cartridge.tag()
        );
    }
    for (cartridge, saved) in cartridges.iter_mut().zip(boards) {
        if let Some(saved) = saved {
            cartridge.restore_board(saved)?;
        }
    }
    Ok(())
}

impl CartridgeBus for Connector {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        match self {
            Connector::Single(connector) => connector.readz(offset),
            Connector::Multi(connector) => connector.readz(offset),
            Connector::GramKracker(connector) => connector.readz(offset),
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        match self {
            Connector::Single(connector) => connector.write(offset, value),
            Connector::Multi(connector) => connector.write(offset, value),
            Connector::GramKracker(connector) => connector.write(offset, value),
        }
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        match self {
            Connector::Single(connector) => connector.crureadz(offset),
            Connector::Multi(connector) => connector.crureadz(offset),
            Connector::GramKracker(connector) => connector.crureadz(offset),
        }
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        match self {
            Connector::Single(connector) => connector.cruwrite(offset, bit),
            Connector::Multi(connector) => connector.cruwrite(offset, bit),
            Connector::GramKracker(connector) => connector.cruwrite(offset, bit),
        }
    }

    fn romgq_line(&mut self, asserted: bool) {
        match self {
            Connector::Single(connector) => connector.romgq_line(asserted),
            Connector::Multi(connector) => connector.romgq_line(asserted),
            Connector::GramKracker(connector) => connector.romgq_line(asserted),
        }
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        match self {
            Connector::Single(connector) => connector.set_gromlines(lines, asserted),
            Connector::Multi(connector) => connector.set_gromlines(lines, asserted),
            Connector::GramKracker(connector) => connector.set_gromlines(lines, asserted),
        }
    }

    fn gclock_in(&mut self, asserted: bool) {
        match self {
            Connector::Single(connector) => connector.gclock_in(asserted),
            Connector::Multi(connector) => connector.gclock_in(asserted),
            Connector::GramKracker(connector) => connector.gclock_in(asserted),
        }
    }

    fn is_grom_idle(&self) -> bool {
        match self {
            Connector::Single(connector) => connector.is_grom_idle(),
            Connector::Multi(connector) => connector.is_grom_idle(),
            Connector::GramKracker(connector) => connector.is_grom_idle(),
        }
    }
}
