//! The multi-cartridge expander.
//!
//! Four slots share the port. During GROM accesses the console selects the slot with bits 2-9 of
//! the GROM port address (0x9800 + 4 * slot), so that the GROM search of the operating system
//! finds all cartridges. A switch can fix the active slot instead.
//!
//! All GROM cycles are sent to every inserted cartridge to keep their address counters in sync.
//! Only the active slot drives the bus.
use bitcode::Decode;
use bitcode::Encode;
use intbits::Bits;

use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::components::cartridge::Cartridge;

pub const MULTI_SLOTS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct MultiState {
    /// May point beyond the last slot, which then reads as empty.
    pub active_slot: u8,
    /// Slot selected by the switch, `None` for automatic selection.
    pub fixed_slot: Option<u8>,
    pub grom_selected: bool,
}

pub struct MultiConnector {
    slots: Vec<Cartridge>,
    state: MultiState,
}

/// Converts the switch setting (0 = auto, n = slot n) into a slot index.
fn fixed_slot_from_switch(value: u8) -> Option<u8> {
    value.checked_sub(1)
}

impl MultiConnector {
    pub fn new(switch: u8) -> Self {
        let slots = (1..=MULTI_SLOTS)
            .map(|slot| Cartridge::new(&format!("cartridge{}", slot)))
            .collect();
        let mut connector = Self {
            slots,
            state: MultiState::default(),
        };
        connector.reset(switch);
        connector
    }

    pub fn cartridges(&self) -> &[Cartridge] {
        &self.slots
    }

    pub fn cartridges_mut(&mut self) -> &mut [Cartridge] {
        &mut self.slots
    }

    pub fn active_slot(&self) -> usize {
        self.state.active_slot as usize
    }

    pub fn fixed_slot(&self) -> Option<usize> {
        self.state.fixed_slot.map(usize::from)
    }

    pub fn state(&self) -> MultiState {
        self.state
    }

    pub fn restore(&mut self, state: MultiState) {
        self.state = state;
    }

    pub fn reset(&mut self, switch: u8) {
        self.state = MultiState {
            active_slot: 0,
            fixed_slot: fixed_slot_from_switch(switch),
            grom_selected: false,
        };
    }

    /// The slot switch was moved while running.
    pub fn switch_changed(&mut self, value: u8) {
        log::info!(target: "config", "Multi-cartridge slot switch set to {}", value);
        self.state.fixed_slot = fixed_slot_from_switch(value);
        self.state.active_slot = self.state.fixed_slot.unwrap_or(0);
    }

    fn set_slot(&mut self, slot: u8) {
        let slot = self.state.fixed_slot.unwrap_or(slot);
        if slot != self.state.active_slot {
            log::debug!(target: "change", "Setting cartridge slot to {}", slot);
        }
        self.state.active_slot = slot;
    }

    fn select_from_grom_address(&mut self, offset: u16) {
        if self.state.grom_selected {
            self.set_slot(offset.bits(2..10) as u8);
        }
    }

    fn active(&mut self) -> Option<&mut Cartridge> {
        self.slots.get_mut(self.state.active_slot as usize)
    }
}

impl CartridgeBus for MultiConnector {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        self.select_from_grom_address(offset);
        if !self.state.grom_selected {
            return self.active()?.readz(offset);
        }
        let active = self.active_slot();
        let mut value = None;
        for (index, cartridge) in self.slots.iter_mut().enumerate() {
            let slot_value = cartridge.readz(offset);
            if index == active {
                value = slot_value;
            }
        }
        value
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.select_from_grom_address(offset);
        if self.state.grom_selected {
            for cartridge in self.slots.iter_mut() {
                cartridge.write(offset, value);
            }
        } else if let Some(cartridge) = self.active() {
            cartridge.write(offset, value);
        }
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.active()?.crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        if let Some(cartridge) = self.active() {
            cartridge.cruwrite(offset, bit);
        }
    }

    fn romgq_line(&mut self, asserted: bool) {
        for cartridge in self.slots.iter_mut() {
            cartridge.romgq_line(asserted);
        }
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        self.state.grom_selected = asserted;
        for cartridge in self.slots.iter_mut() {
            cartridge.set_gromlines(lines, asserted);
        }
    }

    fn gclock_in(&mut self, asserted: bool) {
        for cartridge in self.slots.iter_mut() {
            cartridge.gclock_in(asserted);
        }
    }

    fn is_grom_idle(&self) -> bool {
        self.slots
            .get(self.active_slot())
            .is_some_and(Cartridge::is_grom_idle)
    }
}
