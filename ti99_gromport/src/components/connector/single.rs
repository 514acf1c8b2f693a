use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::components::cartridge::Cartridge;

/// A single cartridge plugged directly into the GROM port.
pub struct SingleConnector {
    cartridge: Cartridge,
}

impl SingleConnector {
    pub fn new() -> Self {
        Self {
            cartridge: Cartridge::new("cartridge"),
        }
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }
}

impl Default for SingleConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl CartridgeBus for SingleConnector {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        self.cartridge.readz(offset)
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.cartridge.write(offset, value);
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.cartridge.crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        self.cartridge.cruwrite(offset, bit);
    }

    fn romgq_line(&mut self, asserted: bool) {
        self.cartridge.romgq_line(asserted);
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        self.cartridge.set_gromlines(lines, asserted);
    }

    fn gclock_in(&mut self, asserted: bool) {
        self.cartridge.gclock_in(asserted);
    }

    fn is_grom_idle(&self) -> bool {
        self.cartridge.is_grom_idle()
    }
}
