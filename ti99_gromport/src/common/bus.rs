//! Bus interface shared by everything that can sit behind the GROM port.
use bitcode::Decode;
use bitcode::Encode;

/// State of the GROM mode lines that accompany the GROM select line (GS*).
///
/// The console drives M (read/write direction) and MO (address/data) on every GROM access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct GromLines {
    /// M line: true if the access is a read.
    pub read: bool,
    /// MO line: true if the access targets the address register.
    pub address: bool,
}

impl GromLines {
    pub fn read_data() -> Self {
        Self {
            read: true,
            address: false,
        }
    }

    pub fn write_data() -> Self {
        Self {
            read: false,
            address: false,
        }
    }

    pub fn read_address() -> Self {
        Self {
            read: true,
            address: true,
        }
    }

    pub fn write_address() -> Self {
        Self {
            read: false,
            address: true,
        }
    }
}

/// Bus cycles arriving at the cartridge port.
///
/// Read operations return `None` if the device does not drive the data bus (high impedance), so
/// that the caller can let another device or the current bus value stand.
pub trait CartridgeBus {
    fn readz(&mut self, offset: u16) -> Option<u8>;
    fn write(&mut self, offset: u16, value: u8);
    fn crureadz(&mut self, offset: u16) -> Option<u8>;
    fn cruwrite(&mut self, offset: u16, bit: bool);
    /// ROMG* line, asserted when the CPU accesses the cartridge ROM window at 0x6000.
    fn romgq_line(&mut self, asserted: bool);
    fn set_gromlines(&mut self, lines: GromLines, asserted: bool);
    fn gclock_in(&mut self, asserted: bool);
    fn is_grom_idle(&self) -> bool;
}

