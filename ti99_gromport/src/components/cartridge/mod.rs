//! Cartridge device of a GROM port slot.
//!
//! A cartridge is loaded either from an RPK package or from a software list entry. Both
//! strategies provide the same socket contents, from which the matching `Board` is assembled.
pub mod pcb;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use self::pcb::Board;
use self::pcb::BoardContents;
use crate::common::bus::CartridgeBus;
use crate::common::bus::GromLines;
use crate::common::nvram::NvramStore;
use crate::common::pcb_type::PcbType;
use crate::components::rpk::Rpk;

const GROM_SOCKET: &str = "grom_socket";
const ROM_SOCKET: &str = "rom_socket";
const ROM2_SOCKET: &str = "rom2_socket";
const RAM_SOCKET: &str = "ram_socket";

/// A software list entry, as provided by the software list of the host.
///
/// Regions: `grom` and `rom` hold the dumps. A non-zero `nvram_length` declares battery backed
/// RAM, which is stored per software name. A non-zero `ram_length` declares volatile RAM and
/// takes precedence over the battery backed RAM.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoftwareCartridge {
    pub name: String,
    /// Value of the `pcb` feature, e.g. "paged16k"
    pub pcb: String,
    pub grom: Vec<u8>,
    pub rom: Vec<u8>,
    pub nvram_length: usize,
    pub ram_length: usize,
}

impl SoftwareCartridge {
    fn battery_file(&self) -> String {
        format!("{}.nv", self.name)
    }
}

/// Where to get the socket contents from.
pub enum CartridgeImage {
    Rpk(Rpk),
    Software(SoftwareCartridge),
}

/// How the inserted board was loaded, and where its memory has to go on removal.
enum CartridgeSource {
    Rpk(Rpk),
    Software(SoftwareCartridge),
}

struct LoadedCartridge {
    board: Board,
    source: CartridgeSource,
}

pub struct Cartridge {
    tag: String,
    loaded: Option<LoadedCartridge>,
}

impl Cartridge {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            loaded: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn board(&self) -> Option<&Board> {
        self.loaded.as_ref().map(|loaded| &loaded.board)
    }

    pub fn board_mut(&mut self) -> Option<&mut Board> {
        self.loaded.as_mut().map(|loaded| &mut loaded.board)
    }

    /// Inserts a new board built from `image`. A previously inserted board is removed first.
    ///
    /// On error the slot is left empty.
    pub fn load(&mut self, image: CartridgeImage, nvram: &NvramStore) -> Result<()> {
        if self.loaded.is_some() {
            self.unload(nvram)?;
        }
        let loaded = match image {
            CartridgeImage::Rpk(rpk) => {
                let board = self.prepare_rpk(&rpk);
                LoadedCartridge {
                    board,
                    source: CartridgeSource::Rpk(rpk),
                }
            }
            CartridgeImage::Software(software) => {
                let board = self
                    .prepare_software(&software, nvram)
                    .with_context(|| format!("{}: Cannot load {}", self.tag, software.name))?;
                LoadedCartridge {
                    board,
                    source: CartridgeSource::Software(software),
                }
            }
        };
        log::info!(
            target: "change",
            "{}: Inserted {} cartridge",
            self.tag,
            loaded.board.pcb_type()
        );
        self.loaded = Some(loaded);
        Ok(())
    }

    fn prepare_rpk(&self, rpk: &Rpk) -> Board {
        let contents = BoardContents {
            grom: rpk.get_contents(GROM_SOCKET).unwrap_or_default().to_vec(),
            rom: rpk.get_contents(ROM_SOCKET).unwrap_or_default().to_vec(),
            rom2: rpk.get_contents(ROM2_SOCKET).map(<[u8]>::to_vec),
            ram: rpk.get_contents(RAM_SOCKET).unwrap_or_default().to_vec(),
        };
        Board::new(&self.tag, rpk.pcb_type(), contents)
    }

    fn prepare_software(&self, software: &SoftwareCartridge, nvram: &NvramStore) -> Result<Board> {
        let Some(pcb_type) = PcbType::from_softlist_name(&software.pcb) else {
            bail!("Unknown pcb type '{}' in software list entry", software.pcb)
        };
        let ram = if software.ram_length > 0 {
            vec![0; software.ram_length]
        } else if software.nvram_length > 0 {
            nvram.load_or_fill(&software.battery_file(), software.nvram_length, 0xFF)?
        } else {
            Vec::new()
        };
        let contents = BoardContents {
            grom: software.grom.clone(),
            rom: software.rom.clone(),
            rom2: None,
            ram,
        };
        Ok(Board::new(&self.tag, pcb_type, contents))
    }

    /// Removes the board and writes back persistent memory. Does nothing if the slot is empty.
    pub fn unload(&mut self, nvram: &NvramStore) -> Result<()> {
        let Some(loaded) = self.loaded.take() else {
            return Ok(());
        };
        log::info!(target: "change", "{}: Removed cartridge", self.tag);
        match loaded.source {
            CartridgeSource::Rpk(mut rpk) => {
                if !loaded.board.ram().is_empty() {
                    rpk.set_contents(RAM_SOCKET, loaded.board.ram());
                }
                rpk.close()
                    .with_context(|| format!("{}: Cannot save cartridge RAM", self.tag))
            }
            CartridgeSource::Software(software) if software.nvram_length > 0 => {
                let ram = loaded.board.ram();
                let length = software.nvram_length.min(ram.len());
                nvram
                    .save(&software.battery_file(), &ram[..length])
                    .with_context(|| format!("{}: Cannot save {}", self.tag, software.name))
            }
            CartridgeSource::Software(_) => Ok(()),
        }
    }

    /// Replaces the state of the inserted board with `saved`.
    pub fn restore_board(&mut self, saved: Board) -> Result<()> {
        let Some(board) = self.board_mut() else {
            bail!("No cartridge inserted in {}", self.tag)
        };
        if board.pcb_type() != saved.pcb_type() {
            bail!(
                "Saved {} board does not match inserted {} board",
                saved.pcb_type(),
                board.pcb_type()
            )
        }
        board.restore(saved);
        Ok(())
    }
}

impl CartridgeBus for Cartridge {
    fn readz(&mut self, offset: u16) -> Option<u8> {
        self.board_mut()?.readz(offset)
    }

    fn write(&mut self, offset: u16, value: u8) {
        if let Some(board) = self.board_mut() {
            board.write(offset, value);
        }
    }

    fn crureadz(&mut self, offset: u16) -> Option<u8> {
        self.board_mut()?.crureadz(offset)
    }

    fn cruwrite(&mut self, offset: u16, bit: bool) {
        if let Some(board) = self.board_mut() {
            board.cruwrite(offset, bit);
        }
    }

    fn romgq_line(&mut self, asserted: bool) {
        if let Some(board) = self.board_mut() {
            board.romgq_line(asserted);
        }
    }

    fn set_gromlines(&mut self, lines: GromLines, asserted: bool) {
        if let Some(board) = self.board_mut() {
            board.set_gromlines(lines, asserted);
        }
    }

    fn gclock_in(&mut self, asserted: bool) {
        if let Some(board) = self.board_mut() {
            board.gclock_in(asserted);
        }
    }

    fn is_grom_idle(&self) -> bool {
        self.board().is_some_and(Board::is_grom_idle)
    }
}
