//! Reader for RPK cartridge packages.
//!
//! An RPK file is a zip archive with the memory dumps of a cartridge and a manifest named
//! `layout.xml` that binds them to the sockets of the cartridge board:
//!
//! ```xml
//! <romset>
//!   <resources>
//!     <rom id="gromimage" file="phm3058g.bin" crc="9ccf3a4f"/>
//!     <rom id="romimage" file="phm3058c.bin"/>
//!     <ram id="sram" length="4k" type="persistent" file="minimem.nv"/>
//!   </resources>
//!   <configuration>
//!     <pcb type="minimem">
//!       <socket id="grom_socket" uses="gromimage"/>
//!       <socket id="rom_socket" uses="romimage"/>
//!       <socket id="ram_socket" uses="sram"/>
//!     </pcb>
//!   </configuration>
//! </romset>
//! ```
//!
//! The whole manifest is validated before any resource is loaded. Persistent RAM is stored in
//! `<nvram_directory>/<system_name>/<file>` and written back by `Rpk::close`.
mod builder;
mod error;
mod socket;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use itertools::Itertools;
use roxmltree::Document;
use roxmltree::Node;
use sha1::Digest;
use sha1::Sha1;
use zip::ZipArchive;

pub use self::builder::RpkBuilder;
pub use self::error::RpkError;
pub use self::error::RpkErrorKind;
pub use self::error::RpkResult;
pub use self::socket::RpkSocket;
use crate::common::nvram::NvramStore;
use crate::common::pcb_type::PcbType;
use crate::common::util::hex_string;
use crate::common::util::parse_hex_u32;

const LAYOUT_FILE: &str = "layout.xml";

/// Upper limit for a single resource. No cartridge board can map more than this.
const MAX_RESOURCE_LENGTH: usize = 16 * 1024 * 1024;

/// Opens RPK packages.
pub struct RpkReader {
    nvram_directory: PathBuf,
}

impl RpkReader {
    pub fn new(nvram_directory: impl Into<PathBuf>) -> Self {
        Self {
            nvram_directory: nvram_directory.into(),
        }
    }

    pub fn open(&self, path: &Path, system_name: &str) -> RpkResult<Rpk> {
        let file = File::open(path).map_err(|err| {
            RpkError::with_detail(
                RpkErrorKind::NotArchiveFormat,
                format!("{}: {}", path.display(), err),
            )
        })?;
        log::debug!(target: "rpk", "Opening {}", path.display());
        self.open_archive(BufReader::new(file), system_name)
    }

    pub fn open_archive<R: Read + Seek>(&self, reader: R, system_name: &str) -> RpkResult<Rpk> {
        let mut archive = ZipArchive::new(reader).map_err(|err| {
            RpkError::with_detail(RpkErrorKind::NotArchiveFormat, err.to_string())
        })?;
        let layout_text = read_layout(&mut archive)?;
        let document = Document::parse(&layout_text)
            .map_err(|err| RpkError::with_detail(RpkErrorKind::XmlFormatError, err.to_string()))?;
        let layout = Layout::parse(&document)?;

        let entries = ArchiveEntry::scan(&mut archive)?;
        let nvram = NvramStore::new(&self.nvram_directory, system_name);
        let mut sockets = HashMap::new();
        for binding in &layout.sockets {
            let socket = match &binding.resource {
                Resource::Rom(rom) => {
                    RpkSocket::new(binding.id, load_rom(&mut archive, &entries, rom)?, None)
                }
                Resource::Ram(ram) => {
                    let mut contents = allocate(ram.length)?;
                    let backing_path = ram.persistent_file.map(|file| nvram.path(file));
                    if let Some(path) = &backing_path {
                        load_persistent_ram(path, &mut contents);
                    }
                    RpkSocket::new(binding.id, contents, backing_path)
                }
            };
            log::debug!(
                target: "rpk",
                "Socket {} uses {} ({} bytes)",
                binding.id,
                binding.resource.id(),
                socket.len()
            );
            sockets.insert(binding.id.to_string(), socket);
        }
        Ok(Rpk {
            pcb_type: layout.pcb_type,
            sockets,
        })
    }
}

/// The loaded resources of an RPK package, keyed by socket id.
#[derive(Debug)]
pub struct Rpk {
    pcb_type: PcbType,
    sockets: HashMap<String, RpkSocket>,
}

impl Rpk {
    pub fn new(pcb_type: PcbType, sockets: impl IntoIterator<Item = RpkSocket>) -> Self {
        Self {
            pcb_type,
            sockets: sockets
                .into_iter()
                .map(|socket| (socket.id().to_string(), socket))
                .collect(),
        }
    }

    pub fn pcb_type(&self) -> PcbType {
        self.pcb_type
    }

    pub fn socket(&self, id: &str) -> Option<&RpkSocket> {
        self.sockets.get(id)
    }

    /// Sockets ordered by id.
    pub fn sockets(&self) -> impl Iterator<Item = &RpkSocket> {
        self.sockets.values().sorted_by(|a, b| a.id().cmp(b.id()))
    }

    pub fn get_contents(&self, id: &str) -> Option<&[u8]> {
        self.sockets.get(id).map(RpkSocket::contents)
    }

    /// Length of the socket contents, 0 for unknown sockets.
    pub fn get_resource_length(&self, id: &str) -> usize {
        self.sockets.get(id).map_or(0, RpkSocket::len)
    }

    /// Replaces the contents of a socket. Returns false if there is no such socket.
    pub fn set_contents(&mut self, id: &str, contents: &[u8]) -> bool {
        match self.sockets.get_mut(id) {
            Some(socket) => {
                socket.set_contents(contents);
                true
            }
            None => false,
        }
    }

    /// Writes all persistent sockets to their backing files and releases the package.
    pub fn close(self) -> Result<()> {
        let mut result = Ok(());
        for socket in self.sockets() {
            if let Err(err) = socket.flush() {
                log::error!(target: "rpk", "{err:#}");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

/// Manifest contents after validation.
struct Layout<'a> {
    pcb_type: PcbType,
    sockets: Vec<SocketBinding<'a>>,
}

struct SocketBinding<'a> {
    id: &'a str,
    resource: Resource<'a>,
}

enum Resource<'a> {
    Rom(RomResource<'a>),
    Ram(RamResource<'a>),
}

impl Resource<'_> {
    fn id(&self) -> &str {
        match self {
            Resource::Rom(rom) => rom.id,
            Resource::Ram(ram) => ram.id,
        }
    }
}

struct RomResource<'a> {
    id: &'a str,
    file: &'a str,
    /// 0 if the manifest has no (valid) checksum.
    crc: u32,
    sha1: Option<&'a str>,
}

struct RamResource<'a> {
    id: &'a str,
    length: usize,
    persistent_file: Option<&'a str>,
}

fn invalid_layout(detail: impl Into<String>) -> RpkError {
    RpkError::with_detail(RpkErrorKind::InvalidLayout, detail)
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

impl<'a> Layout<'a> {
    fn parse(document: &'a Document<'a>) -> RpkResult<Self> {
        let romset = document.root_element();
        if romset.tag_name().name() != "romset" {
            return Err(invalid_layout("document element must be <romset>"));
        }
        let resources = child_element(romset, "resources")
            .ok_or_else(|| invalid_layout("<romset> must contain a <resources> element"))?;
        let configuration = child_element(romset, "configuration")
            .ok_or_else(|| invalid_layout("<romset> must contain a <configuration> element"))?;
        let pcb = child_element(configuration, "pcb")
            .ok_or_else(|| invalid_layout("<configuration> must contain a <pcb> element"))?;
        let pcb_name = pcb
            .attribute("type")
            .ok_or_else(|| invalid_layout("<pcb> must have a 'type' attribute"))?;
        let pcb_type = PcbType::from_rpk_name(pcb_name)
            .ok_or_else(|| RpkError::with_detail(RpkErrorKind::UnknownPcbType, pcb_name))?;

        let mut resource_nodes: HashMap<&str, Node> = HashMap::new();
        for node in resources.children().filter(Node::is_element) {
            let id = node.attribute("id").ok_or_else(|| {
                invalid_layout(format!(
                    "<{}> must have an 'id' attribute",
                    node.tag_name().name()
                ))
            })?;
            if resource_nodes.insert(id, node).is_some() {
                return Err(invalid_layout(format!("duplicate resource id '{id}'")));
            }
        }

        let mut references: Vec<(&str, &str)> = Vec::new();
        for node in pcb.children().filter(Node::is_element) {
            if node.tag_name().name() != "socket" {
                return Err(invalid_layout("<pcb> element has only <socket> children"));
            }
            let id = node
                .attribute("id")
                .ok_or_else(|| invalid_layout("<socket> must have an 'id' attribute"))?;
            let uses = node
                .attribute("uses")
                .ok_or_else(|| invalid_layout("<socket> must have a 'uses' attribute"))?;
            if references.iter().any(|(other, _)| *other == id) {
                return Err(invalid_layout(format!("duplicate socket id '{id}'")));
            }
            references.push((id, uses));
        }
        if references.is_empty() {
            return Err(RpkError::with_detail(
                RpkErrorKind::NoPcbOrResources,
                "<pcb> has no sockets",
            ));
        }

        // Resolve all references before looking at the resources themselves.
        let resolved = references
            .into_iter()
            .map(|(id, uses)| match resource_nodes.get(uses) {
                Some(node) => Ok((id, *node)),
                None => Err(RpkError::with_detail(
                    RpkErrorKind::InvalidResourceReference,
                    uses,
                )),
            })
            .collect::<RpkResult<Vec<_>>>()?;

        let sockets = resolved
            .into_iter()
            .map(|(id, node)| {
                Ok(SocketBinding {
                    id,
                    resource: Resource::parse(node)?,
                })
            })
            .collect::<RpkResult<Vec<_>>>()?;
        log::debug!(
            target: "rpk",
            "Layout for pcb {}: {}",
            pcb_type,
            sockets.iter().map(|socket| socket.id).join(", ")
        );
        Ok(Self { pcb_type, sockets })
    }
}

impl<'a> Resource<'a> {
    fn parse(node: Node<'a, '_>) -> RpkResult<Self> {
        let id = node.attribute("id").unwrap_or_default();
        match node.tag_name().name() {
            "rom" => {
                let file = node
                    .attribute("file")
                    .ok_or_else(|| invalid_layout("<rom> must have a 'file' attribute"))?;
                Ok(Resource::Rom(RomResource {
                    id,
                    file,
                    crc: node.attribute("crc").map_or(0, parse_hex_u32),
                    sha1: node.attribute("sha1"),
                }))
            }
            "ram" => {
                let length_spec = node
                    .attribute("length")
                    .ok_or_else(|| RpkError::new(RpkErrorKind::MissingRamLength))?;
                let length = parse_ram_length(length_spec).ok_or_else(|| {
                    RpkError::with_detail(
                        RpkErrorKind::InvalidRamSpec,
                        format!("invalid length '{length_spec}'"),
                    )
                })?;
                let persistent_file = match node.attribute("type") {
                    Some("persistent") => Some(node.attribute("file").ok_or_else(|| {
                        RpkError::with_detail(
                            RpkErrorKind::InvalidRamSpec,
                            "<ram type='persistent'> must have a 'file' attribute",
                        )
                    })?),
                    _ => None,
                };
                Ok(Resource::Ram(RamResource {
                    id,
                    length,
                    persistent_file,
                }))
            }
            other => Err(RpkError::with_detail(
                RpkErrorKind::UnknownResourceType,
                other,
            )),
        }
    }
}

/// Parses `<number>[k|m]`, with the suffix multiplying by 1024 or 1024*1024.
fn parse_ram_length(spec: &str) -> Option<usize> {
    let spec = spec.trim();
    let digits = spec
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(spec.len());
    let number: usize = spec[..digits].parse().ok()?;
    let factor = match spec[digits..].chars().next() {
        None => 1,
        Some('k') | Some('K') => 1024,
        Some('m') | Some('M') => 1024 * 1024,
        Some(_) => return None,
    };
    number.checked_mul(factor)
}

/// Returns an empty buffer with room for `length` bytes.
fn reserve(length: usize) -> RpkResult<Vec<u8>> {
    let out_of_memory =
        || RpkError::with_detail(RpkErrorKind::OutOfMemory, format!("{length} bytes"));
    if length > MAX_RESOURCE_LENGTH {
        return Err(out_of_memory());
    }
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(length)
        .map_err(|_| out_of_memory())?;
    Ok(buffer)
}

/// Returns `length` zero bytes.
fn allocate(length: usize) -> RpkResult<Vec<u8>> {
    let mut buffer = reserve(length)?;
    buffer.resize(length, 0);
    Ok(buffer)
}

fn load_persistent_ram(path: &Path, contents: &mut [u8]) {
    match std::fs::read(path) {
        Ok(stored) => {
            let length = stored.len().min(contents.len());
            contents[..length].copy_from_slice(&stored[..length]);
            log::debug!(target: "rpk", "Loaded {} bytes from {}", length, path.display());
        }
        Err(err) => {
            log::debug!(target: "rpk", "No stored contents in {}: {}", path.display(), err);
        }
    }
}

fn read_layout<R: Read + Seek>(archive: &mut ZipArchive<R>) -> RpkResult<String> {
    let mut file = archive.by_name(LAYOUT_FILE).map_err(|err| match err {
        zip::result::ZipError::FileNotFound => RpkError::new(RpkErrorKind::MissingLayout),
        other => RpkError::from_entry_error(other),
    })?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|err| RpkError::with_detail(RpkErrorKind::ZipError, err.to_string()))?;
    String::from_utf8(contents)
        .map_err(|err| RpkError::with_detail(RpkErrorKind::XmlFormatError, err.to_string()))
}

struct ArchiveEntry {
    index: usize,
    name: String,
    crc32: u32,
    size: u64,
}

impl ArchiveEntry {
    fn scan<R: Read + Seek>(archive: &mut ZipArchive<R>) -> RpkResult<Vec<Self>> {
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(RpkError::from_entry_error)?;
            if file.is_dir() {
                continue;
            }
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
                crc32: file.crc32(),
                size: file.size(),
            });
        }
        Ok(entries)
    }

    fn matches_name(&self, file: &str) -> bool {
        let base_name = self.name.rsplit('/').next().unwrap_or_default();
        self.name.eq_ignore_ascii_case(file) || base_name.eq_ignore_ascii_case(file)
    }
}

fn load_rom<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entries: &[ArchiveEntry],
    rom: &RomResource,
) -> RpkResult<Vec<u8>> {
    let entry = if rom.crc != 0 {
        entries
            .iter()
            .filter(|entry| entry.crc32 == rom.crc)
            .max_by_key(|entry| entry.matches_name(rom.file))
    } else {
        entries.iter().find(|entry| entry.matches_name(rom.file))
    }
    .ok_or_else(|| {
        RpkError::with_detail(
            RpkErrorKind::InvalidFileRef,
            "File not found or CRC check failed",
        )
    })?;

    let length = usize::try_from(entry.size).unwrap_or(usize::MAX);
    let mut contents = reserve(length)?;
    let mut file = archive
        .by_index(entry.index)
        .map_err(RpkError::from_entry_error)?;
    file.read_to_end(&mut contents)
        .map_err(|err| RpkError::with_detail(RpkErrorKind::ZipError, err.to_string()))?;
    log::debug!(
        target: "rpk",
        "Loaded {} from {} ({} bytes)",
        rom.id,
        entry.name,
        contents.len()
    );

    if let Some(expected) = rom.sha1 {
        let actual = hex_string(&Sha1::digest(&contents));
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(RpkError::with_detail(
                RpkErrorKind::InvalidFileRef,
                "SHA1 check failed",
            ));
        }
    }
    Ok(contents)
}
