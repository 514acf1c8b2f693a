use std::fmt::Write as _;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use crc::Crc;
use sha1::Digest;
use sha1::Sha1;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use super::LAYOUT_FILE;
use crate::common::nvram::write_file;
use crate::common::util::hex_string;

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

enum ResourceEntry {
    Rom {
        id: String,
        file: String,
        checksums: bool,
    },
    Ram {
        id: String,
        length: String,
        persistent_file: Option<String>,
    },
}

/// Packages memory dumps into an RPK file.
///
/// ```
/// use ti99_gromport::components::rpk::RpkBuilder;
///
/// let rpk = RpkBuilder::new("standard")
///     .rom("gromimage", "game.bin", &[0xAA; 0x1800])
///     .socket("grom_socket", "gromimage")
///     .to_bytes()
///     .unwrap();
/// assert!(!rpk.is_empty());
/// ```
pub struct RpkBuilder {
    pcb_type: String,
    resources: Vec<ResourceEntry>,
    sockets: Vec<(String, String)>,
    files: Vec<(String, Vec<u8>)>,
    layout: Option<String>,
}

impl RpkBuilder {
    pub fn new(pcb_type: &str) -> Self {
        Self {
            pcb_type: pcb_type.to_string(),
            resources: Vec::new(),
            sockets: Vec::new(),
            files: Vec::new(),
            layout: None,
        }
    }

    /// Adds `contents` as archive file `file` and declares it as ROM resource `id`.
    pub fn rom(self, id: &str, file: &str, contents: &[u8]) -> Self {
        self.add_rom(id, file, contents, false)
    }

    /// Like `rom`, but the manifest also carries the CRC32 and SHA1 of the contents.
    pub fn rom_with_checksums(self, id: &str, file: &str, contents: &[u8]) -> Self {
        self.add_rom(id, file, contents, true)
    }

    fn add_rom(mut self, id: &str, file: &str, contents: &[u8], checksums: bool) -> Self {
        self.resources.push(ResourceEntry::Rom {
            id: id.to_string(),
            file: file.to_string(),
            checksums,
        });
        self.file(file, contents)
    }

    /// Declares a volatile RAM resource, `length` uses the manifest syntax (e.g. "4k").
    pub fn ram(mut self, id: &str, length: &str) -> Self {
        self.resources.push(ResourceEntry::Ram {
            id: id.to_string(),
            length: length.to_string(),
            persistent_file: None,
        });
        self
    }

    pub fn persistent_ram(mut self, id: &str, length: &str, file: &str) -> Self {
        self.resources.push(ResourceEntry::Ram {
            id: id.to_string(),
            length: length.to_string(),
            persistent_file: Some(file.to_string()),
        });
        self
    }

    pub fn socket(mut self, id: &str, uses: &str) -> Self {
        self.sockets.push((id.to_string(), uses.to_string()));
        self
    }

    /// Adds a file to the archive without declaring it in the manifest.
    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files.push((name.to_string(), contents.to_vec()));
        self
    }

    /// Replaces the generated manifest.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Skips the manifest entirely.
    pub fn without_layout(mut self) -> Self {
        self.layout = Some(String::new());
        self
    }

    pub fn layout(&self) -> String {
        if let Some(layout) = &self.layout {
            return layout.clone();
        }
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<romset>\n");
        xml.push_str("  <resources>\n");
        for resource in &self.resources {
            match resource {
                ResourceEntry::Rom {
                    id,
                    file,
                    checksums,
                } => {
                    let _ = write!(xml, "    <rom id=\"{id}\" file=\"{file}\"");
                    if *checksums {
                        let contents = self.file_contents(file);
                        let _ = write!(
                            xml,
                            " crc=\"{:08x}\" sha1=\"{}\"",
                            CRC.checksum(contents),
                            hex_string(&Sha1::digest(contents))
                        );
                    }
                    xml.push_str("/>\n");
                }
                ResourceEntry::Ram {
                    id,
                    length,
                    persistent_file,
                } => {
                    let _ = write!(xml, "    <ram id=\"{id}\" length=\"{length}\"");
                    if let Some(file) = persistent_file {
                        let _ = write!(xml, " type=\"persistent\" file=\"{file}\"");
                    }
                    xml.push_str("/>\n");
                }
            }
        }
        xml.push_str("  </resources>\n  <configuration>\n");
        let _ = writeln!(xml, "    <pcb type=\"{}\">", self.pcb_type);
        for (id, uses) in &self.sockets {
            let _ = writeln!(xml, "      <socket id=\"{id}\" uses=\"{uses}\"/>");
        }
        xml.push_str("    </pcb>\n  </configuration>\n</romset>\n");
        xml
    }

    fn file_contents(&self, name: &str) -> &[u8] {
        self.files
            .iter()
            .find(|(file, _)| file == name)
            .map(|(_, contents)| contents.as_slice())
            .unwrap_or_default()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let layout = self.layout();
        if !layout.is_empty() {
            writer.start_file(LAYOUT_FILE, options)?;
            writer.write_all(layout.as_bytes())?;
        }
        for (name, contents) in &self.files {
            writer
                .start_file(name.as_str(), options)
                .with_context(|| format!("Cannot add {name}"))?;
            writer.write_all(contents)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_bytes()?)
    }
}
