//! Names of the cartridge board types.
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Circuit board types of GROM port cartridges. The type decides how the board maps its ROM,
/// RAM and GROM contents into the address spaces of the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum PcbType {
    #[strum(serialize = "standard")]
    Standard,
    #[strum(serialize = "paged12k")]
    Paged12k,
    #[strum(to_string = "paged16k", serialize = "paged")]
    Paged16k,
    #[strum(serialize = "minimem")]
    MiniMem,
    #[strum(serialize = "super")]
    SuperSpace,
    #[strum(serialize = "mbx")]
    Mbx,
    #[strum(serialize = "paged379i")]
    Paged379i,
    #[strum(serialize = "paged378")]
    Paged378,
    #[strum(serialize = "paged377")]
    Paged377,
    #[strum(serialize = "pagedcru")]
    PagedCru,
    #[strum(serialize = "gromemu")]
    GromEmu,
}

impl PcbType {
    /// Looks up the `type` attribute of a `<pcb>` element in an RPK manifest.
    pub fn from_rpk_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Looks up the `pcb` feature of a software list entry, which knows fewer board types.
    pub fn from_softlist_name(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::Standard),
            "paged12k" => Some(Self::Paged12k),
            "paged16k" => Some(Self::Paged16k),
            "minimem" => Some(Self::MiniMem),
            "super" => Some(Self::SuperSpace),
            "mbx" => Some(Self::Mbx),
            "gromemu" => Some(Self::GromEmu),
            _ => None,
        }
    }
}
