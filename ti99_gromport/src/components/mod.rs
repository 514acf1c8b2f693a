//! Devices behind the GROM port
//!
//! Components are layered, each one only knows the layers below it:
//! - `grom`: the GROM chip
//! - `rpk`: the RPK package reader
//! - `cartridge`: cartridge device and PCB variants, built from RPK packages or software lists
//! - `connector`: what is plugged into the port, holding one or more cartridges
//!
//! To keep the API small, the following rules are applied:
//! - Components can import code from common/ and from the layers below
//! - Keep exported types and functionality to a minimum
//! - Use self/super to refer to inner modules

pub mod cartridge;
pub mod connector;
pub mod grom;
pub mod rpk;
