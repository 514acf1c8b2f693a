//! Traits and types used by all components of the GROM port.

pub mod bus;
pub mod logging;
pub mod nvram;
pub mod pcb_type;
pub mod util;
