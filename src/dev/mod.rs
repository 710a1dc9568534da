//! Chip descriptions for the supported port-expanders.
//!
//! Each type implements [`PortDriver`][crate::PortDriver] and is handed to an
//! [`ExpanderBank`][crate::ExpanderBank]; the types are also re-exported at the crate root.

pub mod mcp23017;
pub mod pca9555;
pub mod pcf8575;
