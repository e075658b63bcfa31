//! Binary package encoding (spec §6): a versioned header, followed by the string
//! table, functions, and classes, all integers VBN-encoded except raw float bits.

pub mod vbn;
pub mod writer;

pub use writer::write_package;
