// File I/O: locating, reading and writing rate card tables

pub mod csv;
pub mod error;

pub use crate::csv::{find_header_row, read_table, write_table, HeaderMarkers};
pub use error::IoError;
