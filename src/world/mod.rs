//! World coordinates for placed generators

pub mod position;

pub use position::{BlockLocation, CellKey, CELL_SIZE};
