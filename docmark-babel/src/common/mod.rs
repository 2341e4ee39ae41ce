//! Format-agnostic algorithms shared by both conversion directions.

pub mod fields;
pub mod grid_table;
pub mod overlap;
