//! Markup → docx → markup conversions.

mod overlap;
mod properties;
mod stability;
