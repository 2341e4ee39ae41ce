//! Word package generation and extraction tests.

mod extraction;
mod generation;
