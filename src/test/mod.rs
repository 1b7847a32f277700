//! Test support compiled only for unit tests: synthetic images and a recording writer.

pub(crate) mod factories;
pub(crate) mod helpers;
