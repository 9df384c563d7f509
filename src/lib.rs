//! Launcher extension that typesets TeX math and copies the result to the
//! clipboard as an image.

pub mod config;
pub mod extension;
pub mod items;
pub mod math;
