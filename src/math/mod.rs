//! Math rendering module.
//!
//! This module provides functionality to:
//! - Typeset TeX math expressions into PNG images
//! - Trim rendered images down to their visible content
//! - Copy trimmed images to the clipboard

mod clipboard;
mod render;
mod trim;

pub use clipboard::{
    Backend, Clipboard, ClipboardError, ClipboardSink, CommandClipboard, NativeClipboard,
};
pub use render::{RenderError, RenderOptions, RenderResult, render};
pub use trim::{BoundingBox, bounding_box, flatten, trim};
