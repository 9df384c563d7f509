mod math;

pub use math::{COPY_HINT, MathItem};

use std::path::PathBuf;

/// A result entry handed to the launcher.
/// This is the host-facing shape of an item, independent of the wire format.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultItem {
    /// Icon path, relative to the extension directory.
    pub icon: PathBuf,
    /// Title line.
    pub name: String,
    /// Subtitle line.
    pub description: String,
    /// Data handed back by the launcher when the item is selected.
    /// None makes selecting the item a no-op.
    pub on_enter: Option<Vec<u8>>,
    /// Whether the launcher window stays open after selection.
    pub keep_app_open: bool,
}

impl From<MathItem> for ResultItem {
    fn from(item: MathItem) -> Self {
        Self {
            icon: item.icon,
            name: item.expression,
            description: item.description,
            on_enter: item.png,
            keep_app_open: false,
        }
    }
}
