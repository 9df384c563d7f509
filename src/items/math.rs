//! Math item representing a rendered expression.

use std::path::PathBuf;

use crate::math::RenderResult;

/// Subtitle shown under a successfully rendered expression.
pub const COPY_HINT: &str = "Press enter to copy generated image to clipboard.";

/// A math item representing the result of rendering an expression.
#[derive(Clone, Debug)]
pub struct MathItem {
    /// The expression exactly as the user typed it.
    pub expression: String,
    /// Copy hint on success, error message otherwise.
    pub description: String,
    /// Icon shown next to the item.
    pub icon: PathBuf,
    /// The rendered PNG. None if rendering failed.
    pub png: Option<Vec<u8>>,
}

impl MathItem {
    /// Create a new math item from a render result.
    pub fn from_render_result(
        expression: impl Into<String>,
        result: RenderResult,
        icon: impl Into<PathBuf>,
    ) -> Self {
        let (description, png) = match result {
            Ok(png) => (COPY_HINT.to_string(), Some(png)),
            Err(err) => (format!("Error: {err}"), None),
        };

        Self {
            expression: expression.into(),
            description,
            icon: icon.into(),
            png,
        }
    }
}
