//! Typesetting of TeX math expressions into PNG images.
//!
//! MathJax (through `mathjax_svg`) lays the expression out as SVG using its
//! TeX fonts, `resvg` rasterises that SVG onto a fixed white canvas and the
//! `image` crate encodes the canvas as PNG. Everything stays in memory.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use lazy_static::lazy_static;
use regex::Regex;
use resvg::{tiny_skia, usvg};
use serde::Deserialize;

/// Outcome of rendering an expression: PNG bytes or a displayable reason.
pub type RenderResult = Result<Vec<u8>, RenderError>;

/// Errors produced while typesetting or rasterising an expression.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("empty expression")]
    Empty,
    /// The typesetting engine rejected the markup.
    #[error("{0}")]
    Typeset(String),
    #[error("invalid SVG from typesetter: {0}")]
    Svg(#[from] usvg::Error),
    #[error("canvas size {width}x{height} is not drawable")]
    Canvas { width: u32, height: u32 },
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Canvas and font parameters for rendering.
///
/// The values are tunable; nothing downstream depends on a particular size
/// because the trimmer crops the canvas to the glyphs anyway.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Pixels per em.
    pub font_size: f32,
    /// Draw a rectangle around the expression.
    pub frame: bool,
    /// Gap between the expression and the frame, in pixels.
    pub frame_padding: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            canvas_width: 4000,
            canvas_height: 500,
            font_size: 100.0,
            frame: false,
            frame_padding: 10.0,
        }
    }
}

lazy_static! {
    /// MathJax keeps going on bad input and marks the failure with an
    /// `merror` node carrying the message in this attribute.
    static ref MJX_ERROR: Regex = Regex::new(r#"data-mjx-error="([^"]*)""#).unwrap();

    /// With the `noundefined` package, unknown macros are typeset as red
    /// text instead of failing.
    static ref RED_MTEXT: Regex =
        Regex::new(r#"(?s)<g data-mml-node="mtext"[^>]*\bfill="red"[^>]*>(.*?)</g>"#).unwrap();

    /// Code point of one glyph, in hex.
    static ref GLYPH: Regex = Regex::new(r#"data-c="([0-9A-Fa-f]+)""#).unwrap();
}

/// Render a math expression to PNG bytes.
pub fn render(expression: &str, options: &RenderOptions) -> RenderResult {
    if expression.trim().is_empty() {
        return Err(RenderError::Empty);
    }

    let svg = typeset(expression)?;
    let pixmap = rasterize(&svg, options)?;
    encode_png(pixmap)
}

/// Typeset the expression as inline math and return the SVG document.
///
/// Inline style keeps limits beside big operators, like `$...$` in TeX.
fn typeset(expression: &str) -> Result<String, RenderError> {
    let svg = mathjax_svg::convert_to_svg_inline(expression)
        .map_err(|e| RenderError::Typeset(non_empty(e.to_string())))?;

    if let Some(message) = embedded_error(&svg) {
        return Err(RenderError::Typeset(message));
    }

    Ok(svg)
}

/// Extract the first MathJax error message embedded in the SVG, if any.
fn embedded_error(svg: &str) -> Option<String> {
    if let Some(found) = MJX_ERROR.captures(svg).and_then(|caps| caps.get(1)) {
        return Some(non_empty(unescape_xml(found.as_str())));
    }
    RED_MTEXT
        .captures_iter(svg)
        .filter_map(|caps| caps.get(1))
        .map(|glyphs| glyph_text(glyphs.as_str()))
        .find(|text| text.starts_with('\\'))
        .map(|name| format!("Undefined control sequence {name}"))
}

/// Rebuild the text drawn by a run of glyphs from their `data-c` code points.
fn glyph_text(glyphs: &str) -> String {
    GLYPH
        .captures_iter(glyphs)
        .filter_map(|caps| u32::from_str_radix(&caps[1], 16).ok())
        .filter_map(char::from_u32)
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#92;", "\\")
        .replace("&amp;", "&")
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        "Unknown typesetting error".to_string()
    } else {
        message
    }
}

/// Draw the SVG centred on an opaque white canvas.
fn rasterize(svg: &str, options: &RenderOptions) -> Result<tiny_skia::Pixmap, RenderError> {
    // MathJax sizes its output in ex units, which usvg resolves against the
    // default font size.
    let usvg_options = usvg::Options {
        font_size: options.font_size,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &usvg_options)?;

    let mut pixmap = tiny_skia::Pixmap::new(options.canvas_width, options.canvas_height).ok_or(
        RenderError::Canvas {
            width: options.canvas_width,
            height: options.canvas_height,
        },
    )?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let size = tree.size();
    let (x, y) = centre_offset(
        (size.width(), size.height()),
        (options.canvas_width, options.canvas_height),
    );
    tracing::trace!(
        width = size.width(),
        height = size.height(),
        x,
        y,
        "rasterizing expression"
    );

    resvg::render(
        &tree,
        tiny_skia::Transform::from_translate(x, y),
        &mut pixmap.as_mut(),
    );

    if options.frame {
        draw_frame(
            &mut pixmap,
            x,
            y,
            size.width(),
            size.height(),
            options.frame_padding,
        );
    }

    Ok(pixmap)
}

/// Stroke a black rectangle `padding` pixels outside the content box.
fn draw_frame(
    pixmap: &mut tiny_skia::Pixmap,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    padding: f32,
) {
    let padding = padding.max(0.0).round();
    let Some(rect) = tiny_skia::Rect::from_ltrb(
        x - padding,
        y - padding,
        (x + width).ceil() + padding,
        (y + height).ceil() + padding,
    ) else {
        return;
    };

    let mut paint = tiny_skia::Paint::default();
    paint.set_color(tiny_skia::Color::BLACK);
    paint.anti_alias = false;
    let stroke = tiny_skia::Stroke {
        width: 2.0,
        ..tiny_skia::Stroke::default()
    };

    pixmap.stroke_path(
        &tiny_skia::PathBuilder::from_rect(rect),
        &paint,
        &stroke,
        tiny_skia::Transform::identity(),
        None,
    );
}

/// Offset that centres `content` on `canvas`. Oversized content overflows
/// both edges evenly and gets clipped.
fn centre_offset(content: (f32, f32), canvas: (u32, u32)) -> (f32, f32) {
    let axis = |content: f32, canvas: u32| ((canvas as f32 - content) / 2.0).round();
    (axis(content.0, canvas.0), axis(content.1, canvas.1))
}

fn encode_png(pixmap: tiny_skia::Pixmap) -> RenderResult {
    let (width, height) = (pixmap.width(), pixmap.height());
    // The canvas is opaque, so premultiplied and straight RGBA are identical.
    let image = RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or(RenderError::Canvas { width, height })?;

    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}
