//! Clipboard handoff for rendered images.
//!
//! A rendered PNG is decoded, trimmed, flattened to RGB and handed to one of
//! two sinks: the in-process system clipboard (`arboard`) or an external
//! program (`wl-copy`, `xclip`, ...) that reads PNG data from its stdin.

use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat, RgbImage};

use super::trim::{flatten, trim};

/// Errors raised while putting an image on the clipboard.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Failed to access clipboard: {0}")]
    Access(#[source] arboard::Error),
    #[error("Failed to copy to clipboard: {0}")]
    Write(#[source] arboard::Error),
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send image to `{command}`: {source}")]
    Pipe {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Something that can take an opaque RGB image and publish it.
pub trait ClipboardSink {
    fn set_image(&mut self, image: &RgbImage) -> Result<(), ClipboardError>;

    /// React to a change of the configured copy command.
    fn set_copy_command(&mut self, _command: Option<&str>) {}
}

/// The system clipboard, accessed in-process.
///
/// The handle is kept alive after the first copy: on X11 and Wayland the
/// clipboard contents are served by the owning process and disappear with it.
#[derive(Default)]
pub struct NativeClipboard {
    clipboard: Option<arboard::Clipboard>,
    wait_until_pasted: bool,
}

impl NativeClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose copies block until another application takes the
    /// contents over. Needed by short-lived processes on Linux.
    pub fn wait_until_pasted() -> Self {
        Self {
            clipboard: None,
            wait_until_pasted: true,
        }
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        let clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new().map_err(ClipboardError::Access)?,
        };
        Ok(self.clipboard.insert(clipboard))
    }
}

impl ClipboardSink for NativeClipboard {
    fn set_image(&mut self, image: &RgbImage) -> Result<(), ClipboardError> {
        // arboard wants tightly packed RGBA rows (stride = 4 * width).
        let rgba = DynamicImage::ImageRgb8(image.clone()).into_rgba8();
        let data = arboard::ImageData {
            width: rgba.width() as usize,
            height: rgba.height() as usize,
            bytes: Cow::Owned(rgba.into_raw()),
        };

        let wait = self.wait_until_pasted;
        let clipboard = self.handle()?;

        #[cfg(target_os = "linux")]
        let result = {
            use arboard::SetExtLinux;
            if wait {
                clipboard.set().wait().image(data)
            } else {
                clipboard.set_image(data)
            }
        };
        #[cfg(not(target_os = "linux"))]
        let result = {
            let _ = wait;
            clipboard.set_image(data)
        };

        release_on_error(&mut self.clipboard, result).map_err(ClipboardError::Write)
    }
}

/// Drop the held handle when an operation on it failed, so the next copy
/// reconnects to the clipboard instead of reusing a broken connection.
fn release_on_error<T, E>(handle: &mut Option<T>, result: Result<(), E>) -> Result<(), E> {
    if result.is_err() && handle.take().is_some() {
        tracing::debug!("dropping clipboard handle after failed write");
    }
    result
}

/// An external program that reads a PNG from stdin, run through `sh -c`.
#[derive(Clone, Debug)]
pub struct CommandClipboard {
    command: String,
}

impl CommandClipboard {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn_error(&self, source: std::io::Error) -> ClipboardError {
        ClipboardError::Spawn {
            command: self.command.clone(),
            source,
        }
    }
}

impl ClipboardSink for CommandClipboard {
    fn set_image(&mut self, image: &RgbImage) -> Result<(), ClipboardError> {
        // Encode fully up front so the program never sees a partial image.
        let png = encode_png(image)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let written = match child.stdin.take() {
            // Dropping stdin closes the pipe so the program sees EOF.
            Some(mut stdin) => stdin.write_all(&png),
            None => Err(std::io::Error::other("stdin was not captured")),
        };
        if let Err(e) = written {
            // A program that exits early closes its end of the pipe; its exit
            // status says more than the broken pipe does.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                let _ = child.kill();
            }
            let status = child.wait().map_err(|e| self.spawn_error(e))?;
            if e.kind() == std::io::ErrorKind::BrokenPipe && !status.success() {
                return Err(ClipboardError::CommandFailed {
                    command: self.command.clone(),
                    status,
                });
            }
            return Err(ClipboardError::Pipe {
                command: self.command.clone(),
                source: e,
            });
        }

        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            return Err(ClipboardError::CommandFailed {
                command: self.command.clone(),
                status,
            });
        }

        tracing::debug!(command = %self.command, bytes = png.len(), "image piped to clipboard command");
        Ok(())
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ClipboardError> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(ClipboardError::Encode)?;
    Ok(png_bytes)
}

/// The two supported clipboard backends.
pub enum Backend {
    Native(NativeClipboard),
    Command(CommandClipboard),
}

impl Backend {
    /// Pick a backend from the configured copy command.
    ///
    /// A missing or blank command selects the native clipboard.
    pub fn from_command(command: Option<&str>) -> Self {
        match command.map(str::trim).filter(|c| !c.is_empty()) {
            Some(command) => Self::Command(CommandClipboard::new(command)),
            None => Self::Native(NativeClipboard::new()),
        }
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Native(_) => None,
            Self::Command(cmd) => Some(cmd.command()),
        }
    }
}

impl ClipboardSink for Backend {
    fn set_image(&mut self, image: &RgbImage) -> Result<(), ClipboardError> {
        match self {
            Self::Native(native) => native.set_image(image),
            Self::Command(cmd) => cmd.set_image(image),
        }
    }

    /// Switch backends. An unchanged command keeps the current backend, so a
    /// live native clipboard handle is not dropped needlessly.
    fn set_copy_command(&mut self, command: Option<&str>) {
        let backend = Self::from_command(command);
        if backend.command() == self.command() {
            return;
        }
        match backend.command() {
            Some(command) => tracing::info!(command, "using clipboard command"),
            None => tracing::info!("using native clipboard"),
        }
        *self = backend;
    }
}

/// Copies rendered PNGs to the clipboard through a swappable sink.
pub struct Clipboard<S = Backend> {
    sink: S,
}

impl Clipboard<Backend> {
    pub fn from_command(command: Option<&str>) -> Self {
        Self::new(Backend::from_command(command))
    }

    pub fn copy_command(&self) -> Option<&str> {
        self.sink.command()
    }
}

impl<S: ClipboardSink> Clipboard<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Forward a copy command preference change to the sink.
    pub fn set_copy_command(&mut self, command: Option<&str>) {
        self.sink.set_copy_command(command);
    }

    /// Decode, trim and flatten a rendered PNG, then publish it.
    pub fn copy_png(&mut self, png: &[u8]) -> Result<(), ClipboardError> {
        let image = image::load_from_memory_with_format(png, ImageFormat::Png)
            .map_err(ClipboardError::Decode)?;
        let trimmed = flatten(&trim(&image));

        tracing::debug!(
            width = trimmed.width(),
            height = trimmed.height(),
            "copying generated image to clipboard"
        );
        self.sink.set_image(&trimmed)
    }
}
