use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use texclip::config::Config;
use texclip::extension::{self, MathExtension};
use texclip::math::{self, Backend, Clipboard, NativeClipboard};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "texclip", version, about = "Render TeX math to the clipboard")]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Answer launcher events on stdin/stdout (default).
    Serve,
    /// Render an expression and write the trimmed PNG to stdout.
    Render {
        expression: String,
    },
    /// Render an expression and copy it to the clipboard.
    Copy {
        expression: String,
        /// Shell command that reads a PNG on stdin, overriding the config.
        #[arg(long)]
        command: Option<String>,
    },
}

fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("texclip=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config),
        Command::Render { expression } => render(&config, &expression),
        Command::Copy {
            expression,
            command,
        } => copy(config, &expression, command),
    }
}

fn serve(config: Config) -> Result<()> {
    tracing::info!(
        copy_command = config.copy_command.as_deref().unwrap_or("<native>"),
        "texclip extension started"
    );

    let mut extension = MathExtension::new(config);
    let stdin = io::stdin();
    extension::serve(&mut extension, stdin.lock(), io::stdout().lock())
        .context("Event loop failed")
}

fn render(config: &Config, expression: &str) -> Result<()> {
    let png = math::render(expression, &config.render)?;
    let image = image::load_from_memory(&png).context("Rendered image is not a valid PNG")?;
    let trimmed = math::trim(&image);

    let mut out = Vec::new();
    trimmed
        .write_to(&mut io::Cursor::new(&mut out), image::ImageFormat::Png)
        .context("Failed to encode trimmed image")?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&out)?;
    stdout.flush()?;
    Ok(())
}

fn copy(config: Config, expression: &str, command: Option<String>) -> Result<()> {
    let png = math::render(expression, &config.render)?;
    let command = command.or(config.copy_command);

    // Nothing keeps this process alive after the copy, so the native
    // clipboard has to hold on until the image is pasted somewhere.
    let backend = match Backend::from_command(command.as_deref()) {
        Backend::Native(_) => Backend::Native(NativeClipboard::wait_until_pasted()),
        backend => backend,
    };
    if backend.command().is_none() {
        tracing::info!("holding the clipboard until the image is pasted");
    }

    let mut clipboard = Clipboard::new(backend);
    clipboard
        .copy_png(&png)
        .context("Failed to copy image to clipboard")?;

    tracing::info!(expression, "copied rendered expression");
    Ok(())
}
