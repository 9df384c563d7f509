//! Launcher event handling.
//!
//! The launcher sends events over stdin; [`serve`] parses them, hands each to
//! the matching [`EventListener`] method and writes the resulting action back.

pub mod protocol;

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{BufRead, Write};

use crate::config::{COPY_COMMAND_PREFERENCE, Config};
use crate::items::{MathItem, ResultItem};
use crate::math::{self, Backend, Clipboard, ClipboardError, ClipboardSink};

pub use protocol::{Action, Event, ProtocolError};

/// Handler with one method per launcher event.
pub trait EventListener {
    type Error: Display;

    /// The query text after the keyword changed.
    fn on_query(&mut self, argument: Option<&str>) -> Action;

    /// A result item was selected.
    fn on_item_enter(&mut self, data: &[u8]) -> Result<Action, Self::Error>;

    /// The launcher sent its full preference set.
    fn on_preferences(&mut self, _preferences: &HashMap<String, String>) -> Action {
        Action::DoNothing
    }

    /// A single preference changed.
    fn on_preferences_update(
        &mut self,
        _id: &str,
        _old_value: Option<&str>,
        _new_value: Option<&str>,
    ) -> Action {
        Action::DoNothing
    }
}

/// Route an event to the listener method for its kind.
///
/// Listener errors become [`Action::Error`] so the launcher can show them.
pub fn dispatch<L: EventListener>(listener: &mut L, event: Event) -> Action {
    match event {
        Event::KeywordQuery { argument } => listener.on_query(argument.as_deref()),
        Event::ItemEnter { data } => listener.on_item_enter(&data).unwrap_or_else(|e| {
            tracing::error!(error = %e, "item action failed");
            Action::error(e)
        }),
        Event::Preferences { preferences } => listener.on_preferences(&preferences),
        Event::PreferencesUpdate {
            id,
            old_value,
            new_value,
        } => listener.on_preferences_update(&id, old_value.as_deref(), new_value.as_deref()),
    }
}

/// Read events line by line until EOF, answering each with one action.
///
/// Malformed lines are answered with an error action and do not stop the loop.
pub fn serve<L, R, W>(listener: &mut L, mut input: R, mut output: W) -> Result<(), ProtocolError>
where
    L: EventListener,
    R: BufRead,
    W: Write,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let action = match protocol::parse_event_bytes(line) {
            Ok(event) => {
                tracing::debug!(kind = event.kind(), "received event");
                dispatch(listener, event)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed event");
                Action::error(e)
            }
        };
        protocol::write_action(&mut output, &action)?;
    }

    tracing::debug!("input closed, shutting down");
    Ok(())
}

/// The math extension: renders queries and copies selections.
pub struct MathExtension<S = Backend> {
    config: Config,
    clipboard: Clipboard<S>,
}

impl MathExtension<Backend> {
    pub fn new(config: Config) -> Self {
        let clipboard = Clipboard::from_command(config.copy_command.as_deref());
        Self { config, clipboard }
    }
}

impl<S: ClipboardSink> MathExtension<S> {
    /// Use a custom clipboard sink instead of the configured backend.
    pub fn with_sink(config: Config, sink: S) -> Self {
        Self {
            config,
            clipboard: Clipboard::new(sink),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clipboard(&self) -> &Clipboard<S> {
        &self.clipboard
    }

    /// Build the result list for a query. Blank queries yield no items.
    pub fn query_items(&self, argument: Option<&str>) -> Vec<ResultItem> {
        let Some(expression) = argument.filter(|a| !a.trim().is_empty()) else {
            return Vec::new();
        };

        let result = math::render(expression, &self.config.render);
        if let Err(e) = &result {
            tracing::debug!(expression, error = %e, "expression failed to render");
        }

        vec![MathItem::from_render_result(expression, result, self.config.icon.clone()).into()]
    }

    fn set_preference(&mut self, id: &str, value: Option<&str>) {
        if !self.config.apply_preference(id, value) {
            tracing::debug!(id, "ignoring unknown preference");
            return;
        }
        if id == COPY_COMMAND_PREFERENCE {
            self.clipboard
                .set_copy_command(self.config.copy_command.as_deref());
        }
    }
}

impl<S: ClipboardSink> EventListener for MathExtension<S> {
    type Error = ClipboardError;

    fn on_query(&mut self, argument: Option<&str>) -> Action {
        Action::RenderResultList {
            items: self.query_items(argument),
        }
    }

    fn on_item_enter(&mut self, data: &[u8]) -> Result<Action, ClipboardError> {
        self.clipboard.copy_png(data)?;
        Ok(Action::DoNothing)
    }

    fn on_preferences(&mut self, preferences: &HashMap<String, String>) -> Action {
        for (id, value) in preferences {
            self.set_preference(id, Some(value));
        }
        Action::DoNothing
    }

    fn on_preferences_update(
        &mut self,
        id: &str,
        _old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Action {
        self.set_preference(id, new_value);
        Action::DoNothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RenderOptions;
    use image::RgbImage;

    #[derive(Default)]
    struct Recorder {
        images: Vec<RgbImage>,
        command: Option<String>,
    }

    impl ClipboardSink for Recorder {
        fn set_image(&mut self, image: &RgbImage) -> Result<(), ClipboardError> {
            self.images.push(image.clone());
            Ok(())
        }

        fn set_copy_command(&mut self, command: Option<&str>) {
            self.command = command.map(str::to_string);
        }
    }

    fn extension() -> MathExtension<Recorder> {
        let config = Config {
            render: RenderOptions {
                canvas_width: 400,
                canvas_height: 100,
                font_size: 30.0,
                ..RenderOptions::default()
            },
            ..Config::default()
        };
        MathExtension::with_sink(config, Recorder::default())
    }

    #[test]
    fn test_blank_queries_yield_nothing() {
        let ext = extension();
        assert!(ext.query_items(None).is_empty());
        assert!(ext.query_items(Some("")).is_empty());
        assert!(ext.query_items(Some("   ")).is_empty());
    }

    #[test]
    fn test_preference_update_reaches_clipboard() {
        let mut ext = extension();
        let action = dispatch(
            &mut ext,
            Event::PreferencesUpdate {
                id: COPY_COMMAND_PREFERENCE.to_string(),
                old_value: None,
                new_value: Some("wl-copy".to_string()),
            },
        );
        assert_eq!(action, Action::DoNothing);
        assert_eq!(ext.config().copy_command.as_deref(), Some("wl-copy"));
        assert_eq!(ext.clipboard().sink().command.as_deref(), Some("wl-copy"));
    }

    #[test]
    fn test_startup_preferences_applied() {
        let mut ext = extension();
        let preferences = HashMap::from([
            (COPY_COMMAND_PREFERENCE.to_string(), "xclip -t image/png".to_string()),
            ("keyword".to_string(), "tex".to_string()),
        ]);
        dispatch(&mut ext, Event::Preferences { preferences });
        assert_eq!(
            ext.clipboard().sink().command.as_deref(),
            Some("xclip -t image/png")
        );
    }

    #[test]
    fn test_bad_payload_becomes_error_action() {
        let mut ext = extension();
        let action = dispatch(&mut ext, Event::ItemEnter { data: vec![0, 1, 2] });
        assert!(matches!(action, Action::Error { .. }));
        assert!(ext.clipboard().sink().images.is_empty());
    }

    #[test]
    fn test_serve_answers_every_line() {
        let mut ext = extension();
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"event\":\"keyword_query\",\"argument\":\"\"}\n");
        input.extend_from_slice(b"\n");
        input.extend_from_slice(b"garbage\n");
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(
            b"{\"event\":\"preferences_update\",\"id\":\"copy_command\",\"new_value\":\"cat\"}\n",
        );
        let mut output = Vec::new();
        serve(&mut ext, input.as_slice(), &mut output).unwrap();

        let lines: Vec<serde_json::Value> = output
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["action"], "render_result_list");
        assert_eq!(lines[0]["items"].as_array().map(Vec::len), Some(0));
        assert_eq!(lines[1]["action"], "error");
        assert_eq!(lines[2]["action"], "error");
        assert_eq!(lines[3]["action"], "do_nothing");
    }

    #[test]
    fn test_serve_handles_missing_trailing_newline() {
        let mut ext = extension();
        let mut output = Vec::new();
        serve(&mut ext, &b"{\"event\":\"keyword_query\"}"[..], &mut output).unwrap();
        assert_eq!(output, b"{\"action\":\"render_result_list\",\"items\":[]}\n");
    }
}
