use std::fmt::Display;

use serde::Serialize;

use super::console::{EventAction, EventSource, MutationAction, MutationCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

/// Log colors, as CSS hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub scheme: ColorScheme,
    add: &'static str,
    remove: &'static str,
    trigger: &'static str,
    native: &'static str,
    legacy: &'static str,
    child: &'static str,
    attr: &'static str,
    content: &'static str,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            scheme: ColorScheme::Light,
            add: "#0a0",
            remove: "#a00",
            trigger: "#00a",
            native: "#a0a",
            legacy: "#008b8b",
            child: "#b78700",
            attr: "#a3008f",
            content: "#008b8b",
        }
    }

    pub fn dark() -> Self {
        Self {
            scheme: ColorScheme::Dark,
            add: "#8a8",
            remove: "#a88",
            trigger: "#88a",
            native: "#e0e",
            legacy: "#00eeee",
            child: "#efb500",
            attr: "#df14c3",
            content: "#00eeee",
        }
    }

    pub fn for_scheme(prefers_dark: bool) -> Self {
        if prefers_dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn event_action(&self, action: EventAction) -> &'static str {
        match action {
            EventAction::Add => self.add,
            EventAction::Remove => self.remove,
            EventAction::Trigger => self.trigger,
        }
    }

    pub fn event_source(&self, source: EventSource) -> &'static str {
        match source {
            EventSource::Native => self.native,
            EventSource::Legacy => self.legacy,
        }
    }

    // Mutation actions reuse the event action colors; Change pairs with Trigger.
    pub fn mutation_action(&self, action: MutationAction) -> &'static str {
        match action {
            MutationAction::Add => self.add,
            MutationAction::Remove => self.remove,
            MutationAction::Change => self.trigger,
        }
    }

    pub fn mutation_category(&self, category: MutationCategory) -> &'static str {
        match category {
            MutationCategory::Child => self.child,
            MutationCategory::Attr => self.attr,
            MutationCategory::Content => self.content,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

/// `#rgb` or `#rrggbb` to components.
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Terminal styling; a no-op when ANSI output is off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Paint {
    ansi: bool,
}

impl Paint {
    pub(crate) fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    pub(crate) fn color(&self, hex: &str, text: impl Display) -> String {
        match parse_hex(hex) {
            Some((r, g, b)) if self.ansi => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            _ => text.to_string(),
        }
    }

    pub(crate) fn bold(&self, text: &str) -> String {
        if self.ansi {
            format!("\x1b[1m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}
