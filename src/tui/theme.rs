use ratatui::style::Color;

use crate::model::config::UiConfig;

/// Parsed color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub text: Color,
    pub text_bright: Color,
    pub highlight: Color,
    pub dim: Color,
    pub red: Color,
    pub yellow: Color,
    pub green: Color,
    pub selection_bg: Color,
    pub border: Color,
    pub border_focused: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: Color::Rgb(0x10, 0x10, 0x18),
            text: Color::Rgb(0xC8, 0xC8, 0xD8),
            text_bright: Color::Rgb(0xFF, 0xFF, 0xFF),
            highlight: Color::Rgb(0x4E, 0xC9, 0xB0),
            dim: Color::Rgb(0x6A, 0x6A, 0x80),
            red: Color::Rgb(0xE0, 0x5A, 0x5A),
            yellow: Color::Rgb(0xE8, 0xC0, 0x5A),
            green: Color::Rgb(0x5A, 0xD0, 0x7A),
            selection_bg: Color::Rgb(0x28, 0x38, 0x48),
            border: Color::Rgb(0x3A, 0x3A, 0x50),
            border_focused: Color::Rgb(0x4E, 0xC9, 0xB0),
        }
    }
}

/// Parse a hex color string like "#FF4444" into an RGB Color
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

impl Theme {
    /// Create a theme from board UI config, falling back to defaults
    pub fn from_config(ui: &UiConfig) -> Self {
        let mut theme = Theme::default();
        for (key, value) in &ui.colors {
            if let Some(color) = parse_hex_color(value) {
                match key.as_str() {
                    "background" => theme.background = color,
                    "text" => theme.text = color,
                    "text_bright" => theme.text_bright = color,
                    "highlight" => theme.highlight = color,
                    "dim" => theme.dim = color,
                    "red" => theme.red = color,
                    "yellow" => theme.yellow = color,
                    "green" => theme.green = color,
                    "selection_bg" => theme.selection_bg = color,
                    "border" => theme.border = color,
                    "border_focused" => theme.border_focused = color,
                    _ => {}
                }
            }
        }
        theme
    }
}
