//! Theme preferences and the derived palette

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::config::{DEFAULT_BEAR_COLOR, DEFAULT_BULL_COLOR};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    #[strum(to_string = "dark")]
    Dark,
    #[strum(to_string = "light")]
    Light,
    #[strum(to_string = "auto")]
    Auto,
}

impl ThemeMode {
    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Auto,
            Self::Auto => Self::Dark,
        }
    }
}

/// Color scheme reported by the host environment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    #[default]
    Dark,
    Light,
}

/// Persisted theme inputs. Everything else is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub mode: ThemeMode,
    pub bull_color: String,
    pub bear_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bull_color: DEFAULT_BULL_COLOR.to_string(),
            bear_color: DEFAULT_BEAR_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemePatch {
    pub mode: Option<ThemeMode>,
    pub bull_color: Option<String>,
    pub bear_color: Option<String>,
}

impl Theme {
    /// Merges the patch, returning whether anything changed.
    pub fn merge(&mut self, patch: ThemePatch) -> bool {
        let before = self.clone();
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(bull) = patch.bull_color {
            self.bull_color = bull.trim().to_lowercase();
        }
        if let Some(bear) = patch.bear_color {
            self.bear_color = bear.trim().to_lowercase();
        }
        *self != before
    }
}

pub type Rgb = (u8, u8, u8);

/// Palette derived from a theme and the host's color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTheme {
    pub appearance: ColorScheme,
    pub bull: Rgb,
    pub bear: Rgb,
    pub background: Rgb,
    pub surface: Rgb,
    pub grid: Rgb,
    pub text: Rgb,
    pub muted_text: Rgb,
}

impl ResolvedTheme {
    pub fn derive(theme: &Theme, system: ColorScheme) -> Self {
        let appearance = match theme.mode {
            ThemeMode::Dark => ColorScheme::Dark,
            ThemeMode::Light => ColorScheme::Light,
            ThemeMode::Auto => system,
        };
        let bull = parse_hex(&theme.bull_color).unwrap_or(DEFAULT_BULL_RGB);
        let bear = parse_hex(&theme.bear_color).unwrap_or(DEFAULT_BEAR_RGB);
        match appearance {
            ColorScheme::Dark => Self {
                appearance,
                bull,
                bear,
                background: (13, 13, 13),
                surface: (20, 20, 20),
                grid: (26, 26, 26),
                text: (139, 143, 168),
                muted_text: (85, 85, 85),
            },
            ColorScheme::Light => Self {
                appearance,
                bull,
                bear,
                background: (250, 250, 250),
                surface: (255, 255, 255),
                grid: (229, 231, 235),
                text: (55, 65, 81),
                muted_text: (156, 163, 175),
            },
        }
    }

    /// `r, g, b` string for alpha blending in style sheets.
    pub fn rgb_triple(rgb: Rgb) -> String {
        format!("{}, {}, {}", rgb.0, rgb.1, rgb.2)
    }
}

const DEFAULT_BULL_RGB: Rgb = (0, 212, 170);
const DEFAULT_BEAR_RGB: Rgb = (255, 77, 109);

/// Parses `#rrggbb` or `#rgb`.
pub fn parse_hex(color: &str) -> Option<Rgb> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Some((expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

/// Owns the persisted theme inputs plus the host preference and keeps the
/// derived palette in sync with both.
#[derive(Debug, Clone)]
pub struct ThemeController {
    theme: Theme,
    system: ColorScheme,
    resolved: ResolvedTheme,
}

impl ThemeController {
    pub fn new(theme: Theme, system: ColorScheme) -> Self {
        let resolved = ResolvedTheme::derive(&theme, system);
        Self { theme, system, resolved }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn resolved(&self) -> &ResolvedTheme {
        &self.resolved
    }

    /// Returns true when the derived palette changed.
    pub fn set_theme(&mut self, patch: ThemePatch) -> bool {
        if !self.theme.merge(patch) {
            return false;
        }
        self.refresh()
    }

    /// Replaces the persisted inputs wholesale, e.g. after the store changed.
    pub fn sync_from(&mut self, theme: &Theme) -> bool {
        if &self.theme == theme {
            return false;
        }
        self.theme = theme.clone();
        self.refresh()
    }

    /// Host preference change. Only affects the palette in auto mode; repeated
    /// notifications with the same scheme are no-ops.
    pub fn on_system_scheme_changed(&mut self, scheme: ColorScheme) -> bool {
        if self.system == scheme {
            return false;
        }
        self.system = scheme;
        self.refresh()
    }

    fn refresh(&mut self) -> bool {
        let next = ResolvedTheme::derive(&self.theme, self.system);
        let changed = next != self.resolved;
        self.resolved = next;
        changed
    }
}

/// Best-effort host color scheme from the environment (`COLORFGBG` as set by
/// many terminals: light backgrounds end in 7 or 15).
pub fn detect_system_scheme() -> ColorScheme {
    match std::env::var("COLORFGBG") {
        Ok(value) => match value.rsplit(';').next() {
            Some("7") | Some("15") => ColorScheme::Light,
            _ => ColorScheme::Dark,
        },
        Err(_) => ColorScheme::Dark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_hex("#00d4aa"), Some((0, 212, 170)));
        assert_eq!(parse_hex("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex("00d4aa"), None);
        assert_eq!(parse_hex("#12345"), None);
    }

    #[test]
    fn auto_mode_follows_system_scheme() {
        let theme = Theme { mode: ThemeMode::Auto, ..Theme::default() };
        let mut controller = ThemeController::new(theme, ColorScheme::Dark);
        assert_eq!(controller.resolved().appearance, ColorScheme::Dark);

        assert!(controller.on_system_scheme_changed(ColorScheme::Light));
        assert_eq!(controller.resolved().appearance, ColorScheme::Light);
        assert!(!controller.on_system_scheme_changed(ColorScheme::Light));
    }

    #[test]
    fn explicit_mode_ignores_system_scheme() {
        let mut controller = ThemeController::new(Theme::default(), ColorScheme::Dark);
        assert!(!controller.on_system_scheme_changed(ColorScheme::Light));
        assert_eq!(controller.resolved().appearance, ColorScheme::Dark);
    }

    #[test]
    fn invalid_colors_fall_back_to_defaults() {
        let mut controller = ThemeController::new(Theme::default(), ColorScheme::Dark);
        controller.set_theme(ThemePatch {
            bull_color: Some("not-a-color".into()),
            bear_color: Some("#0000FF".into()),
            ..ThemePatch::default()
        });
        assert_eq!(controller.resolved().bull, (0, 212, 170));
        assert_eq!(controller.resolved().bear, (0, 0, 255));
        assert_eq!(controller.theme().bear_color, "#0000ff");
        assert_eq!(ResolvedTheme::rgb_triple(controller.resolved().bear), "0, 0, 255");
    }
}
