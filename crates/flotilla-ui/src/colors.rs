use ratatui::style::Color;
use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    /// Resolve the initial mode: `FLOTILLA_THEME=light|dark` wins,
    /// otherwise dark.
    #[must_use]
    pub fn detect() -> Self {
        match env::var("FLOTILLA_THEME")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "light" => ThemeMode::Light,
            _ => ThemeMode::Dark,
        }
    }

    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }
}

pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub primary: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub dim: Color,
    pub border: Color,
    pub highlight: Color,
    pub surface: Color,
    monochrome: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self::for_mode(ThemeMode::Dark)
    }
}

impl Theme {
    #[must_use]
    pub fn for_mode(mode: ThemeMode) -> Self {
        let monochrome = env::var_os("NO_COLOR").is_some();
        if monochrome {
            return Self {
                bg: Color::Reset,
                fg: Color::Reset,
                primary: Color::Reset,
                secondary: Color::Reset,
                success: Color::Reset,
                warning: Color::Reset,
                error: Color::Reset,
                info: Color::Reset,
                dim: Color::Reset,
                border: Color::Reset,
                highlight: Color::Reset,
                surface: Color::Reset,
                monochrome,
            };
        }

        match mode {
            ThemeMode::Dark => Self {
                bg: Color::Rgb(16, 18, 24),
                fg: Color::Rgb(220, 223, 228),
                primary: Color::Rgb(97, 175, 239),
                secondary: Color::Rgb(152, 195, 121),
                success: Color::Rgb(152, 195, 121),
                warning: Color::Rgb(229, 192, 123),
                error: Color::Rgb(224, 108, 117),
                info: Color::Rgb(86, 182, 194),
                dim: Color::Rgb(92, 99, 112),
                border: Color::Rgb(62, 68, 81),
                highlight: Color::Rgb(40, 44, 52),
                surface: Color::Rgb(24, 26, 33),
                monochrome,
            },
            ThemeMode::Light => Self {
                bg: Color::Rgb(250, 250, 250),
                fg: Color::Rgb(56, 58, 66),
                primary: Color::Rgb(64, 120, 242),
                secondary: Color::Rgb(80, 161, 79),
                success: Color::Rgb(80, 161, 79),
                warning: Color::Rgb(193, 132, 1),
                error: Color::Rgb(202, 18, 67),
                info: Color::Rgb(1, 132, 188),
                dim: Color::Rgb(160, 161, 167),
                border: Color::Rgb(200, 201, 207),
                highlight: Color::Rgb(229, 229, 230),
                surface: Color::Rgb(240, 240, 241),
                monochrome,
            },
        }
    }

    #[must_use]
    pub fn is_monochrome(&self) -> bool {
        self.monochrome
    }

    /// Color for a backend-reported build state string. The console never
    /// interprets the state beyond picking a color for it.
    #[must_use]
    pub fn build_state_color(&self, state: &str) -> Color {
        let lower = state.to_ascii_lowercase();
        if lower.contains("fail") || lower.contains("error") {
            self.error
        } else if lower.contains("building") || lower.contains("scheduled") {
            self.warning
        } else if lower.contains("success") || lower.contains("ok") {
            self.success
        } else {
            self.fg
        }
    }
}
