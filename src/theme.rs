//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::shapes::FillTag;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Block colours per fill tag plus the UI colours around the board.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Block colours by fill tag (I, O, T, S, Z): cyan, yellow, purple, green, red.
    pub blocks: [Color; 5],
    /// Screen background.
    pub bg: Color,
    /// Empty board cell.
    pub empty: Color,
    /// Board and panel borders.
    pub div_line: Color,
    pub main_fg: Color,
    pub title: Color,
    /// Hints and secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const DEFAULT_BLOCKS: [Color; 5] = [
    rgb(0x22D3EE), // cyan-400
    rgb(0xFACC15), // yellow-400
    rgb(0xA855F7), // purple-500
    rgb(0x22C55E), // green-500
    rgb(0xEF4444), // red-500
];

impl Default for Theme {
    fn default() -> Self {
        Self {
            blocks: DEFAULT_BLOCKS,
            bg: rgb(0x111827),
            empty: rgb(0x1F2937),
            div_line: rgb(0x374151),
            main_fg: rgb(0xD1D5DB),
            title: rgb(0xFACC15),
            inactive_fg: rgb(0x6B7280),
        }
    }
}

impl Theme {
    /// Load theme from a btop-style file. Missing path → built-in colours; `palette` then
    /// overrides block colours for high-contrast or colorblind variants.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))
            }
            _ => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.blocks = [
                    rgb(0x00FFFF),
                    rgb(0xFFFF00),
                    rgb(0xFF00FF),
                    rgb(0x00FF00),
                    rgb(0xFF0000),
                ];
            }
            crate::Palette::Colorblind => {
                // Okabe–Ito: sky blue, yellow, reddish purple, bluish green, vermillion
                self.blocks = [
                    rgb(0x56B4E9),
                    rgb(0xF0E442),
                    rgb(0xCC79A7),
                    rgb(0x009E73),
                    rgb(0xD55E00),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()));
        let d = Self::default();
        Self {
            blocks: [
                get(&["hi_fg", "proc_misc"]).unwrap_or(d.blocks[0]),
                get(&["title", "cpu_mid"]).unwrap_or(d.blocks[1]),
                get(&["net_box"]).unwrap_or(d.blocks[2]),
                get(&["mem_box", "cpu_start"]).unwrap_or(d.blocks[3]),
                get(&["cpu_end", "temp_end"]).unwrap_or(d.blocks[4]),
            ],
            bg: get(&["main_bg"]).unwrap_or(d.bg),
            empty: get(&["meter_bg"]).unwrap_or(d.empty),
            div_line: get(&["div_line"]).unwrap_or(d.div_line),
            main_fg: get(&["main_fg"]).unwrap_or(d.main_fg),
            title: get(&["title"]).unwrap_or(d.title),
            inactive_fg: get(&["inactive_fg"]).unwrap_or(d.inactive_fg),
        }
    }

    #[inline]
    pub fn block_color(&self, tag: FillTag) -> Color {
        self.blocks[(tag.0 as usize) % self.blocks.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some((key, rest)) = stripped.split_once(']') else {
            continue;
        };
        let Some((_, value)) = rest.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let value = u32::from_str_radix(s, 16).map_err(|_| invalid())?;
    match s.len() {
        6 => Ok(rgb(value)),
        3 => {
            let (r, g, b) = ((value >> 8) & 0xF, (value >> 4) & 0xF, value & 0xF);
            Ok(rgb((r * 17) << 16 | (g * 17) << 8 | b * 17))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#22D3EE").unwrap();
        assert!(matches!(c, Color::Rgb(0x22, 0xD3, 0xEE)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#F80").unwrap();
        assert!(matches!(c, Color::Rgb(255, 136, 0)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("zzzzzz").is_err());
        assert!(parse_hex("+12345").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file("# comment\ntheme[meter_bg]=\"#31353F\"\ntheme[title] = '#E5C07B'\nbogus");
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
        assert_eq!(map.get("title"), Some(&"#E5C07B".to_string()));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_from_map_overrides_and_falls_back() {
        let map = parse_theme_file("theme[net_box]=\"#010203\"\ntheme[meter_bg]=\"#0A0B0C\"");
        let t = Theme::from_map(&map);
        assert_eq!(t.block_color(FillTag(2)), Color::Rgb(1, 2, 3));
        assert_eq!(t.empty, Color::Rgb(10, 11, 12));
        assert_eq!(t.block_color(FillTag(0)), DEFAULT_BLOCKS[0]);
    }

    #[test]
    fn test_missing_file_uses_palette() {
        let t = Theme::load(None, crate::Palette::HighContrast).unwrap();
        assert_eq!(t.block_color(FillTag(4)), Color::Rgb(255, 0, 0));
    }
}
