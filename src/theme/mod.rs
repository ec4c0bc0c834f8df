//! Theme derivation
//!
//! Derives presentation color variants from stored base colors. The derived
//! values are never written back to the content store; they are computed at
//! read time and applied as render-scoped presentation state via
//! [`ThemeScope`].

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Fallback background color when no theme row exists or a stored value
/// fails to parse.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// Fallback accent color.
pub const DEFAULT_ACCENT_COLOR: &str = "#2563eb";

/// A color split into its 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Parse a 6-hex-digit color string, with or without a leading `#`
pub fn parse_hex(input: &str) -> Option<Rgb> {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb { r, g, b })
}

/// Encode channels back to the `#rrggbb` form used for input
pub fn encode_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

fn saturating_round(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Move each channel toward white by `amount` (0.0..=1.0)
fn lighten(color: Rgb, amount: f32) -> Rgb {
    let shift = |c: u8| saturating_round(c as f32 + (255.0 - c as f32) * amount);
    Rgb {
        r: shift(color.r),
        g: shift(color.g),
        b: shift(color.b),
    }
}

/// Scale each channel up by `1 + amount`, saturating at 255
fn brighten(color: Rgb, amount: f32) -> Rgb {
    let scale = |c: u8| saturating_round(c as f32 * (1.0 + amount));
    Rgb {
        r: scale(color.r),
        g: scale(color.g),
        b: scale(color.b),
    }
}

/// Secondary background: the stored background lightened by 15%.
///
/// Returns `None` for input that is not a 6-hex-digit color.
pub fn secondary_background(hex: &str) -> Option<String> {
    Some(encode_hex(lighten(parse_hex(hex)?, 0.15)))
}

/// Hover accent: the stored accent brightened by 10%.
pub fn hover_accent(hex: &str) -> Option<String> {
    Some(encode_hex(brighten(parse_hex(hex)?, 0.10)))
}

/// Derived presentation values, computed from stored base colors.
///
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeValues {
    /// Background for secondary surfaces (cards, alternating sections)
    pub secondary_background: String,
    /// Accent color for hover states
    pub hover_accent: String,
}

impl ThemeValues {
    /// Derive presentation values from stored base colors.
    ///
    /// Unparseable inputs fall back to the derivation of the ecosystem
    /// defaults, so a render always has usable values.
    pub fn derive(background: &str, accent: &str) -> Self {
        Self {
            secondary_background: secondary_background(background)
                .or_else(|| secondary_background(DEFAULT_BACKGROUND_COLOR))
                .unwrap_or_default(),
            hover_accent: hover_accent(accent)
                .or_else(|| hover_accent(DEFAULT_ACCENT_COLOR))
                .unwrap_or_default(),
        }
    }
}

impl Default for ThemeValues {
    fn default() -> Self {
        Self::derive(DEFAULT_BACKGROUND_COLOR, DEFAULT_ACCENT_COLOR)
    }
}

lazy_static! {
    static ref CURRENT_THEME: RwLock<ThemeValues> = RwLock::new(ThemeValues::default());
}

/// The theme values currently installed for the running render, or the
/// defaults when no render is in progress.
pub fn current() -> ThemeValues {
    match CURRENT_THEME.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Render-scoped theme state.
///
/// Installs the given values process-wide on construction and restores the
/// defaults when dropped, so a render cannot observe a previous render's
/// theme. Restoration also runs on unwind.
#[must_use = "dropping the scope immediately reverts the theme"]
pub struct ThemeScope {
    _private: (),
}

impl ThemeScope {
    /// Install `values` for the duration of the returned scope
    pub fn apply(values: ThemeValues) -> Self {
        set_current(values);
        Self { _private: () }
    }
}

impl Drop for ThemeScope {
    fn drop(&mut self) {
        set_current(ThemeValues::default());
    }
}

fn set_current(values: ThemeValues) {
    let mut guard = match CURRENT_THEME.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = values;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            parse_hex("#336699"),
            Some(Rgb {
                r: 0x33,
                g: 0x66,
                b: 0x99
            })
        );
        assert_eq!(parse_hex("336699"), parse_hex("#336699"));
        assert_eq!(parse_hex("#369"), None);
        assert_eq!(parse_hex("#33669g"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_roundtrip_through_encode() {
        for hex in ["#000000", "#ffffff", "#1a2b3c", "#deadbe"] {
            let parsed = parse_hex(hex).unwrap();
            assert_eq!(encode_hex(parsed), hex);
        }
    }

    #[test]
    fn test_derived_channels_monotonic_and_bounded() {
        // Sample the channel space; every derived channel must stay within
        // [input, 255].
        for step in 0..=51 {
            let c = (step * 5) as u8;
            let hex = encode_hex(Rgb { r: c, g: c, b: c });

            let lightened = parse_hex(&secondary_background(&hex).unwrap()).unwrap();
            assert!(lightened.r >= c && lightened.g >= c && lightened.b >= c);

            let brightened = parse_hex(&hover_accent(&hex).unwrap()).unwrap();
            assert!(brightened.r >= c && brightened.g >= c && brightened.b >= c);
        }
    }

    #[test]
    fn test_saturation_at_white() {
        assert_eq!(secondary_background("#ffffff").unwrap(), "#ffffff");
        assert_eq!(hover_accent("#ffffff").unwrap(), "#ffffff");
        // A channel near the top must clamp, not wrap.
        assert_eq!(hover_accent("#f0f0f0").unwrap(), "#ffffff");
    }

    #[test]
    fn test_derive_falls_back_on_bad_input() {
        let derived = ThemeValues::derive("not-a-color", "also-bad");
        assert_eq!(derived, ThemeValues::default());
    }

    // Serialized with the server render tests: both touch the
    // process-wide theme state.
    #[test]
    #[serial_test::serial(theme_state)]
    fn test_scope_installs_and_restores() {
        let values = ThemeValues {
            secondary_background: "#111111".to_string(),
            hover_accent: "#222222".to_string(),
        };
        {
            let _scope = ThemeScope::apply(values.clone());
            assert_eq!(current(), values);
        }
        assert_eq!(current(), ThemeValues::default());
    }
}
