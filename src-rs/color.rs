use image::Rgb;
use regex::Regex;
use std::sync::OnceLock;

/// Resolved RGB triple as captured from a computed style.
pub type Color = Rgb<u8>;

/// Green-dominance thresholds: `g > r + margin`, `g > b + margin`, `g >= floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreenTier {
    Strict,
    Soft,
}

impl GreenTier {
    fn margin(self) -> i32 {
        match self {
            GreenTier::Strict => 18,
            GreenTier::Soft => 8,
        }
    }

    fn floor(self) -> i32 {
        match self {
            GreenTier::Strict => 90,
            GreenTier::Soft => 70,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GreenTier::Strict => "strict",
            GreenTier::Soft => "soft",
        }
    }
}

pub fn is_green_dominant(color: Color, tier: GreenTier) -> bool {
    let [r, g, b] = color.0.map(i32::from);
    g > r + tier.margin() && g > b + tier.margin() && g >= tier.floor()
}

/// Saturation of green over the other two channels, used to rank candidates.
pub fn greenness(color: Color) -> f64 {
    let [r, g, b] = color.0.map(f64::from);
    g - (r + b) / 2.0
}

fn rgb_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)rgba?\(\s*([0-9.]+%?)\s*[,\s]\s*([0-9.]+%?)\s*[,\s]\s*([0-9.]+%?)\s*(?:[,/]\s*([0-9.]+%?)\s*)?\)",
        )
        .expect("rgb pattern compiles")
    })
}

fn parse_channel(raw: &str) -> Option<u8> {
    let value = if let Some(pct) = raw.strip_suffix('%') {
        pct.parse::<f64>().ok()? * 255.0 / 100.0
    } else {
        raw.parse::<f64>().ok()?
    };
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let value = if let Some(pct) = raw.strip_suffix('%') {
        pct.parse::<f64>().ok()? / 100.0
    } else {
        raw.parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 | 4 => {
            let mut out = [0u8; 3];
            for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                let v = ch.to_digit(16)? as u8;
                *slot = v * 17;
            }
            if hex.len() == 4 && hex[3..4].eq_ignore_ascii_case("0") {
                return None;
            }
            Some(Rgb(out))
        }
        6 | 8 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            if hex.len() == 8 && channel(&hex[6..8])? == 0 {
                return None;
            }
            Some(Rgb([r, g, b]))
        }
        _ => None,
    }
}

/// Parses a CSS color string into an RGB triple.
///
/// Accepts `rgb(...)`/`rgba(...)` anywhere in the string (comma or space
/// separated, percent channels allowed), hex notation and a handful of named
/// colors. Anything else, including fully transparent colors, yields `None`.
pub fn parse_color(raw: &str) -> Option<Color> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(caps) = rgb_pattern().captures(s) {
        let r = parse_channel(caps.get(1)?.as_str())?;
        let g = parse_channel(caps.get(2)?.as_str())?;
        let b = parse_channel(caps.get(3)?.as_str())?;
        if let Some(alpha) = caps.get(4).and_then(|m| parse_alpha(m.as_str())) {
            if alpha <= 0.0 {
                return None;
            }
        }
        return Some(Rgb([r, g, b]));
    }

    match s.to_ascii_lowercase().as_str() {
        "green" => Some(Rgb([0, 128, 0])),
        "lime" => Some(Rgb([0, 255, 0])),
        "black" => Some(Rgb([0, 0, 0])),
        "white" => Some(Rgb([255, 255, 255])),
        "red" => Some(Rgb([255, 0, 0])),
        "blue" => Some(Rgb([0, 0, 255])),
        _ => None,
    }
}
