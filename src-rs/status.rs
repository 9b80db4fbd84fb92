use serde::Serialize;
use std::fmt;

/// Canonical shipment states. The only externally meaningful output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Delivered,
    InTransit,
    Pending,
    Unknown,
}

impl StatusLabel {
    /// Token printed by the CLI.
    pub fn token(self) -> &'static str {
        match self {
            StatusLabel::Delivered => "Entregue",
            StatusLabel::InTransit => "Em trânsito",
            StatusLabel::Pending => "Em espera",
            StatusLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Status keywords in match priority order, lower-cased.
pub const KEYWORDS: &[&str] = &["entregue", "em trânsito", "em transito", "em espera"];

fn fold_char(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

/// Lower-cases and strips the Portuguese diacritics so accent variants compare equal.
pub fn fold_accents(text: &str) -> String {
    text.to_lowercase().chars().map(fold_char).collect()
}

/// Maps a matched keyword to its canonical label; anything unrecognised is `Unknown`.
pub fn normalize(keyword: &str) -> StatusLabel {
    match fold_accents(keyword.trim()).as_str() {
        "entregue" => StatusLabel::Delivered,
        "em transito" => StatusLabel::InTransit,
        "em espera" => StatusLabel::Pending,
        _ => StatusLabel::Unknown,
    }
}
