use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const RESIDUAL_SEPARATORS: &[char] = &[' ', '-', '_', '.', '#'];

// Optional label, optional delimiter, then 1-6 digits not followed by a digit.
static ANCHORED_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:o\.?\s?s\.?|n[º°o]?\.?|pedido|ordem|order|request)\s*)?[.\-_#]?\s*(\d{1,6})(?:\D|$)",
    )
    .expect("anchored id regex is valid")
});

static LOOSE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,6})(?:\D|$)").expect("loose id regex is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdMode {
    /// Digits must open the name, after an optional known label.
    #[default]
    Anchored,
    /// First standalone run of digits anywhere in the name.
    Loose,
}

impl IdMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anchored => "anchored",
            Self::Loose => "loose",
        }
    }
}

impl fmt::Display for IdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anchored" | "strict" => Ok(Self::Anchored),
            "loose" => Ok(Self::Loose),
            other => Err(format!("unknown id mode `{other}`: use `anchored` or `loose`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameId {
    pub id: u32,
    /// The filename with the label and number removed.
    pub residual: String,
}

/// Runs longer than six digits never match, so a date stamp or phone number
/// cannot pass for an id.
pub fn extract_id(file_name: &str, mode: IdMode) -> Option<FilenameId> {
    let regex = match mode {
        IdMode::Anchored => &*ANCHORED_ID_REGEX,
        IdMode::Loose => &*LOOSE_ID_REGEX,
    };
    let digits = regex.captures(file_name)?.get(1)?;
    let id = digits.as_str().parse::<u32>().ok().filter(|id| *id != 0)?;

    let before = match mode {
        IdMode::Anchored => "",
        IdMode::Loose => &file_name[..digits.start()],
    };
    let before = before.trim_end_matches(RESIDUAL_SEPARATORS);
    let after = file_name[digits.end()..].trim_start_matches(RESIDUAL_SEPARATORS);
    let residual = if before.is_empty() || after.is_empty() {
        format!("{before}{after}")
    } else {
        format!("{before} {after}")
    };

    Some(FilenameId { id, residual })
}
