use std::sync::LazyLock;

use regex::Regex;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%").expect("valid regex"));

/// A progress report emitted while a local model session is initializing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    /// Free-text status from the runtime.
    pub text: String,
    /// The percentage embedded in `text`, if any.
    pub percent: Option<u8>,
}

impl LoadProgress {
    /// Creates a report from the runtime's status text.
    pub fn from_text<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let percent = parse_progress(&text);
        Self { text, percent }
    }
}

/// Extracts the first `<digits>%` marker of a status text, clamped to 100.
pub fn parse_progress(text: &str) -> Option<u8> {
    let digits = PERCENT_RE.captures(text)?.get(1)?.as_str();
    // Overlong digit runs still mean "done".
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(100) as u8)
}
