//! Display helpers shared by the views.

use std::fmt;

/// A metric value as shown to the operator. `NoData` is never rendered as
/// zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    NoData,
    Value(f64),
}

impl Reading {
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Value(v),
            _ => Self::NoData,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{:.4}", v),
            Self::NoData => f.write_str("no data"),
        }
    }
}

/// Four-decimal number or `--` when absent.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.4}", v),
        _ => "--".to_string(),
    }
}

/// Parse a threshold typed as text.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Truncate to `max` characters, ending with an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}…", kept)
}
