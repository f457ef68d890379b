//! Canonical ordering oracle
//!
//! An implementation of "sorted by name" and "sorted by price" that is
//! independent of the application's own sort, so a UI-triggered sort can
//! be checked against it.

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// Sort direction requested from the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// How captured texts are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKey {
    /// Case-insensitive text, ties broken by the raw text
    #[default]
    Text,
    /// First number found in the text (prices such as `€1,234.50`)
    Number,
}

/// Sort `values` ascending by `key`, then reverse for [`Direction::Desc`]
///
/// Descending is the exact reverse of ascending, so entries that compare
/// equal also appear in reverse order.
pub fn canonical_order(values: &[String], key: OrderKey, direction: Direction) -> Result<Vec<String>> {
    let mut sorted = match key {
        OrderKey::Text => {
            let mut keyed: Vec<(String, &String)> =
                values.iter().map(|v| (v.to_lowercase(), v)).collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
            keyed.into_iter().map(|(_, v)| v.clone()).collect::<Vec<_>>()
        }
        OrderKey::Number => {
            let mut keyed = values
                .iter()
                .map(|v| parse_number(v).map(|n| (n, v)))
                .collect::<Result<Vec<_>>>()?;
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
            keyed.into_iter().map(|(_, v)| v.clone()).collect::<Vec<_>>()
        }
    };

    if direction == Direction::Desc {
        sorted.reverse();
    }
    Ok(sorted)
}

/// Extract the first number from a display string
///
/// With both `.` and `,` present the later one is the decimal separator.
/// A lone separator kind marks thousands when it repeats or when exactly
/// three digits follow it; otherwise it is the decimal separator.
pub fn parse_number(text: &str) -> Result<f64> {
    let start = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Error::InvalidValue(format!("no number in '{}'", text)))?;
    let negative = text[..start].trim_end().ends_with('-');

    let raw: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == ' ' || *c == '\u{a0}')
        .filter(|c| !c.is_whitespace())
        .collect();
    let raw = raw.trim_end_matches([',', '.']);

    let normalized = match (raw.rfind('.'), raw.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => raw.replace(',', ""),
        (Some(_), Some(_)) => raw.replace('.', "").replace(',', "."),
        (Some(_), None) => single_separator(raw, '.'),
        (None, Some(_)) => single_separator(raw, ','),
        (None, None) => raw.to_string(),
    };

    let value: f64 = normalized
        .parse()
        .map_err(|_| Error::InvalidValue(format!("cannot read number from '{}'", text)))?;
    Ok(if negative { -value } else { value })
}

/// Normalize a number using only `sep` as a separator
fn single_separator(raw: &str, sep: char) -> String {
    let last = raw.rfind(sep).unwrap_or(raw.len());
    let decimals = raw.len() - last - 1;
    if raw.matches(sep).count() > 1 || decimals == 3 {
        raw.replace(sep, "")
    } else {
        raw.replace(sep, ".")
    }
}
