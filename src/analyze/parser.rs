// src/analyze/parser.rs
//! Strict decoder for the six labeled lines the system prompt asks for:
//!
//! ```text
//! Recommendation: Buy|Sell|Hold
//! Confidence: Low|Medium|High
//! Risk: Low|Medium|High
//! Why: <short rationale>
//! Ticker: <symbol>
//! Sector: <sector>
//! ```
//!
//! Labels match case-insensitively and may be wrapped in markdown emphasis.
//! The first occurrence of a label wins; everything after the `Sector` line
//! is ignored. Unlabeled lines directly after `Why` continue the rationale.

use crate::error::{PipelineError, Result};
use crate::recommendation::{Action, Level, Recommendation};

pub const DEFAULT_MAX_RATIONALE_WORDS: usize = 60;
const MAX_TICKER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Recommendation,
    Confidence,
    Risk,
    Why,
    Ticker,
    Sector,
}

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "recommendation" => Some(Field::Recommendation),
            "confidence" => Some(Field::Confidence),
            "risk" => Some(Field::Risk),
            "why" => Some(Field::Why),
            "ticker" => Some(Field::Ticker),
            "sector" => Some(Field::Sector),
            _ => None,
        }
    }
}

/// Split `**Label:** value` into a known field and its value.
fn labeled(line: &str) -> Option<(Field, &str)> {
    let (label, value) = line.split_once(':')?;
    let label = label
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '#' | '-' | '>'));
    let field = Field::from_label(label)?;
    let value = value.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_'));
    Some((field, value))
}

fn enum_value(s: &str) -> &str {
    s.trim().trim_end_matches(['.', '!']).trim()
}

fn truncate_words(s: &str, max_words: usize) -> String {
    s.split_whitespace()
        .take(max_words.max(1))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_ticker(raw: &str) -> Option<String> {
    let t = raw.trim().trim_start_matches('$').trim().to_ascii_uppercase();
    let valid = !t.is_empty()
        && t.len() <= MAX_TICKER_LEN
        && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    valid.then_some(t)
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidResponse(msg.into())
}

/// Decode a model response into a `Recommendation` or reject it.
pub fn parse_recommendation(content: &str, max_rationale_words: usize) -> Result<Recommendation> {
    let mut action = None;
    let mut confidence = None;
    let mut risk = None;
    let mut why: Option<String> = None;
    let mut ticker = None;
    let mut sector = None;
    let mut in_why = false;

    for line in content.lines() {
        let Some((field, value)) = labeled(line) else {
            if in_why && !line.trim().is_empty() {
                if let Some(w) = why.as_mut() {
                    w.push(' ');
                    w.push_str(line.trim());
                }
            }
            continue;
        };
        in_why = false;
        match field {
            Field::Recommendation if action.is_none() => {
                action = Some(Action::parse(enum_value(value)).ok_or_else(|| {
                    invalid(format!("Recommendation `{value}` is not Buy/Sell/Hold"))
                })?);
            }
            Field::Confidence if confidence.is_none() => {
                confidence = Some(Level::parse(enum_value(value)).ok_or_else(|| {
                    invalid(format!("Confidence `{value}` is not Low/Medium/High"))
                })?);
            }
            Field::Risk if risk.is_none() => {
                risk = Some(Level::parse(enum_value(value)).ok_or_else(|| {
                    invalid(format!("Risk `{value}` is not Low/Medium/High"))
                })?);
            }
            Field::Why if why.is_none() => {
                why = Some(value.to_string());
                in_why = true;
            }
            Field::Ticker if ticker.is_none() => {
                ticker = Some(
                    parse_ticker(value)
                        .ok_or_else(|| invalid(format!("Ticker `{value}` is not a symbol")))?,
                );
            }
            Field::Sector if sector.is_none() => {
                sector = Some(value.to_string());
                break;
            }
            _ => {}
        }
    }

    let rationale = why
        .map(|w| truncate_words(&w, max_rationale_words))
        .filter(|w| !w.is_empty())
        .ok_or_else(|| invalid("missing `Why` line"))?;
    let sector = sector
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing `Sector` line"))?;

    Ok(Recommendation {
        action: action.ok_or_else(|| invalid("missing `Recommendation` line"))?,
        confidence: confidence.ok_or_else(|| invalid("missing `Confidence` line"))?,
        risk: risk.ok_or_else(|| invalid("missing `Risk` line"))?,
        rationale,
        ticker: ticker.ok_or_else(|| invalid("missing `Ticker` line"))?,
        sector,
    })
}
