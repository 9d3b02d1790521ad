//! Defensive parsing of reasoner responses into validated decisions.
//!
//! Exactly one best-effort extraction is attempted per response: locate an
//! embedded JSON object (markdown fences tolerated), deserialize leniently,
//! and clamp the confidence score. Anything else yields the deterministic
//! fallback decision; parse failure is a recovered condition, never an
//! error surfaced to the dispatcher loop.

use serde::Deserialize;
use serde_json::{Map, Value};

use vantage_core::decision::{Decision, UrgencyLevel};

/// Action assigned to fallback decisions.
pub const FALLBACK_ACTION: &str = "monitor_and_report";

/// Confidence assigned to fallback decisions. Kept at or below any sane
/// advisory threshold so fallbacks never execute autonomously.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// How much raw response text the fallback reasoning retains.
const FALLBACK_SNIPPET_LEN: usize = 200;

/// Lenient decision document as the reasoner tends to emit it.
#[derive(Debug, Deserialize)]
struct RawDecision {
    action_type: Option<String>,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, alias = "confidence")]
    confidence_score: Option<f64>,
    #[serde(default)]
    expected_impact: Option<String>,
    #[serde(default)]
    urgency_level: Option<String>,
}

/// Parse a raw reasoner response into a decision.
///
/// Requires an extractable JSON object carrying a non-empty `action_type`
/// and a numeric confidence; every other field is defaulted. The returned
/// decision's confidence is clamped into [0, 1].
pub fn parse_decision(raw: &str) -> Result<Decision, String> {
    let json_str = extract_json(raw);
    let parsed: RawDecision =
        serde_json::from_str(json_str).map_err(|e| format!("not a decision document: {e}"))?;

    let action_type = match parsed.action_type {
        Some(a) if !a.trim().is_empty() => a,
        _ => return Err("missing action_type".into()),
    };
    let confidence = parsed
        .confidence_score
        .ok_or_else(|| "missing confidence_score".to_string())?;

    Ok(Decision::new(
        action_type,
        parsed.parameters.unwrap_or_default(),
        parsed.reasoning.unwrap_or_else(|| "no reasoning provided".into()),
        confidence,
        parsed.expected_impact.unwrap_or_else(|| "unknown".into()),
        parse_urgency(parsed.urgency_level.as_deref()),
    ))
}

/// Build the deterministic fallback decision for an unusable response.
///
/// Given the same raw input and reason, the semantic fields (action,
/// parameters, reasoning, confidence) are always identical.
pub fn fallback_decision(raw: &str, reason: &str) -> Decision {
    let snippet: String = raw.chars().take(FALLBACK_SNIPPET_LEN).collect();
    Decision::new(
        FALLBACK_ACTION,
        Map::new(),
        format!("parsing failed ({reason}); raw response: {snippet}"),
        FALLBACK_CONFIDENCE,
        "none; degraded to monitoring",
        UrgencyLevel::Low,
    )
}

/// Unknown urgency strings degrade to Normal rather than failing the parse.
fn parse_urgency(raw: Option<&str>) -> UrgencyLevel {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("immediate") => UrgencyLevel::Immediate,
        Some("high") => UrgencyLevel::High,
        Some("low") => UrgencyLevel::Low,
        _ => UrgencyLevel::Normal,
    }
}

/// Locate the JSON payload embedded in a free-text response.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        // Skip past any language identifier on the same line
        let after_tick = &trimmed[json_start..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // Try raw JSON (starts with {)
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"action_type":"adjust_pricing","parameters":{"delta_pct":5},
        "reasoning":"runway is short","confidence_score":0.91,
        "expected_impact":"+4% MRR","urgency_level":"high"}"#;

    #[test]
    fn parses_clean_json() {
        let d = parse_decision(GOOD).unwrap();
        assert_eq!(d.action_type, "adjust_pricing");
        assert_eq!(d.confidence_score, 0.91);
        assert_eq!(d.urgency_level, UrgencyLevel::High);
        assert_eq!(d.parameters["delta_pct"], 5);
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("Here's my decision:\n```json\n{GOOD}\n```\nHope that helps!");
        let d = parse_decision(&fenced).unwrap();
        assert_eq!(d.action_type, "adjust_pricing");
    }

    #[test]
    fn parses_json_with_prose_prefix() {
        let noisy = format!("Sure! {GOOD}");
        assert!(parse_decision(&noisy).is_ok());
    }

    #[test]
    fn confidence_out_of_range_is_clamped() {
        let hot = GOOD.replace("0.91", "3.0");
        assert_eq!(parse_decision(&hot).unwrap().confidence_score, 1.0);
        let cold = GOOD.replace("0.91", "-1.0");
        assert_eq!(parse_decision(&cold).unwrap().confidence_score, 0.0);
    }

    #[test]
    fn accepts_confidence_alias() {
        let aliased = GOOD.replace("confidence_score", "confidence");
        assert_eq!(parse_decision(&aliased).unwrap().confidence_score, 0.91);
    }

    #[test]
    fn unknown_urgency_degrades_to_normal() {
        let odd = GOOD.replace("\"high\"", "\"apocalyptic\"");
        assert_eq!(parse_decision(&odd).unwrap().urgency_level, UrgencyLevel::Normal);
    }

    #[test]
    fn plain_prose_fails_parse() {
        assert!(parse_decision("I think we should probably monitor the situation.").is_err());
    }

    #[test]
    fn missing_action_type_fails_parse() {
        assert!(parse_decision(r#"{"confidence_score": 0.9}"#).is_err());
        assert!(parse_decision(r#"{"action_type": "  ", "confidence_score": 0.9}"#).is_err());
    }

    #[test]
    fn missing_confidence_fails_parse() {
        assert!(parse_decision(r#"{"action_type": "adjust_pricing"}"#).is_err());
    }

    #[test]
    fn fallback_is_deterministic_and_marked() {
        let a = fallback_decision("gibberish response", "not a decision document");
        let b = fallback_decision("gibberish response", "not a decision document");
        assert_eq!(a.action_type, FALLBACK_ACTION);
        assert_eq!(a.confidence_score, FALLBACK_CONFIDENCE);
        assert!(a.reasoning.contains("parsing failed"));
        assert!(a.reasoning.contains("gibberish response"));

        assert_eq!(a.action_type, b.action_type);
        assert_eq!(a.confidence_score, b.confidence_score);
        assert_eq!(a.reasoning, b.reasoning);
        assert_eq!(a.parameters, b.parameters);
    }

    #[test]
    fn fallback_truncates_long_raw_input() {
        let long = "x".repeat(10_000);
        let d = fallback_decision(&long, "noise");
        assert!(d.reasoning.len() < 1_000);
    }
}
