//! Verdict type and the tolerant parser for model output.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::db::VerdictSource;
use crate::llm::extract_json_object;

/// Summary shown when the model output could not be used
pub const FALLBACK_SUMMARY: &str = "AI output invalid.";

/// Highest fairness score a verdict may carry
pub const MAX_FAIRNESS: u8 = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Friendly,
    Neutral,
    Hostile,
}

/// Judgement of one NPC-player conversation. Every field is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeVerdict {
    pub overall_tone: Tone,
    pub in_character: bool,
    pub fairness_score: u8,
    pub escalation_too_fast: bool,
    pub summary: String,
}

impl JudgeVerdict {
    /// Neutral verdict substituted for unusable model output
    pub fn fallback() -> Self {
        Self {
            overall_tone: Tone::Neutral,
            in_character: true,
            fairness_score: 5,
            escalation_too_fast: false,
            summary: FALLBACK_SUMMARY.to_string(),
        }
    }
}

/// Outcome of reading a verdict out of raw model text
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictParse {
    Parsed(JudgeVerdict),
    Invalid { raw: String, reason: String },
}

impl VerdictParse {
    /// The verdict to store and return, and where it came from
    pub fn resolve(self) -> (JudgeVerdict, VerdictSource) {
        match self {
            VerdictParse::Parsed(verdict) => (verdict, VerdictSource::Model),
            VerdictParse::Invalid { .. } => (JudgeVerdict::fallback(), VerdictSource::Fallback),
        }
    }
}

/// Shape the model is asked to produce. Tone stays a string so an unknown
/// value is reported as such rather than as a generic type error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVerdict {
    overall_tone: String,
    in_character: bool,
    fairness_score: i64,
    escalation_too_fast: bool,
    summary: String,
}

/// Parse model text into a verdict.
///
/// The JSON object is taken from between the first `{` and the last `}`, so
/// chatter around it is ignored. A missing field, an unknown tone or a
/// fairness score outside 0..=10 makes the whole output invalid.
pub fn parse_verdict(raw: &str) -> VerdictParse {
    let invalid = |reason: String| VerdictParse::Invalid {
        raw: raw.to_string(),
        reason,
    };

    let Some(json) = extract_json_object(raw) else {
        return invalid("no JSON object in model output".to_string());
    };

    let model: ModelVerdict = match serde_json::from_str(json) {
        Ok(model) => model,
        Err(e) => return invalid(format!("malformed verdict JSON: {}", e)),
    };

    let Ok(overall_tone) = model.overall_tone.trim().parse::<Tone>() else {
        return invalid(format!("unknown tone '{}'", model.overall_tone));
    };

    let fairness_score = match u8::try_from(model.fairness_score) {
        Ok(score) if score <= MAX_FAIRNESS => score,
        _ => {
            return invalid(format!(
                "fairness score {} outside 0..={}",
                model.fairness_score, MAX_FAIRNESS
            ));
        }
    };

    VerdictParse::Parsed(JudgeVerdict {
        overall_tone,
        in_character: model.in_character,
        fairness_score,
        escalation_too_fast: model.escalation_too_fast,
        summary: model.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"overallTone": "hostile", "inCharacter": true, "fairnessScore": 3, "escalationTooFast": true, "summary": "The guard threatened the player."}"#;

    fn assert_invalid(raw: &str) {
        match parse_verdict(raw) {
            VerdictParse::Invalid { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("expected invalid verdict for {:?}, got {:?}", raw, other),
        }
    }

    #[test]
    fn test_parses_clean_json() {
        let VerdictParse::Parsed(verdict) = parse_verdict(VALID) else {
            panic!("expected parsed verdict");
        };
        assert_eq!(verdict.overall_tone, Tone::Hostile);
        assert!(verdict.in_character);
        assert_eq!(verdict.fairness_score, 3);
        assert!(verdict.escalation_too_fast);
        assert_eq!(verdict.summary, "The guard threatened the player.");
    }

    #[test]
    fn test_parses_object_wrapped_in_prose() {
        let raw = format!("Sure! {} Hope that helps!", VALID);
        assert!(matches!(parse_verdict(&raw), VerdictParse::Parsed(_)));
    }

    #[test]
    fn test_tone_is_case_insensitive() {
        let raw = VALID.replace("\"hostile\"", "\"Friendly\"");
        let VerdictParse::Parsed(verdict) = parse_verdict(&raw) else {
            panic!("expected parsed verdict");
        };
        assert_eq!(verdict.overall_tone, Tone::Friendly);
    }

    #[test]
    fn test_unusable_outputs_are_invalid() {
        assert_invalid("");
        assert_invalid("The NPC was polite and fair.");
        assert_invalid(r#"{"overallTone": "hostile", "inCharacter": tr"#);
        assert_invalid(r#"{"overallTone": "hostile"}"#);
        assert_invalid(&VALID.replace("\"hostile\"", "\"furious\""));
        assert_invalid(&VALID.replace("\"fairnessScore\": 3", "\"fairnessScore\": 11"));
        assert_invalid(&VALID.replace("\"fairnessScore\": 3", "\"fairnessScore\": -1"));
        assert_invalid(&VALID.replace("\"fairnessScore\": 3", "\"fairnessScore\": \"high\""));
    }

    #[test]
    fn test_resolve_falls_back() {
        let (verdict, source) = parse_verdict("nothing useful").resolve();
        assert_eq!(verdict, JudgeVerdict::fallback());
        assert_eq!(source, VerdictSource::Fallback);
        assert_eq!(verdict.overall_tone, Tone::Neutral);
        assert!(verdict.in_character);
        assert_eq!(verdict.fairness_score, 5);
        assert!(!verdict.escalation_too_fast);
        assert_eq!(verdict.summary, "AI output invalid.");

        let (_, source) = parse_verdict(VALID).resolve();
        assert_eq!(source, VerdictSource::Model);
    }
}
