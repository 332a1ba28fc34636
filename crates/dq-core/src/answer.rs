use serde::{Deserialize, Serialize};

/// Confidence assumed when the model does not report a usable one.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Reasoning used when a structured reply omits it.
pub const DEFAULT_REASONING: &str = "Answer generated from the document content";

/// Reasoning used when the reply could not be decoded as structured data.
pub const UNSTRUCTURED_REASONING: &str = "Response generated but not in expected structured format";

/// Text returned to the caller when the provider stayed overloaded through every attempt.
pub const DEGRADED_TEXT: &str =
    "The answering service is temporarily overloaded. Please try again in a few moments.";

/// A normalized answer. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub text: String,
    pub can_answer: bool,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub reasoning: String,
}

impl Answer {
    pub fn new(
        text: impl Into<String>,
        can_answer: bool,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            can_answer,
            confidence: normalize_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }

    /// Fallback for model output that is not a structured object.
    pub fn unstructured(raw: impl Into<String>) -> Self {
        Self::new(raw, true, DEFAULT_CONFIDENCE, UNSTRUCTURED_REASONING)
    }

    /// Synthesized answer after the provider stayed overloaded for `attempts` calls.
    /// Carries nothing produced by the model.
    pub fn degraded(attempts: u32) -> Self {
        Self::new(
            DEGRADED_TEXT,
            false,
            0.0,
            format!(
                "The model provider was overloaded on all {attempts} attempts, so no answer could be generated"
            ),
        )
    }
}

/// Clamp into `[0, 1]`; non-finite values fall back to [`DEFAULT_CONFIDENCE`].
pub fn normalize_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Answer::new("a", true, 1.5, "r").confidence, 1.0);
        assert_eq!(Answer::new("a", true, -0.2, "r").confidence, 0.0);
        assert_eq!(Answer::new("a", true, f64::NAN, "r").confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_degraded_answer() {
        let answer = Answer::degraded(3);
        assert!(!answer.can_answer);
        assert_eq!(answer.confidence, 0.0);
        assert_eq!(answer.text, DEGRADED_TEXT);
        assert!(answer.reasoning.contains('3'));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Answer::unstructured("raw")).unwrap();
        assert_eq!(json["canAnswer"], true);
        assert_eq!(json["reasoning"], UNSTRUCTURED_REASONING);
    }
}
