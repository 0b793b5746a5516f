//! Synthesis engine: SignalBundle -> Verdict.
//!
//! Sends the aggregated signals to the reasoning backend with a fixed
//! scoring rubric, then strictly validates the structured response before
//! trusting it. The engine never fails outward: any backend failure or
//! validation violation resolves to the deterministic neutral fallback
//! verdict (confidence 50, manual review).
//!
//! The confidence score is authoritative: the local validator recomputes
//! the recommendation from the clamped confidence and overrides whatever
//! recommendation the backend chose when the two disagree.

use crate::backend::{BackendRequest, ReasoningBackend};
use crate::config::SynthesisConfig;
use crate::types::{ProbableOwner, Recommendation, SignalBundle, Verdict};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed evaluation rubric sent as the system instructions block.
///
/// The scoring bands here are prompt guidance for the backend; the
/// recommendation mapping is additionally re-enforced locally.
const RUBRIC: &str = "\
You are a media verification expert analyzing user-generated content provenance.

Provide your analysis in this exact JSON format. Respond ONLY with valid JSON, no other text:
{
  \"confidence\": <0-100 integer>,
  \"summary\": \"<2-3 sentence plain English explanation>\",
  \"red_flags\": [<list of specific concerns, if any - can be empty array>],
  \"recommendation\": \"<proceed|manual_review|high_risk>\",
  \"reasoning\": \"<explanation of confidence score>\",
  \"probable_owner\": {
    \"handle\": \"<if identifiable from signals, otherwise 'Unknown'>\",
    \"platform\": \"<if identifiable, otherwise 'Unknown'>\",
    \"confidence\": <0-100 integer>,
    \"contact_method\": \"<recommended contact approach>\"
  }
}

Scoring guidance:
- 80-100: High confidence (provenance manifest present and validated, OR strong metadata with no conflicts)
- 60-79: Medium confidence (good metadata, some uncertainties)
- 40-59: Low confidence (missing metadata/provenance OR minor conflicts)
- 0-39: Very low confidence (significant red flags OR evidence of manipulation)

Red flags to check for:
- Metadata timestamp doesn't match claimed event timing
- Location data conflicts with known event location
- Evidence of editing software use after claimed capture
- Multiple earlier versions found suggesting a repost
- No metadata at all (stripped, suggesting attempt to hide origin)
- Reverse search shows earlier instances (likely repost)";

/// A backend response after structural validation: either a trustworthy
/// verdict or a malformation collapsing to the fallback. No downstream code
/// ever sees an unvalidated shape.
#[derive(Debug)]
enum ValidatedResponse {
    Valid(Verdict),
    Malformed(String),
}

/// Transforms signal bundles into trust judgments.
pub struct SynthesisEngine {
    backend: Arc<dyn ReasoningBackend>,
    config: SynthesisConfig,
}

impl SynthesisEngine {
    pub fn new(backend: Arc<dyn ReasoningBackend>, config: SynthesisConfig) -> Self {
        Self { backend, config }
    }

    /// Synthesize a verdict from a signal bundle.
    ///
    /// Never fails outward: every error path resolves to the fallback
    /// verdict. Side effect: exactly one backend call, no retries.
    pub async fn synthesize(&self, bundle: &SignalBundle) -> Verdict {
        let request = BackendRequest {
            system: RUBRIC.to_string(),
            user: Self::user_prompt(bundle),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json_mode: true,
        };

        let response = match self.backend.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    category = e.category(),
                    error = %e,
                    "Backend call failed during synthesis; using fallback verdict"
                );
                return fallback_verdict();
            }
        };

        match self.validate(&response.content) {
            ValidatedResponse::Valid(verdict) => {
                debug!(
                    confidence = verdict.confidence,
                    recommendation = %verdict.recommendation,
                    "Synthesis completed"
                );
                verdict
            }
            ValidatedResponse::Malformed(reason) => {
                warn!(
                    category = "schema_validation",
                    reason = reason.as_str(),
                    "Backend response failed validation; using fallback verdict"
                );
                fallback_verdict()
            }
        }
    }

    /// Serialize the bundle into the analysis prompt.
    fn user_prompt(bundle: &SignalBundle) -> String {
        let metadata = serde_json::to_string_pretty(&bundle.metadata).unwrap_or_default();
        let provenance = serde_json::to_string_pretty(&bundle.provenance).unwrap_or_default();
        let web = serde_json::to_string_pretty(&bundle.web_matches).unwrap_or_default();
        format!(
            "Analyze these provenance signals:\n\n\
             Content Credentials: {provenance}\n\
             Embedded Metadata: {metadata}\n\
             Reverse Image Search: {web}\n\n\
             Provide your analysis as JSON."
        )
    }

    /// Validate a raw backend response into a verdict, or classify the way
    /// it is malformed.
    ///
    /// Steps: parse as JSON object; required fields with correct primitive
    /// types; coerce and clamp confidence; recompute the recommendation
    /// from the clamped confidence; independently validate the optional
    /// probable owner.
    fn validate(&self, raw: &str) -> ValidatedResponse {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return ValidatedResponse::Malformed(format!("invalid JSON: {}", e)),
        };
        if !value.is_object() {
            return ValidatedResponse::Malformed("response is not a JSON object".into());
        }

        let confidence = match coerce_confidence(&value["confidence"]) {
            Some(c) => c,
            None => {
                return ValidatedResponse::Malformed(format!(
                    "confidence is not numeric: {}",
                    value["confidence"]
                ));
            }
        };

        let summary = match value["summary"].as_str() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return ValidatedResponse::Malformed("summary missing or not a string".into()),
        };
        let reasoning = match value["reasoning"].as_str() {
            Some(s) => s.to_string(),
            None => return ValidatedResponse::Malformed("reasoning missing or not a string".into()),
        };

        // red_flags may be omitted (treated as empty) but a present value
        // must be a list of strings.
        let red_flags = match &value["red_flags"] {
            Value::Null => Vec::new(),
            Value::Array(items) => {
                let mut flags = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => flags.push(s.to_string()),
                        None => {
                            return ValidatedResponse::Malformed(
                                "red_flags contains a non-string entry".into(),
                            );
                        }
                    }
                }
                flags
            }
            _ => return ValidatedResponse::Malformed("red_flags is not a list".into()),
        };

        let backend_recommendation = match value["recommendation"].as_str() {
            Some(s) => match serde_json::from_value::<Recommendation>(Value::String(s.into())) {
                Ok(r) => r,
                Err(_) => {
                    return ValidatedResponse::Malformed(format!(
                        "recommendation '{}' is not in the enum",
                        s
                    ));
                }
            },
            None => {
                return ValidatedResponse::Malformed(
                    "recommendation missing or not a string".into(),
                );
            }
        };

        // Confidence is authoritative: recompute the recommendation and
        // override the backend's when inconsistent.
        let recommendation = self.recommendation_for(confidence);
        if recommendation != backend_recommendation {
            warn!(
                confidence,
                backend = %backend_recommendation,
                recomputed = %recommendation,
                "Overriding backend recommendation inconsistent with confidence"
            );
        }

        // A malformed owner drops the field only; owner is optional.
        let probable_owner = validate_owner(&value["probable_owner"]);

        ValidatedResponse::Valid(Verdict {
            confidence,
            summary,
            red_flags,
            recommendation,
            reasoning,
            probable_owner,
        })
    }

    /// Map a clamped confidence to its recommendation band.
    pub fn recommendation_for(&self, confidence: u8) -> Recommendation {
        if confidence >= self.config.proceed_threshold {
            Recommendation::Proceed
        } else if confidence < self.config.high_risk_threshold {
            Recommendation::HighRisk
        } else {
            Recommendation::ManualReview
        }
    }
}

/// Coerce a JSON confidence value to an integer clamped to [0, 100].
///
/// Accepts integers, floats, and numeric strings. Non-integer inputs are
/// coerced with a logged warning so malformed-but-coercible values stay
/// observable; anything non-numeric is rejected.
fn coerce_confidence(value: &Value) -> Option<u8> {
    let raw: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let parsed = s.trim().parse::<f64>().ok()?;
            warn!(value = s.as_str(), "Coercing string confidence to integer");
            parsed
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    if raw.fract() != 0.0 {
        warn!(value = raw, "Coercing fractional confidence to integer");
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

/// Validate the optional probable-owner block; `None` when absent or
/// malformed.
fn validate_owner(value: &Value) -> Option<ProbableOwner> {
    if value.is_null() {
        return None;
    }
    let handle = value["handle"].as_str().filter(|s| !s.is_empty());
    let platform = value["platform"].as_str().filter(|s| !s.is_empty());
    let confidence = coerce_confidence(&value["confidence"]);
    let contact_method = value["contact_method"].as_str().filter(|s| !s.is_empty());

    match (handle, platform, confidence, contact_method) {
        (Some(handle), Some(platform), Some(confidence), Some(contact_method)) => {
            Some(ProbableOwner {
                handle: handle.to_string(),
                platform: platform.to_string(),
                confidence,
                contact_method: contact_method.to_string(),
            })
        }
        _ => {
            warn!("Dropping malformed probable_owner block from backend response");
            None
        }
    }
}

/// The deterministic neutral fallback verdict.
///
/// Pure factory returning a fresh value each call: confidence 50 sits at
/// the center of the manual-review band, so a degraded analysis still
/// yields a usable, honest triage result.
pub fn fallback_verdict() -> Verdict {
    Verdict {
        confidence: 50,
        summary: "Automated synthesis was unavailable. Manual review required.".to_string(),
        red_flags: Vec::new(),
        recommendation: Recommendation::ManualReview,
        reasoning: "The reasoning backend could not produce a valid analysis for this request."
            .to_string(),
        probable_owner: None,
    }
}
