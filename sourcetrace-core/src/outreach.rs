//! Outreach generator: owner + license params -> rights-clearance draft.
//!
//! Caller input (owner handle and platform) is validated up front and
//! surfaces errors; backend behavior is absorbed. A failed or malformed
//! backend response resolves to a deterministic template draft, so a caller
//! who passed valid input always receives a complete [`OutreachDraft`].

use crate::backend::{BackendRequest, ReasoningBackend};
use crate::config::OutreachConfig;
use crate::error::ValidationError;
use crate::types::{LicenseParams, OutreachDraft, OwnerInfo};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const TONE_CONTRACT: &str = "\
You are an experienced news desk editor who writes respectful, professional \
outreach messages to content creators. You are asking permission, never \
demanding. Keep messages concise and human.

Respond ONLY with valid JSON in this exact format, no other text:
{
  \"outreach_message\": \"<the message to send, under the word limit>\",
  \"license_summary\": \"<1-2 sentence plain-language summary of the proposed terms>\",
  \"next_steps\": [<2-4 short strings describing what happens after the owner replies>]
}";

/// Drafts rights-clearance messages for a probable content owner.
pub struct OutreachGenerator {
    backend: Arc<dyn ReasoningBackend>,
    config: OutreachConfig,
}

impl OutreachGenerator {
    pub fn new(backend: Arc<dyn ReasoningBackend>, config: OutreachConfig) -> Self {
        Self { backend, config }
    }

    /// Generate an outreach draft for the given owner and license terms.
    ///
    /// Returns `Err` only for invalid caller input (empty handle or
    /// platform), checked before any backend call. Backend failures and
    /// malformed responses degrade to [`OutreachGenerator::fallback_draft`].
    pub async fn draft(
        &self,
        owner: &OwnerInfo,
        params: &LicenseParams,
    ) -> Result<OutreachDraft, ValidationError> {
        owner.validate()?;

        let request = BackendRequest {
            system: TONE_CONTRACT.to_string(),
            user: self.user_prompt(owner, params),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json_mode: true,
        };

        let draft = match self.backend.complete(request).await {
            Ok(response) => match self.validate(&response.content) {
                Some(draft) => {
                    debug!(handle = owner.handle.as_str(), "Outreach draft generated");
                    draft
                }
                None => {
                    warn!(
                        category = "schema_validation",
                        "Backend outreach response failed validation; using template draft"
                    );
                    self.fallback_draft(owner, params)
                }
            },
            Err(e) => {
                warn!(
                    category = e.category(),
                    error = %e,
                    "Backend call failed during outreach; using template draft"
                );
                self.fallback_draft(owner, params)
            }
        };

        Ok(draft)
    }

    fn user_prompt(&self, owner: &OwnerInfo, params: &LicenseParams) -> String {
        format!(
            "Draft an outreach message requesting a license for user-generated content.\n\n\
             Owner handle: {handle}\n\
             Platform: {platform}\n\
             Intended use: {use_case}\n\
             License scope: {scope}\n\
             Territory: {territory}\n\
             Compensation: {compensation}\n\n\
             Write as: {sender}, {org}.\n\
             Keep the message under {max_words} words.",
            handle = owner.handle,
            platform = owner.platform,
            use_case = params.use_case,
            scope = params.scope,
            territory = params.territory,
            compensation = params.compensation,
            sender = self.config.sender_name,
            org = self.config.sender_organization,
            max_words = self.config.max_words,
        )
    }

    /// Validate the backend response into a draft, or `None` when any field
    /// is missing, mistyped, or empty. The message is truncated to the
    /// configured word limit rather than rejected.
    fn validate(&self, raw: &str) -> Option<OutreachDraft> {
        let value: Value = serde_json::from_str(raw).ok()?;

        let message = value["outreach_message"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let license_summary = value["license_summary"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;

        let next_steps: Vec<String> = value["next_steps"]
            .as_array()?
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if next_steps.is_empty() {
            return None;
        }

        Some(OutreachDraft {
            message: self.truncate_to_word_limit(message),
            license_summary: license_summary.to_string(),
            next_steps,
        })
    }

    fn truncate_to_word_limit(&self, message: &str) -> String {
        let words: Vec<&str> = message.split_whitespace().collect();
        if words.len() <= self.config.max_words {
            return message.to_string();
        }
        warn!(
            words = words.len(),
            limit = self.config.max_words,
            "Truncating overlong outreach message"
        );
        words[..self.config.max_words].join(" ")
    }

    /// Deterministic template draft used when the backend cannot produce a
    /// valid one. Interpolates the owner and license terms so the result is
    /// still sendable after a human pass.
    pub fn fallback_draft(&self, owner: &OwnerInfo, params: &LicenseParams) -> OutreachDraft {
        let message = format!(
            "Hello {handle}, I'm {sender} with {org}. We came across your content \
             on {platform} and would like to request permission to use it for \
             {use_case} coverage. We are offering {compensation} terms. Could we \
             discuss licensing? Thank you for your time.",
            handle = owner.handle,
            sender = self.config.sender_name,
            org = self.config.sender_organization,
            platform = owner.platform,
            use_case = params.use_case,
            compensation = params.compensation,
        );
        let license_summary = format!(
            "{scope} license, {territory} territory, {compensation} compensation, \
             for {use_case} use.",
            scope = params.scope,
            territory = params.territory,
            compensation = params.compensation,
            use_case = params.use_case,
        );
        OutreachDraft {
            message,
            license_summary,
            next_steps: vec![
                "Await a reply from the content owner".to_string(),
                "Confirm licensing terms in writing".to_string(),
                "Obtain a signed release before publication".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::types::{Compensation, LicenseScope, Territory, UseCase};
    use pretty_assertions::assert_eq;

    fn owner() -> OwnerInfo {
        OwnerInfo {
            handle: "@stormchaser99".to_string(),
            platform: "Twitter/X".to_string(),
        }
    }

    fn params() -> LicenseParams {
        LicenseParams {
            use_case: UseCase::BreakingNews,
            scope: LicenseScope::SingleUse,
            territory: Territory::Worldwide,
            compensation: Compensation::StandardRate,
        }
    }

    fn generator(backend: MockBackend) -> OutreachGenerator {
        OutreachGenerator::new(std::sync::Arc::new(backend), OutreachConfig::default())
    }

    fn valid_response() -> String {
        serde_json::json!({
            "outreach_message": "Hello @stormchaser99, we would love to license your video.",
            "license_summary": "Single-use worldwide license at standard rate.",
            "next_steps": ["Await reply", "Confirm terms", "Sign release"],
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_valid_response_becomes_draft() {
        let generator = generator(MockBackend::with_response(&valid_response()));
        let draft = generator.draft(&owner(), &params()).await.unwrap();
        assert!(draft.message.contains("@stormchaser99"));
        assert_eq!(draft.next_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_handle_is_rejected_without_backend_call() {
        let backend = std::sync::Arc::new(MockBackend::with_response(&valid_response()));
        let queued = backend.remaining();
        let generator =
            OutreachGenerator::new(backend.clone(), OutreachConfig::default());
        let bad = OwnerInfo {
            handle: "   ".to_string(),
            platform: "Twitter/X".to_string(),
        };
        let err = generator.draft(&bad, &params()).await.unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField { .. }));
        assert_eq!(backend.remaining(), queued);
    }

    #[tokio::test]
    async fn test_backend_failure_yields_template_draft() {
        let generator = generator(MockBackend::failing());
        let draft = generator.draft(&owner(), &params()).await.unwrap();
        assert!(draft.message.contains("@stormchaser99"));
        assert!(draft.message.contains("Twitter/X"));
        assert!(draft.message.contains("breaking_news"));
        assert!(draft.message.contains("standard_rate"));
        assert_eq!(draft.next_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_response_yields_template_draft() {
        let raw = serde_json::json!({
            "outreach_message": "Hi there",
            "license_summary": "",
            "next_steps": ["Await reply"],
        })
        .to_string();
        let generator = generator(MockBackend::with_response(&raw));
        let draft = generator.draft(&owner(), &params()).await.unwrap();
        // Empty license_summary fails validation, so the template fills in.
        assert!(draft.license_summary.contains("single_use"));
    }

    #[tokio::test]
    async fn test_empty_next_steps_yields_template_draft() {
        let raw = serde_json::json!({
            "outreach_message": "Hi there",
            "license_summary": "Terms summary.",
            "next_steps": [],
        })
        .to_string();
        let generator = generator(MockBackend::with_response(&raw));
        let draft = generator.draft(&owner(), &params()).await.unwrap();
        assert_eq!(draft.next_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_overlong_message_is_truncated() {
        let long_message = vec!["word"; 400].join(" ");
        let raw = serde_json::json!({
            "outreach_message": long_message,
            "license_summary": "Terms summary.",
            "next_steps": ["Await reply"],
        })
        .to_string();
        let config = OutreachConfig::default();
        let limit = config.max_words;
        let generator =
            OutreachGenerator::new(std::sync::Arc::new(MockBackend::with_response(&raw)), config);
        let draft = generator.draft(&owner(), &params()).await.unwrap();
        assert_eq!(draft.message.split_whitespace().count(), limit);
    }

    #[test]
    fn test_fallback_draft_is_deterministic() {
        let generator = generator(MockBackend::new());
        let a = generator.fallback_draft(&owner(), &params());
        let b = generator.fallback_draft(&owner(), &params());
        assert_eq!(a, b);
        assert!(a.license_summary.contains("worldwide"));
    }

    #[test]
    fn test_prompt_includes_all_license_terms() {
        let generator = generator(MockBackend::new());
        let prompt = generator.user_prompt(&owner(), &params());
        for term in ["breaking_news", "single_use", "worldwide", "standard_rate"] {
            assert!(prompt.contains(term), "missing {term}");
        }
        assert!(prompt.contains("Metro News Desk"));
    }
}
