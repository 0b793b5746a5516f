//! Fundamental types for the triage pipeline.
//!
//! The central contract is [`SignalBundle`]: every signal field is either a
//! populated record or a typed absence marker carrying a human-readable
//! reason. A bundle never has a silently missing key, regardless of which
//! collectors failed.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Embedded camera metadata extracted from the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    /// Capture timestamp in ISO 8601 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Signed decimal degrees (negative = south).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<f64>,
    /// Signed decimal degrees (negative = west).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude_ref: Option<String>,
    /// Software/firmware tag, often revealing post-capture editing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
}

impl ExifMetadata {
    /// Whether any field beyond the bare struct was populated.
    pub fn is_empty(&self) -> bool {
        *self == ExifMetadata::default()
    }
}

/// The metadata signal: extracted EXIF or a typed absence marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetadataSignal {
    Extracted {
        #[serde(flatten)]
        exif: ExifMetadata,
    },
    Absent {
        reason: String,
    },
}

impl MetadataSignal {
    pub fn absent(reason: impl Into<String>) -> Self {
        MetadataSignal::Absent {
            reason: reason.into(),
        }
    }
}

/// Validation outcome for an embedded provenance manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestValidity {
    /// Manifest present and its validation checks passed.
    Validated,
    /// Manifest present but validation failed.
    Failed,
    /// Manifest present but could not be verified in-process.
    Unknown,
}

/// A provenance (content credentials) manifest record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub validity: Option<ManifestValidity>,
    /// Tool that generated the credentials (e.g. "Adobe Photoshop").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Assertion labels made by the manifest (e.g. "c2pa.actions").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_issues: Option<String>,
}

impl Default for ManifestValidity {
    fn default() -> Self {
        ManifestValidity::Unknown
    }
}

/// The provenance signal: distinguishes not-present, present (with a
/// validity state), and collector error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvenanceSignal {
    NotPresent {
        note: String,
    },
    Present {
        #[serde(flatten)]
        manifest: ManifestRecord,
    },
    Error {
        reason: String,
    },
}

impl ProvenanceSignal {
    pub fn not_present() -> Self {
        ProvenanceSignal::NotPresent {
            note: "No content credentials found (most UGC lacks a provenance manifest)".into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ProvenanceSignal::Error {
            reason: reason.into(),
        }
    }
}

/// A single reverse-search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebMatch {
    pub url: String,
    pub domain: String,
    pub title: String,
}

/// The reverse-search signal.
///
/// `Unavailable` carries the manual search URL when automated search
/// failed but a human can still run the query in a browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebMatchSignal {
    Found {
        match_count: usize,
        earliest_match: WebMatch,
        matches: Vec<WebMatch>,
        search_url: String,
    },
    NoMatches {
        search_url: String,
    },
    Unavailable {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        search_url: Option<String>,
    },
}

impl WebMatchSignal {
    pub fn unavailable(reason: impl Into<String>, search_url: Option<String>) -> Self {
        WebMatchSignal::Unavailable {
            reason: reason.into(),
            search_url,
        }
    }
}

/// Aggregated input to the synthesis engine.
///
/// Constructed fresh per analysis request, consumed once, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub metadata: MetadataSignal,
    pub provenance: ProvenanceSignal,
    pub web_matches: WebMatchSignal,
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Triage recommendation derived from the confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    ManualReview,
    HighRisk,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "proceed",
            Recommendation::ManualReview => "manual_review",
            Recommendation::HighRisk => "high_risk",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probable owner of the content, when identifiable from the signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbableOwner {
    pub handle: String,
    pub platform: String,
    /// Confidence in the owner identification, 0-100.
    pub confidence: u8,
    pub contact_method: String,
}

/// The synthesized trust judgment for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Authenticity confidence, 0-100. Authoritative for the recommendation.
    pub confidence: u8,
    /// Short plain-language justification.
    pub summary: String,
    /// Distinct concern strings, ordered by severity. May be empty.
    pub red_flags: Vec<String>,
    pub recommendation: Recommendation,
    /// Longer explanation of how the score was reached.
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probable_owner: Option<ProbableOwner>,
}

// ---------------------------------------------------------------------------
// Outreach
// ---------------------------------------------------------------------------

/// Descriptor for the content owner being contacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub handle: String,
    pub platform: String,
}

impl OwnerInfo {
    /// Check the caller contract: both fields must be non-empty.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.handle.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "owner.handle".into(),
            });
        }
        if self.platform.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "owner.platform".into(),
            });
        }
        Ok(())
    }
}

macro_rules! license_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s),+
                }
            }

            /// All recognized wire values, for validation error messages.
            pub fn allowed() -> &'static str {
                concat_allowed!($($s),+)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($s => Ok($name::$variant),)+
                    other => Err(ValidationError::UnknownOption {
                        field: $field.into(),
                        value: other.into(),
                        allowed: Self::allowed().into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

macro_rules! concat_allowed {
    ($first:literal $(, $rest:literal)*) => {
        concat!($first $(, ", ", $rest)*)
    };
}

license_enum!(
    /// Editorial context the license is requested for.
    UseCase, "use_case", {
        BreakingNews => "breaking_news",
        FeatureStory => "feature_story",
        Documentary => "documentary",
        SocialMedia => "social_media",
        Archive => "archive",
    }
);

license_enum!(
    /// How many times the content may be used.
    LicenseScope, "scope", {
        SingleUse => "single_use",
        MultipleUse => "multiple_use",
        Exclusive => "exclusive",
    }
);

license_enum!(
    /// Geographic reach of the license.
    Territory, "territory", {
        Worldwide => "worldwide",
        Regional => "regional",
        Local => "local",
    }
);

license_enum!(
    /// Compensation offered to the owner.
    Compensation, "compensation", {
        StandardRate => "standard_rate",
        Premium => "premium",
        Negotiable => "negotiable",
        Attribution => "attribution",
    }
);

/// Licensing parameters for an outreach request. All four options are
/// closed enums; unrecognized values are rejected, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseParams {
    pub use_case: UseCase,
    pub scope: LicenseScope,
    pub territory: Territory,
    pub compensation: Compensation,
}

impl LicenseParams {
    /// Build from raw wire strings, surfacing a [`ValidationError`] for any
    /// unrecognized option. For callers that hold untyped input (CLI flags,
    /// HTTP form fields) rather than already-deserialized enums.
    pub fn from_raw(
        use_case: &str,
        scope: &str,
        territory: &str,
        compensation: &str,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(LicenseParams {
            use_case: use_case.parse()?,
            scope: scope.parse()?,
            territory: territory.parse()?,
            compensation: compensation.parse()?,
        })
    }
}

/// A drafted rights-clearance message.
///
/// All three fields are always populated; on generation failure a template
/// fallback fills them so downstream consumers never see a partial object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachDraft {
    pub message: String,
    pub license_summary: String,
    pub next_steps: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline input/output
// ---------------------------------------------------------------------------

/// Input to an analysis request: a local file or a remote URL.
///
/// URL inputs enable the reverse-search collector; file inputs yield its
/// typed unavailable marker since the search engine needs a public URL.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisInput {
    File(PathBuf),
    Url(String),
}

impl AnalysisInput {
    pub fn url(&self) -> Option<&str> {
        match self {
            AnalysisInput::Url(u) => Some(u),
            AnalysisInput::File(_) => None,
        }
    }
}

/// Result of one analysis request, returned to the caller as a read-only
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub verdict: Verdict,
    pub signals: SignalBundle,
    pub elapsed_ms: u64,
}

/// Result of one outreach request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachReport {
    pub outreach: OutreachDraft,
    pub elapsed_ms: u64,
}
