//! Signal aggregation: collector outputs -> one well-formed bundle.
//!
//! Pure shape normalization, no judgment. Each collector result is either a
//! signal value or a `SignalError`; errors become the signal's typed
//! absence/error marker so the bundle always has all three keys populated,
//! for every combination of collector failures.

use crate::error::SignalError;
use crate::types::{MetadataSignal, ProvenanceSignal, SignalBundle, WebMatchSignal};
use tracing::warn;

/// Merge the three collector outcomes into a `SignalBundle`.
pub fn aggregate(
    metadata: Result<MetadataSignal, SignalError>,
    provenance: Result<ProvenanceSignal, SignalError>,
    web_matches: Result<WebMatchSignal, SignalError>,
) -> SignalBundle {
    let metadata = metadata.unwrap_or_else(|e| {
        warn!(signal = "metadata", error = %e, "Collector failed; recording typed absence");
        MetadataSignal::absent(e.to_string())
    });
    let provenance = provenance.unwrap_or_else(|e| {
        warn!(signal = "provenance", error = %e, "Collector failed; recording typed error");
        ProvenanceSignal::error(e.to_string())
    });
    let web_matches = web_matches.unwrap_or_else(|e| {
        warn!(signal = "web_matches", error = %e, "Collector failed; recording typed absence");
        WebMatchSignal::unavailable(e.to_string(), None)
    });

    SignalBundle {
        metadata,
        provenance,
        web_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExifMetadata, ManifestRecord, ManifestValidity, WebMatch};

    fn ok_metadata() -> Result<MetadataSignal, SignalError> {
        Ok(MetadataSignal::Extracted {
            exif: ExifMetadata {
                camera_make: Some("Apple".into()),
                ..Default::default()
            },
        })
    }

    fn ok_provenance() -> Result<ProvenanceSignal, SignalError> {
        Ok(ProvenanceSignal::Present {
            manifest: ManifestRecord {
                validity: Some(ManifestValidity::Validated),
                ..Default::default()
            },
        })
    }

    fn ok_search() -> Result<WebMatchSignal, SignalError> {
        Ok(WebMatchSignal::Found {
            match_count: 1,
            earliest_match: WebMatch {
                url: "https://example.com".into(),
                domain: "example.com".into(),
                title: "t".into(),
            },
            matches: vec![WebMatch {
                url: "https://example.com".into(),
                domain: "example.com".into(),
                title: "t".into(),
            }],
            search_url: "https://google.com/searchbyimage?x".into(),
        })
    }

    fn err() -> SignalError {
        SignalError::Network {
            message: "connection reset".into(),
        }
    }

    #[test]
    fn test_all_success() {
        let bundle = aggregate(ok_metadata(), ok_provenance(), ok_search());
        assert!(matches!(bundle.metadata, MetadataSignal::Extracted { .. }));
        assert!(matches!(bundle.provenance, ProvenanceSignal::Present { .. }));
        assert!(matches!(bundle.web_matches, WebMatchSignal::Found { .. }));
    }

    #[test]
    fn test_all_failed_still_yields_complete_bundle() {
        let bundle = aggregate(Err(err()), Err(err()), Err(err()));
        match &bundle.metadata {
            MetadataSignal::Absent { reason } => assert!(reason.contains("connection reset")),
            other => panic!("Expected Absent, got {:?}", other),
        }
        assert!(matches!(bundle.provenance, ProvenanceSignal::Error { .. }));
        assert!(matches!(
            bundle.web_matches,
            WebMatchSignal::Unavailable { .. }
        ));
    }

    #[test]
    fn test_single_failure_leaves_others_intact() {
        let bundle = aggregate(ok_metadata(), Err(err()), ok_search());
        assert!(matches!(bundle.metadata, MetadataSignal::Extracted { .. }));
        assert!(matches!(bundle.provenance, ProvenanceSignal::Error { .. }));
        assert!(matches!(bundle.web_matches, WebMatchSignal::Found { .. }));
    }

    #[test]
    fn test_bundle_serializes_all_three_keys_after_total_failure() {
        let bundle = aggregate(Err(err()), Err(err()), Err(err()));
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("metadata").is_some());
        assert!(json.get("provenance").is_some());
        assert!(json.get("web_matches").is_some());
    }
}
