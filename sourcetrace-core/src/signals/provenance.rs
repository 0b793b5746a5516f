//! Content-credentials (C2PA) manifest detection.
//!
//! Scans image containers for an embedded provenance manifest: JPEG APP11
//! segments carrying a JUMBF superbox, or a PNG `caBX` chunk. Detection
//! distinguishes the three contract states: no manifest, manifest present
//! but unverifiable in-process, and manifest present with a validity
//! outcome (produced by an external validator; this collector reports
//! `Unknown` since it performs no cryptographic validation).
//!
//! Assertion labels are recovered from the manifest bytes where they appear
//! as plain UTF-8 text inside the CBOR claim, which is enough for the
//! synthesis rubric to reason about what the manifest asserts.

use crate::error::SignalError;
use crate::types::{ManifestRecord, ManifestValidity, ProvenanceSignal};
use regex::bytes::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// JPEG APP11 marker byte (the segment C2PA manifests live in).
const JPEG_APP11: u8 = 0xEB;

/// Collects the provenance signal from raw image bytes.
#[derive(Debug, Default)]
pub struct ProvenanceCollector;

impl ProvenanceCollector {
    pub fn new() -> Self {
        Self
    }

    /// Scan image bytes for an embedded provenance manifest.
    ///
    /// Returns the typed three-state outcome; `Err` only for containers too
    /// malformed to walk at all.
    pub fn check(&self, bytes: &[u8]) -> Result<ProvenanceSignal, SignalError> {
        let manifest_bytes = if bytes.starts_with(&[0xFF, 0xD8]) {
            collect_jpeg_app11(bytes)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            collect_png_cabx(bytes)
        } else if bytes.len() < 4 {
            return Err(SignalError::Parse {
                message: "Media too short to be a supported image container".into(),
            });
        } else {
            // Unsupported container: report honestly rather than guessing.
            return Ok(ProvenanceSignal::error(
                "Unsupported container format for content-credentials scan",
            ));
        };

        let manifest_bytes = match manifest_bytes {
            Some(b) if is_c2pa_manifest(&b) => b,
            _ => {
                return Ok(ProvenanceSignal::not_present());
            }
        };

        let assertions = extract_assertion_labels(&manifest_bytes);
        debug!(
            manifest_len = manifest_bytes.len(),
            assertions = assertions.len(),
            "Found embedded provenance manifest"
        );

        Ok(ProvenanceSignal::Present {
            manifest: ManifestRecord {
                // Cryptographic validation is not performed in-process, so
                // the manifest is present-and-unverifiable from this
                // collector's point of view.
                validity: Some(ManifestValidity::Unknown),
                assertions,
                ..Default::default()
            },
        })
    }
}

/// Concatenate the payloads of all JPEG APP11 segments.
///
/// C2PA manifests larger than one segment are split across consecutive
/// APP11 segments; concatenation restores the JUMBF stream.
fn collect_jpeg_app11(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut payload = Vec::new();
    let mut pos = 2; // skip SOI

    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            break;
        }
        let marker = bytes[pos + 1];
        // Standalone markers without a length field
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > bytes.len() {
            break;
        }
        let segment = &bytes[pos + 4..pos + 2 + len];
        if marker == JPEG_APP11 {
            payload.extend_from_slice(segment);
        }
        // Entropy-coded data follows SOS; no further APP segments appear.
        if marker == 0xDA {
            break;
        }
        pos += 2 + len;
    }

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Concatenate the payloads of all PNG `caBX` chunks.
fn collect_png_cabx(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut payload = Vec::new();
    let mut pos = 8; // skip signature

    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as usize;
        let chunk_type = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        if data_start + len > bytes.len() {
            break;
        }
        if chunk_type == b"caBX" {
            payload.extend_from_slice(&bytes[data_start..data_start + len]);
        }
        if chunk_type == b"IEND" {
            break;
        }
        pos = data_start + len + 4; // skip CRC
    }

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Whether the collected payload looks like a C2PA JUMBF stream.
fn is_c2pa_manifest(payload: &[u8]) -> bool {
    contains(payload, b"jumb") && contains(payload, b"c2pa")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Pull assertion labels out of the manifest bytes.
///
/// Labels like `c2pa.actions` or `cawg.identity` are stored as plain UTF-8
/// text strings inside the CBOR claim, so a byte-level pattern recovers
/// them without a full CBOR parser.
fn extract_assertion_labels(manifest: &[u8]) -> Vec<String> {
    static LABEL_RE: OnceLock<Regex> = OnceLock::new();
    let re = LABEL_RE
        .get_or_init(|| Regex::new(r"(?:c2pa|cawg)\.[a-z0-9_]+(?:\.[a-z0-9_]+)*").unwrap());

    let mut labels: Vec<String> = Vec::new();
    for m in re.find_iter(manifest) {
        let label = String::from_utf8_lossy(m.as_bytes()).to_string();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}
