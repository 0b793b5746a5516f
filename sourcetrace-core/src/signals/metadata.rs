//! EXIF metadata extraction.
//!
//! Reads embedded camera metadata from raw image bytes via `kamadak-exif`:
//! camera make/model, capture timestamp (normalized to ISO 8601), GPS
//! coordinates (converted from degrees/minutes/seconds rationals to signed
//! decimal degrees), software tag, and exposure parameters.
//!
//! Absence of EXIF is a normal outcome, not an error: screenshots and
//! social-media re-exports routinely have their metadata stripped.

use crate::error::SignalError;
use crate::types::{ExifMetadata, MetadataSignal};
use chrono::NaiveDateTime;
use exif::{Exif, In, Tag, Value};
use std::io::Cursor;
use tracing::debug;

/// Collects the metadata signal from raw image bytes.
#[derive(Debug, Default)]
pub struct MetadataCollector;

impl MetadataCollector {
    pub fn new() -> Self {
        Self
    }

    /// Extract EXIF metadata from image bytes.
    ///
    /// Returns `Ok(MetadataSignal::Absent)` when the image carries no EXIF
    /// segment, and `Err(SignalError::Parse)` only for malformed containers
    /// that cannot be scanned at all.
    pub fn extract(&self, bytes: &[u8]) -> Result<MetadataSignal, SignalError> {
        let mut cursor = Cursor::new(bytes);
        let reader = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(r) => r,
            Err(exif::Error::NotFound(_)) | Err(exif::Error::BlankValue(_)) => {
                return Ok(MetadataSignal::absent(
                    "No EXIF metadata found (common for screenshots and social media images)",
                ));
            }
            Err(e) => {
                return Err(SignalError::Parse {
                    message: format!("EXIF scan failed: {}", e),
                });
            }
        };

        let exif = Self::structure(&reader);
        if exif.is_empty() {
            return Ok(MetadataSignal::absent(
                "EXIF segment present but carried no readable fields",
            ));
        }

        debug!(
            camera_make = exif.camera_make.as_deref().unwrap_or("-"),
            has_gps = exif.gps_latitude.is_some(),
            has_timestamp = exif.timestamp.is_some(),
            "Extracted EXIF metadata"
        );
        Ok(MetadataSignal::Extracted { exif })
    }

    /// Map raw EXIF fields into the standardized record.
    fn structure(reader: &Exif) -> ExifMetadata {
        let mut out = ExifMetadata {
            camera_make: ascii_field(reader, Tag::Make),
            camera_model: ascii_field(reader, Tag::Model),
            software: ascii_field(reader, Tag::Software),
            ..Default::default()
        };

        // DateTimeOriginal is the capture moment; DateTime is a fallback
        // that may reflect a later edit.
        out.timestamp = ascii_field(reader, Tag::DateTimeOriginal)
            .or_else(|| ascii_field(reader, Tag::DateTime))
            .and_then(|raw| parse_exif_datetime(&raw));

        if let Some((lat, lat_ref)) = gps_coordinate(reader, Tag::GPSLatitude, Tag::GPSLatitudeRef)
        {
            out.gps_latitude = Some(if lat_ref == "N" { lat } else { -lat });
            out.gps_latitude_ref = Some(lat_ref);
        }
        if let Some((lon, lon_ref)) =
            gps_coordinate(reader, Tag::GPSLongitude, Tag::GPSLongitudeRef)
        {
            out.gps_longitude = Some(if lon_ref == "E" { lon } else { -lon });
            out.gps_longitude_ref = Some(lon_ref);
        }

        out.orientation = uint_field(reader, Tag::Orientation);
        // Bit 0 of the Flash tag: whether the flash fired.
        out.flash = uint_field(reader, Tag::Flash).map(|v| v & 1 == 1);
        out.focal_length = rational_field(reader, Tag::FocalLength);
        out.iso = uint_field(reader, Tag::PhotographicSensitivity);
        out.f_number = rational_field(reader, Tag::FNumber);
        out.exposure_time = reader
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| f.display_value().to_string());

        out
    }
}

/// Read an ASCII tag as a trimmed string.
fn ascii_field(reader: &Exif, tag: Tag) -> Option<String> {
    let field = reader.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim()
                .trim_end_matches('\0')
                .to_string()
        }),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

/// Read an unsigned integer tag.
fn uint_field(reader: &Exif, tag: Tag) -> Option<u32> {
    reader
        .get_field(tag, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

/// Read the first rational of a tag as f64.
fn rational_field(reader: &Exif, tag: Tag) -> Option<f64> {
    let field = reader.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        _ => None,
    }
}

/// Read a GPS coordinate as decimal degrees plus its hemisphere ref.
///
/// EXIF stores coordinates as three rationals (degrees, minutes, seconds).
fn gps_coordinate(reader: &Exif, coord_tag: Tag, ref_tag: Tag) -> Option<(f64, String)> {
    let coord = reader.get_field(coord_tag, In::PRIMARY)?;
    let hemisphere = ascii_field(reader, ref_tag)?;

    let dms = match &coord.value {
        Value::Rational(v) if v.len() >= 3 => v,
        _ => return None,
    };
    if dms[1].denom == 0 || dms[2].denom == 0 || dms[0].denom == 0 {
        return None;
    }
    let degrees = dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0;
    Some((degrees, hemisphere))
}

/// Normalize an EXIF datetime string ("YYYY:MM:DD HH:MM:SS") to ISO 8601.
fn parse_exif_datetime(raw: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")))
}
