//! Signal collectors: the three independent evidence extractors.
//!
//! - `metadata`: embedded EXIF metadata (camera, timestamp, GPS, software).
//! - `provenance`: embedded content-credentials manifest detection.
//! - `websearch`: reverse image search for earlier copies on the web.
//!
//! Collectors are mutually independent and share no state. Each returns
//! either a populated signal record or a typed absence/error marker; a
//! collector fault is a `SignalError` that the aggregator converts into the
//! corresponding marker. Nothing here can abort the pipeline.

pub mod metadata;
pub mod provenance;
pub mod websearch;

pub use metadata::MetadataCollector;
pub use provenance::ProvenanceCollector;
pub use websearch::ReverseSearchCollector;
