//! Triage pipeline orchestrator.
//!
//! Owns the collectors, the synthesis engine, and the outreach generator,
//! and runs an analysis request end to end: load media, collect the three
//! signals concurrently, aggregate them into a bundle, synthesize a verdict.
//! Signal failures degrade to typed markers; only media loading errors and
//! caller contract violations surface to the caller.

use crate::aggregator::aggregate;
use crate::backend::create_backend;
use crate::config::TriageConfig;
use crate::error::{Result, SignalError, SourceTraceError};
use crate::outreach::OutreachGenerator;
use crate::signals::{MetadataCollector, ProvenanceCollector, ReverseSearchCollector};
use crate::synthesis::SynthesisEngine;
use crate::types::{
    AnalysisInput, AnalysisReport, LicenseParams, OutreachReport, OwnerInfo, WebMatchSignal,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// The end-to-end provenance triage pipeline.
pub struct TriagePipeline {
    engine: SynthesisEngine,
    generator: OutreachGenerator,
    metadata: MetadataCollector,
    provenance: ProvenanceCollector,
    search: ReverseSearchCollector,
    fetch_client: Option<reqwest::Client>,
    max_bytes: u64,
}

impl TriagePipeline {
    /// Build a pipeline from configuration.
    ///
    /// Fails only when the reasoning backend cannot be constructed, most
    /// commonly because the configured API key variable is unset.
    pub fn new(config: &TriageConfig) -> Result<Self> {
        let backend = create_backend(&config.backend)?;
        let fetch_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.media.fetch_timeout_secs))
            .user_agent(&config.search.user_agent)
            .build()
            .ok();
        Ok(Self {
            engine: SynthesisEngine::new(backend.clone(), config.synthesis.clone()),
            generator: OutreachGenerator::new(backend, config.outreach.clone()),
            metadata: MetadataCollector::new(),
            provenance: ProvenanceCollector::new(),
            search: ReverseSearchCollector::new(&config.search),
            fetch_client,
            max_bytes: config.media.max_bytes,
        })
    }

    /// Build a pipeline around an existing backend.
    ///
    /// Used when the caller constructed the backend itself, including tests
    /// that inject a mock.
    pub fn with_backend(
        backend: std::sync::Arc<dyn crate::backend::ReasoningBackend>,
        config: &TriageConfig,
    ) -> Self {
        let fetch_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.media.fetch_timeout_secs))
            .user_agent(&config.search.user_agent)
            .build()
            .ok();
        Self {
            engine: SynthesisEngine::new(backend.clone(), config.synthesis.clone()),
            generator: OutreachGenerator::new(backend, config.outreach.clone()),
            metadata: MetadataCollector::new(),
            provenance: ProvenanceCollector::new(),
            search: ReverseSearchCollector::new(&config.search),
            fetch_client,
            max_bytes: config.media.max_bytes,
        }
    }

    /// Run a full analysis: collect signals, aggregate, synthesize.
    ///
    /// Fails only when the media itself cannot be loaded. Everything past
    /// media loading degrades instead of failing.
    #[instrument(skip(self, input), fields(input = %describe_input(&input)))]
    pub async fn analyze(&self, input: AnalysisInput) -> Result<AnalysisReport> {
        let start = Instant::now();
        let bytes = self.load_media(&input).await?;
        debug!(media_bytes = bytes.len(), "Media loaded");

        let collect_started = Instant::now();
        let (metadata, provenance, web_matches) = tokio::join!(
            async { self.metadata.extract(&bytes) },
            async { self.provenance.check(&bytes) },
            self.web_signal(&input),
        );
        info!(
            stage = "collecting",
            elapsed_ms = collect_started.elapsed().as_millis() as u64,
            "Signal collection complete"
        );

        let aggregate_started = Instant::now();
        let bundle = aggregate(metadata, provenance, Ok(web_matches));
        info!(
            stage = "aggregating",
            elapsed_ms = aggregate_started.elapsed().as_millis() as u64,
            "Signals aggregated"
        );

        let synthesis_started = Instant::now();
        let verdict = self.engine.synthesize(&bundle).await;
        info!(
            stage = "synthesizing",
            elapsed_ms = synthesis_started.elapsed().as_millis() as u64,
            "Verdict synthesized"
        );

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            stage = "complete",
            confidence = verdict.confidence,
            recommendation = %verdict.recommendation,
            elapsed_ms,
            "Analysis complete"
        );
        Ok(AnalysisReport {
            verdict,
            signals: bundle,
            elapsed_ms,
        })
    }

    /// Draft a rights-clearance message for a content owner.
    ///
    /// Independent of analysis: callers may run it with owner details found
    /// by other means. Invalid owner input surfaces; backend failures
    /// degrade to a template draft.
    #[instrument(skip(self, owner, params), fields(handle = owner.handle.as_str()))]
    pub async fn outreach(
        &self,
        owner: &OwnerInfo,
        params: &LicenseParams,
    ) -> Result<OutreachReport> {
        let start = Instant::now();
        let outreach = self.generator.draft(owner, params).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(elapsed_ms, "Outreach draft complete");
        Ok(OutreachReport {
            outreach,
            elapsed_ms,
        })
    }

    /// Reverse search runs only for URL inputs; a local file has no public
    /// address the search engine can fetch.
    async fn web_signal(&self, input: &AnalysisInput) -> WebMatchSignal {
        match input.url() {
            Some(url) => self.search.search(url).await,
            None => WebMatchSignal::unavailable(
                "reverse search requires a public URL; input was a local file",
                None,
            ),
        }
    }

    async fn load_media(&self, input: &AnalysisInput) -> Result<Vec<u8>> {
        match input {
            AnalysisInput::File(path) => self.read_file(path).await,
            AnalysisInput::Url(url) => self.download(url).await,
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| signal_read(path, e.to_string()))?;
        if meta.len() > self.max_bytes {
            return Err(signal_read(
                path,
                format!("media exceeds the {} byte limit", self.max_bytes),
            ));
        }
        tokio::fs::read(path)
            .await
            .map_err(|e| signal_read(path, e.to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let client = self
            .fetch_client
            .as_ref()
            .ok_or_else(|| network_error("HTTP client unavailable"))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(&e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(&format!(
                "media download returned HTTP {}",
                response.status()
            )));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(network_error(&format!(
                    "media exceeds the {} byte limit",
                    self.max_bytes
                )));
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| network_error(&e.to_string()))?;
        // content_length is advisory; re-check the actual body.
        if bytes.len() as u64 > self.max_bytes {
            return Err(network_error(&format!(
                "media exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        Ok(bytes.to_vec())
    }
}

fn signal_read(path: &Path, message: String) -> SourceTraceError {
    SourceTraceError::Signal(SignalError::Read {
        path: path.to_path_buf(),
        message,
    })
}

fn network_error(message: &str) -> SourceTraceError {
    SourceTraceError::Signal(SignalError::Network {
        message: message.to_string(),
    })
}

fn describe_input(input: &AnalysisInput) -> String {
    match input {
        AnalysisInput::File(path) => path.display().to_string(),
        AnalysisInput::Url(url) => url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;

    fn pipeline() -> TriagePipeline {
        TriagePipeline::with_backend(
            std::sync::Arc::new(crate::backend::MockBackend::failing()),
            &TriageConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_read_error() {
        let result = pipeline()
            .analyze(AnalysisInput::File("/nonexistent/image.jpg".into()))
            .await;
        assert!(matches!(
            result,
            Err(SourceTraceError::Signal(SignalError::Read { .. }))
        ));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.jpg");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let mut p = pipeline();
        p.max_bytes = 16;
        let result = p.analyze(AnalysisInput::File(path)).await;
        assert!(matches!(
            result,
            Err(SourceTraceError::Signal(SignalError::Read { .. }))
        ));
    }

    #[tokio::test]
    async fn test_analyze_logs_per_stage_timing() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone)]
        struct Capture(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl<'a> MakeWriter<'a> for Capture {
            type Writer = Capture;
            fn make_writer(&'a self) -> Capture {
                self.clone()
            }
        }

        let sink = Capture(Arc::new(Mutex::new(Vec::new())));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        pipeline().analyze(AnalysisInput::File(path)).await.unwrap();

        let logs = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        for stage in ["collecting", "aggregating", "synthesizing", "complete"] {
            assert!(logs.contains(stage), "missing stage marker: {stage}");
        }
        assert!(logs.contains("elapsed_ms"));
    }

    #[tokio::test]
    async fn test_file_input_marks_web_search_unavailable() {
        let signal = pipeline()
            .web_signal(&AnalysisInput::File("photo.jpg".into()))
            .await;
        match signal {
            WebMatchSignal::Unavailable { search_url, .. } => assert!(search_url.is_none()),
            other => panic!("expected unavailable marker, got {other:?}"),
        }
    }
}
