//! The engine facade: owns the injected providers and the single-build
//! guard, embeds whatever the caller did not, and runs the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use pyramid_core::config::PipelineConfig;
use pyramid_core::errors::{PyramidError, PyramidResult};
use pyramid_core::example::Example;
use pyramid_core::models::{BuildStats, PyramidIndex, ReviewReport};
use pyramid_core::traits::{IEmbeddingProvider, IMergeProvider};
use tracing::{info, warn};

use crate::algorithms::SimilarityIndex;
use crate::budget::MergeBudget;
use crate::pipeline::{run_pipeline, BuildOptions};

/// Everything one build produces.
#[derive(Debug)]
pub struct BuildOutput {
    pub pyramid: PyramidIndex,
    pub report: ReviewReport,
    pub stats: BuildStats,
}

/// Similarity-based deduplication engine.
///
/// Embedding and merge providers are injected; the engine never talks to a
/// model directly. One build at a time per engine instance — a second
/// concurrent call returns [`PyramidError::BuildInProgress`] instead of
/// queueing.
pub struct PyramidEngine {
    embedder: Box<dyn IEmbeddingProvider>,
    merger: Box<dyn IMergeProvider>,
    config: PipelineConfig,
    is_running: AtomicBool,
}

impl PyramidEngine {
    /// Create an engine. The configuration is validated on every build, so an
    /// invalid one fails loudly at the first `build` call.
    pub fn new(
        embedder: Box<dyn IEmbeddingProvider>,
        merger: Box<dyn IMergeProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            merger,
            config,
            is_running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the pyramid from a raw example set.
    pub fn build(&self, examples: &[Example], options: BuildOptions) -> PyramidResult<BuildOutput> {
        self.config.validate()?;

        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("build requested while another build is running");
            return Err(PyramidError::BuildInProgress);
        }

        let result = self.build_inner(examples, &options);
        self.is_running.store(false, Ordering::SeqCst);
        result
    }

    fn build_inner(
        &self,
        examples: &[Example],
        options: &BuildOptions,
    ) -> PyramidResult<BuildOutput> {
        info!(
            examples = examples.len(),
            embedder = self.embedder.name(),
            merger = self.merger.name(),
            budget = ?self.config.merge_budget,
            "pyramid build started"
        );

        let embedded = self.embed_missing(examples)?;
        let index = SimilarityIndex::new(&embedded);
        let budget = MergeBudget::new(self.config.merge_budget);

        let (pyramid, report, stats) = run_pipeline(
            &embedded,
            &index,
            self.merger.as_ref(),
            &budget,
            &self.config,
            options,
        )?;

        info!(
            entries = stats.entry_count,
            review_items = report.items.len(),
            "pyramid build finished"
        );

        Ok(BuildOutput {
            pyramid,
            report,
            stats,
        })
    }

    /// Embed every example that arrived without a vector. Examples that
    /// already carry one are passed through untouched, which keeps repeated
    /// incremental runs from re-paying the embedding cost.
    fn embed_missing(&self, examples: &[Example]) -> PyramidResult<Vec<Example>> {
        let mut embedded: Vec<Example> = examples.to_vec();
        let missing: Vec<usize> = embedded
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if missing.is_empty() {
            return Ok(embedded);
        }

        if !self.embedder.is_available() {
            return Err(PyramidError::EmbeddingProviderFailed {
                provider: self.embedder.name().to_string(),
                reason: "provider reports unavailable".to_string(),
            });
        }

        let texts: Vec<String> = missing
            .iter()
            .map(|&i| embedded[i].raw_text.clone())
            .collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != missing.len() {
            return Err(PyramidError::EmbeddingProviderFailed {
                provider: self.embedder.name().to_string(),
                reason: format!(
                    "asked for {} embeddings, received {}",
                    missing.len(),
                    vectors.len()
                ),
            });
        }

        for (&idx, vector) in missing.iter().zip(vectors) {
            embedded[idx].embedding = Some(vector);
        }
        info!(embedded = missing.len(), "embeddings generated");
        Ok(embedded)
    }
}
