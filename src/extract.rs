//! Pipeline entry points: images in, classified questions and uploads out.
//!
//! [`ReplyProcessor`] is the pure half of the pipeline (normalise → reshape →
//! validate → serialise) and needs no network. [`Pipeline`] adds the model
//! call, optional uploads and the per-run bookkeeping: progress callbacks,
//! stats, and feeding accepted questions into the caller's
//! [`QuestionStore`].
//!
//! A failing image never aborts a run; its [`ImageReport`] carries the
//! [`ItemError`]. Only configuration problems are returned as `Err`.

use crate::batch::BatchJob;
use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::{ItemError, McqError};
use crate::output::{ImageReport, QuestionOutcome, RunOutput, RunStats};
use crate::pipeline::normalize::{ParseFailure, ResponseNormalizer};
use crate::pipeline::perseus::{to_perseus, HintConfig};
use crate::pipeline::reshape::Reshaper;
use crate::pipeline::upload::{ExerciseId, UploadClient, ENV_UPLOAD_TOKEN, ENV_UPLOAD_URL};
use crate::pipeline::validate::{validate, ValidationRules};
use crate::pipeline::{encode, input, llm};
use crate::question::{QuestionRecord, Validity};
use crate::store::QuestionStore;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Reply processing ─────────────────────────────────────────────────────

/// Turns a raw model reply into classified questions. No I/O.
pub struct ReplyProcessor {
    normalizer: ResponseNormalizer,
    reshaper: Reshaper,
    rules: ValidationRules,
    hints: HintConfig,
}

impl ReplyProcessor {
    pub fn new(
        normalizer: ResponseNormalizer,
        reshaper: Reshaper,
        rules: ValidationRules,
        hints: HintConfig,
    ) -> Self {
        Self {
            normalizer,
            reshaper,
            rules,
            hints,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            ResponseNormalizer::default(),
            Reshaper::from_config(&config.reshape),
            config.validation,
            config.hints.clone(),
        )
    }

    /// Normalise `raw` and classify every record in reply order.
    pub fn process(&self, raw: &str) -> Result<Vec<QuestionOutcome>, ParseFailure> {
        let records = self.normalizer.normalize(raw)?;
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, record)| self.classify(i + 1, record))
            .collect())
    }

    /// Reshape, validate and (if valid) serialise one record.
    pub fn classify(&self, position: usize, record: QuestionRecord) -> QuestionOutcome {
        let (draft, audit) = self.reshaper.reshape(record);

        match validate(&draft.record, &self.rules) {
            Ok(question) => QuestionOutcome {
                position,
                document: Some(to_perseus(&question, &draft.content, &self.hints)),
                record: draft.record,
                content: draft.content,
                audit,
                validity: Validity::Valid,
                rejection: None,
                upload: None,
            },
            Err(rejection) => {
                warn!("Question {} rejected: {}", position, rejection);
                QuestionOutcome {
                    position,
                    record: draft.record,
                    content: draft.content,
                    audit,
                    validity: rejection.validity(),
                    rejection: Some(rejection),
                    document: None,
                    upload: None,
                }
            }
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// One unit of work for [`Pipeline::run_jobs`].
struct Job {
    index: usize,
    input: String,
    row: Option<usize>,
    exercise: Option<ExerciseId>,
    error: Option<ItemError>,
}

/// Full pipeline bound to a provider and, optionally, a CMS.
pub struct Pipeline {
    provider: Arc<dyn LLMProvider>,
    config: ExtractionConfig,
    processor: ReplyProcessor,
    uploader: Option<UploadClient>,
}

impl Pipeline {
    /// Resolve the provider from `config` (see [`resolve_provider`]).
    pub fn new(config: ExtractionConfig) -> Result<Self, McqError> {
        let provider = resolve_provider(&config)?;
        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: ExtractionConfig) -> Self {
        let processor = ReplyProcessor::from_config(&config);
        Self {
            provider,
            config,
            processor,
            uploader: None,
        }
    }

    /// Enable uploads for runs that name an exercise.
    pub fn with_uploader(mut self, uploader: UploadClient) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn processor(&self) -> &ReplyProcessor {
        &self.processor
    }

    /// Extract and classify every image; nothing is uploaded.
    pub async fn extract(&self, inputs: &[String], store: &mut QuestionStore) -> RunOutput {
        let jobs = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| Job {
                index: i + 1,
                input: input.clone(),
                row: None,
                exercise: None,
                error: None,
            })
            .collect();
        self.run_jobs(jobs, false, store).await
    }

    /// Extract every image and upload its accepted questions to `exercise`.
    ///
    /// Fails before any image is read when no uploader is configured.
    pub async fn extract_and_upload(
        &self,
        inputs: &[String],
        exercise: ExerciseId,
        store: &mut QuestionStore,
    ) -> Result<RunOutput, McqError> {
        self.require_uploader()?;
        let jobs = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| Job {
                index: i + 1,
                input: input.clone(),
                row: None,
                exercise: Some(exercise),
                error: None,
            })
            .collect();
        Ok(self.run_jobs(jobs, true, store).await)
    }

    /// Run bound manifest rows.
    ///
    /// With `dry_run` every row is extracted and serialised but nothing is
    /// sent to the CMS, and no uploader is needed.
    pub async fn run_batch(
        &self,
        batch: Vec<BatchJob>,
        dry_run: bool,
        store: &mut QuestionStore,
    ) -> Result<RunOutput, McqError> {
        if !dry_run {
            self.require_uploader()?;
        }
        let jobs = batch
            .into_iter()
            .enumerate()
            .map(|(i, job)| match job {
                BatchJob::Ready {
                    row,
                    exercise,
                    path,
                } => Job {
                    index: i + 1,
                    input: path_input(path),
                    row: Some(row),
                    exercise: Some(exercise),
                    error: None,
                },
                BatchJob::Invalid {
                    row,
                    image_filename,
                    error,
                } => Job {
                    index: i + 1,
                    input: image_filename,
                    row: Some(row),
                    exercise: None,
                    error: Some(error),
                },
            })
            .collect();
        Ok(self.run_jobs(jobs, !dry_run, store).await)
    }

    /// Load, encode, extract and classify one image. Never fails; errors
    /// are recorded in the report.
    pub async fn process_image(&self, index: usize, input_str: &str) -> ImageReport {
        let start = Instant::now();
        let mut report = self.process_image_inner(index, input_str).await;
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    async fn process_image_inner(&self, index: usize, input_str: &str) -> ImageReport {
        let config = &self.config;

        let loaded = match input::load_image(input_str, config.download_timeout_secs).await {
            Ok(loaded) => loaded,
            Err(e) => return ImageReport::failed(index, source_label(input_str), e),
        };
        let mut report = ImageReport::new(index, loaded.name.clone());

        let image = match encode::encode_image(&loaded.bytes, config.max_image_dimension) {
            Ok(image) => image,
            Err(e) => {
                report.error = Some(ItemError::Encode {
                    source_name: loaded.name,
                    detail: e.to_string(),
                });
                return report;
            }
        };

        let extraction =
            match llm::extract_questions(&self.provider, &loaded.name, image, config).await {
                Ok(extraction) => extraction,
                Err(e) => {
                    report.retries = config.max_retries;
                    report.error = Some(e);
                    return report;
                }
            };
        report.input_tokens = extraction.input_tokens;
        report.output_tokens = extraction.output_tokens;
        report.retries = extraction.retries;
        report.raw_reply = Some(extraction.text.clone());

        match self.processor.process(&extraction.text) {
            Ok(questions) => {
                info!(
                    "{}: {} question(s), {} accepted",
                    loaded.name,
                    questions.len(),
                    questions.iter().filter(|q| q.is_accepted()).count()
                );
                report.questions = questions;
            }
            Err(failure) => {
                warn!("{}: {}", loaded.name, failure);
                report.error = Some(ItemError::Parse {
                    source_name: loaded.name,
                    detail: failure.to_string(),
                    raw: failure.raw,
                });
            }
        }
        report
    }

    /// Upload accepted questions of `report`, one at a time in order.
    async fn upload_report(&self, exercise: ExerciseId, report: &mut ImageReport) {
        let Some(uploader) = &self.uploader else {
            return;
        };
        for outcome in report.questions.iter_mut() {
            if let Some(document) = &outcome.document {
                let result = uploader.upload(exercise, document).await;
                debug!(
                    "{} question {} → exercise {}: {}",
                    report.source, outcome.position, exercise, result
                );
                outcome.upload = Some(result);
            }
        }
    }

    async fn run_job(&self, job: Job, total: usize, upload: bool) -> ImageReport {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_image_start(job.index, total, &job.input);
        }

        let mut report = match job.error {
            Some(error) => ImageReport::failed(job.index, job.input.clone(), error),
            None => self.process_image(job.index, &job.input).await,
        };
        report.row = job.row;
        report.exercise = job.exercise;

        if upload && report.is_ok() {
            if let Some(exercise) = job.exercise {
                self.upload_report(exercise, &mut report).await;
            }
        }

        if let Some(cb) = cb {
            match &report.error {
                None => cb.on_image_complete(
                    job.index,
                    total,
                    &report.source,
                    report.accepted().count(),
                    report.rejected().count(),
                ),
                Some(e) => cb.on_image_error(job.index, total, &report.source, &e.to_string()),
            }
        }
        report
    }

    async fn run_jobs(&self, jobs: Vec<Job>, upload: bool, store: &mut QuestionStore) -> RunOutput {
        let total_start = Instant::now();
        let total = jobs.len();
        info!("Processing {} image(s)", total);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total);
        }

        let mut images: Vec<ImageReport> = stream::iter(
            jobs.into_iter().map(|job| self.run_job(job, total, upload)),
        )
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;

        // Sort by input position for consistent output
        images.sort_by_key(|r| r.index);

        for report in &images {
            store.absorb(report);
        }

        let stats = RunStats::from_reports(&images, total_start.elapsed().as_millis() as u64);
        info!(
            "Run complete: {}/{} images, {} accepted, {} rejected, {} uploaded, {}ms",
            stats.processed_images,
            stats.total_images,
            stats.accepted_questions,
            stats.rejected_questions,
            stats.uploaded_questions,
            stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(total, stats.processed_images);
        }

        RunOutput { images, stats }
    }

    fn require_uploader(&self) -> Result<(), McqError> {
        if self.uploader.is_none() {
            return Err(McqError::MissingConfig {
                name: format!("{ENV_UPLOAD_URL}/{ENV_UPLOAD_TOKEN}"),
                hint: "Uploading needs the CMS base URL and token.".into(),
            });
        }
        Ok(())
    }
}

fn path_input(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

/// Name for an input that failed before it could be loaded.
fn source_label(input_str: &str) -> String {
    if input::is_url(input_str) {
        input_str.to_string()
    } else {
        input::display_name(std::path::Path::new(input_str))
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, McqError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        McqError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, else full auto-detection via
///    [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, McqError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    // 3) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // 4) OpenAI key present: gpt-4o unless a model was named
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| McqError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
