//! CLI binary for edgequake-mcq.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `UploadConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_mcq::batch::images_in_dir;
use edgequake_mcq::store::write_atomic;
use edgequake_mcq::{
    ExerciseId, ExtractionConfig, ExtractionProgressCallback, ImageReport, Manifest, Pipeline,
    ProgressCallback, QuestionStore, RunOutput, UploadClient, UploadConfig, ValidationRules,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// image. Works when images complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_images: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_images as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_images} image(s)…"))
        ));
    }

    fn on_image_start(&self, index: usize, _total: usize, source: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(source.to_string());
    }

    fn on_image_complete(
        &self,
        index: usize,
        total: usize,
        source: &str,
        accepted: usize,
        rejected: usize,
    ) {
        let secs = self.elapsed_secs(index);
        let counts = if rejected == 0 {
            format!("{accepted} accepted")
        } else {
            format!("{accepted} accepted, {} rejected", yellow(&rejected.to_string()))
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<24} {}  {}",
            green("✓"),
            index,
            total,
            source,
            counts,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, source: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<24} {}  {}",
            red("✗"),
            index,
            total,
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_images: usize, succeeded: usize) {
        let failed = total_images.saturating_sub(succeeded);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} image(s) processed",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) processed  ({} failed)",
                if failed == total_images { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show the questions found in an image
  mcq2perseus extract page.png

  # Accept only 4-option questions, save JSON and a Markdown table
  mcq2perseus extract --options 4 --json-out qs.json --table-out qs.md page.png

  # Perseus documents, one file per accepted question
  mcq2perseus convert --out-dir perseus/ page-1.png page-2.jpg

  # Upload every accepted question to exercise 42
  mcq2perseus upload --exercise 42 page.png

  # Manifest-driven uploads (columns: exercise_id,image_filename)
  mcq2perseus batch --manifest rows.csv --images scans/

  # Rewrite "which of the above" statement questions, answer "1, 2 and 3"
  mcq2perseus convert --which-of-the-above --which-of-the-above-answer 3 page.png

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID (default gpt-4o)
  MCQ_UPLOAD_URL          CMS base URL (upload, batch)
  MCQ_UPLOAD_TOKEN        CMS bearer token (upload, batch)
"#;

/// Extract multiple-choice questions from images into Perseus quiz items.
#[derive(Parser, Debug)]
#[command(
    name = "mcq2perseus",
    version,
    about = "Extract multiple-choice questions from images into Perseus quiz items",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and validate questions; print them as JSON or a table.
    Extract {
        /// Image paths or HTTP/HTTPS URLs.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Require exactly N options (default: accept 2–8).
        #[arg(long)]
        options: Option<usize>,

        /// Print a Markdown table instead of JSON.
        #[arg(long)]
        table: bool,

        /// Also write the accepted records as JSON to this file.
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Also write the Markdown table to this file.
        #[arg(long)]
        table_out: Option<PathBuf>,
    },

    /// Run the full pipeline and emit Perseus documents.
    Convert {
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Write one `<index>-<image>-q<N>.json` per accepted question
        /// here instead of printing a JSON array.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Run the full pipeline and upload accepted questions to one exercise.
    Upload {
        /// Target exercise id (positive integer).
        #[arg(long)]
        exercise: String,

        #[arg(required = true)]
        inputs: Vec<String>,

        #[command(flatten)]
        upload: UploadArgs,
    },

    /// Upload images listed in a CSV manifest to their exercises.
    Batch {
        /// CSV with `exercise_id` and `image_filename` columns.
        #[arg(long)]
        manifest: PathBuf,

        /// Directory holding the images named in the manifest.
        #[arg(long)]
        images: PathBuf,

        /// Extract and serialise only; nothing is uploaded.
        #[arg(long)]
        dry_run: bool,

        /// Write the full per-row report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        upload: UploadArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// LLM model ID (default gpt-4o).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Text file with a custom extraction prompt.
    #[arg(long, global = true, env = "MCQ_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Text file with hints, separated by blank lines.
    #[arg(long, global = true, env = "MCQ_HINTS_FILE")]
    hints_file: Option<PathBuf>,

    /// Retries per image on model failure.
    #[arg(long, global = true, env = "MCQ_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "MCQ_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image.
    #[arg(long, global = true, env = "MCQ_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// Per-call model timeout in seconds.
    #[arg(long, global = true, env = "MCQ_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout for URL inputs in seconds.
    #[arg(long, global = true, env = "MCQ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Longest image edge sent to the model, in pixels.
    #[arg(long, global = true, env = "MCQ_MAX_DIMENSION", default_value_t = 2000)]
    max_dimension: u32,

    /// Images processed at once.
    #[arg(short, long, global = true, env = "MCQ_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Rewrite "which of the above" questions with three statement options.
    #[arg(long, global = true)]
    which_of_the_above: bool,

    /// Correct combinator (0–3) for rewritten questions.
    #[arg(long, global = true, requires = "which_of_the_above",
          value_parser = clap::value_parser!(u8).range(0..=3))]
    which_of_the_above_answer: Option<u8>,

    /// Keep numbered statements as written instead of forcing line breaks.
    #[arg(long, global = true)]
    no_reflow: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "MCQ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MCQ_VERBOSE")]
    verbose: bool,

    /// Suppress progress and totals. Failed images, rejected questions
    /// and failed uploads are still reported.
    #[arg(short, long, global = true, env = "MCQ_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// CMS base URL.
    #[arg(long, env = "MCQ_UPLOAD_URL")]
    upload_url: Option<String>,

    /// CMS bearer token.
    #[arg(long, env = "MCQ_UPLOAD_TOKEN", hide_env_values = true)]
    upload_token: Option<String>,

    /// Per-request upload timeout in seconds.
    #[arg(long, env = "MCQ_UPLOAD_TIMEOUT", default_value_t = 30)]
    upload_timeout: u64,
}

impl UploadArgs {
    fn client(&self) -> Result<UploadClient> {
        let config = UploadConfig::new(
            self.upload_url.clone().unwrap_or_default(),
            self.upload_token.clone().unwrap_or_default(),
        )?
        .timeout_secs(self.upload_timeout);
        Ok(UploadClient::new(config)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !common.quiet && !common.no_progress;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let mut store = QuestionStore::new();

    match &cli.command {
        Command::Extract {
            inputs,
            options,
            table,
            json_out,
            table_out,
        } => {
            let rules = options
                .map(ValidationRules::exactly)
                .unwrap_or_else(ValidationRules::display);
            let config = build_config(common, rules, progress_cb).await?;
            let pipeline = Pipeline::new(config).context("Failed to set up the model provider")?;

            let run = pipeline.extract(inputs, &mut store).await;
            print_summary(&run, common.quiet);

            if *table {
                println!("{}", store.to_markdown());
            } else {
                println!("{}", store.to_json().context("Failed to serialise records")?);
            }
            if let Some(path) = json_out {
                store.write_json(path).await.context("Failed to write JSON")?;
            }
            if let Some(path) = table_out {
                store
                    .write_markdown(path)
                    .await
                    .context("Failed to write table")?;
            }
            ensure_progress(&run)
        }

        Command::Convert { inputs, out_dir } => {
            let config = build_config(common, ValidationRules::submission(), progress_cb).await?;
            let pipeline = Pipeline::new(config).context("Failed to set up the model provider")?;

            let run = pipeline.extract(inputs, &mut store).await;
            print_summary(&run, common.quiet);

            match out_dir {
                Some(dir) => {
                    let written = write_documents(&run, dir).await?;
                    if !common.quiet {
                        eprintln!(
                            "{} {} document(s) → {}",
                            green("✔"),
                            written,
                            bold(&dir.display().to_string())
                        );
                    }
                }
                None => {
                    let documents: Vec<_> = run
                        .images
                        .iter()
                        .flat_map(|r| r.questions.iter())
                        .filter_map(|q| q.document.as_ref())
                        .collect();
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&documents)
                            .context("Failed to serialise documents")?
                    );
                }
            }
            ensure_progress(&run)
        }

        Command::Upload {
            exercise,
            inputs,
            upload,
        } => {
            // Validate everything that can fail before the first model call.
            let exercise: ExerciseId = exercise.parse()?;
            let client = upload.client().context("Upload is not configured")?;
            let config = build_config(common, ValidationRules::submission(), progress_cb).await?;
            let pipeline = Pipeline::new(config)
                .context("Failed to set up the model provider")?
                .with_uploader(client);

            let run = pipeline
                .extract_and_upload(inputs, exercise, &mut store)
                .await?;
            print_summary(&run, common.quiet);
            ensure_progress(&run)?;
            ensure_uploaded(&run)
        }

        Command::Batch {
            manifest,
            images,
            dry_run,
            report,
            upload,
        } => {
            let manifest = Manifest::from_path(manifest)?;
            let available = images_in_dir(images)
                .await
                .with_context(|| format!("Failed to list images in {}", images.display()))?;
            let jobs = manifest.bind(&available);

            let config = build_config(common, ValidationRules::submission(), progress_cb).await?;
            let mut pipeline =
                Pipeline::new(config).context("Failed to set up the model provider")?;
            if !dry_run {
                let client = upload.client().context("Upload is not configured")?;
                pipeline = pipeline.with_uploader(client);
            }

            let run = pipeline.run_batch(jobs, *dry_run, &mut store).await?;
            print_summary(&run, common.quiet);

            if let Some(path) = report {
                let json =
                    serde_json::to_string_pretty(&run).context("Failed to serialise report")?;
                write_atomic(path, json.as_bytes())
                    .await
                    .context("Failed to write report")?;
            }
            ensure_uploaded(&run)
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    common: &CommonArgs,
    rules: ValidationRules,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .validation(rules)
        .max_retries(common.max_retries)
        .temperature(common.temperature)
        .max_tokens(common.max_tokens)
        .api_timeout_secs(common.api_timeout)
        .download_timeout_secs(common.download_timeout)
        .max_image_dimension(common.max_dimension)
        .concurrency(common.concurrency)
        .numbered_reflow(!common.no_reflow)
        .which_of_the_above(common.which_of_the_above);

    if let Some(answer) = common.which_of_the_above_answer {
        builder = builder.which_of_the_above_answer(usize::from(answer));
    }
    if let Some(ref model) = common.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = common.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref path) = common.hints_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read hints from {:?}", path))?;
        builder = builder.hints(parse_hints(&text));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Hints are paragraphs separated by blank lines.
fn parse_hints(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<index>-<image-stem>-q<N>.json`. The input index keeps names unique
/// when two inputs share a stem (`page.png`, `page.jpg`, `a/page.png`).
fn document_file_name(report: &ImageReport, position: usize) -> String {
    let stem = Path::new(&report.source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{:03}-{stem}-q{position}.json", report.index)
}

/// Write each accepted document to `<dir>/` named by [`document_file_name`].
async fn write_documents(run: &RunOutput, dir: &Path) -> Result<usize> {
    let mut written = 0;
    for report in &run.images {
        for question in &report.questions {
            let Some(document) = &question.document else {
                continue;
            };
            let path = dir.join(document_file_name(report, question.position));
            let json =
                serde_json::to_string_pretty(document).context("Failed to serialise document")?;
            write_atomic(&path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += 1;
        }
    }
    Ok(written)
}

/// Per-image details the progress bar does not show: rejections, upload
/// failures and unparseable replies. `quiet` drops only the totals line.
fn print_summary(run: &RunOutput, quiet: bool) {
    for line in run.images.iter().flat_map(report_lines) {
        eprintln!("{line}");
    }
    if quiet {
        return;
    }
    let s = &run.stats;
    eprintln!(
        "{} {} accepted, {} rejected, {} uploaded{}  {}",
        cyan("◆"),
        bold(&s.accepted_questions.to_string()),
        s.rejected_questions,
        s.uploaded_questions,
        if s.upload_failures > 0 {
            format!(", {}", red(&format!("{} upload(s) failed", s.upload_failures)))
        } else {
            String::new()
        },
        dim(&format!(
            "{} tokens in / {} out, {}ms",
            s.total_input_tokens, s.total_output_tokens, s.total_duration_ms
        )),
    );
}

fn report_lines(report: &ImageReport) -> Vec<String> {
    let label = match report.row {
        Some(row) => format!("row {row} ({})", report.source),
        None => report.source.clone(),
    };
    let mut lines = Vec::new();
    if let Some(error) = &report.error {
        lines.push(format!("{} {}: {}", red("✗"), label, error));
        if let Some(raw) = error.raw_reply() {
            lines.push(format!("{}\n{}", dim("  raw reply:"), raw));
        }
        return lines;
    }
    for q in &report.questions {
        if let Some(rejection) = &q.rejection {
            lines.push(format!(
                "{} {} question {}: {}",
                yellow("!"),
                label,
                q.position,
                rejection
            ));
        }
        if let Some(upload) = q.upload.as_ref().filter(|u| !u.is_success()) {
            lines.push(format!("{} {} question {}: {}", red("✗"), label, q.position, upload));
        }
    }
    lines
}

fn ensure_progress(run: &RunOutput) -> Result<()> {
    if run.stats.total_images > 0 && run.stats.processed_images == 0 {
        anyhow::bail!("None of the {} image(s) could be processed", run.stats.total_images);
    }
    Ok(())
}

fn ensure_uploaded(run: &RunOutput) -> Result<()> {
    let failed_rows = run.stats.failed_images;
    let failed_uploads = run.stats.upload_failures;
    if failed_rows > 0 || failed_uploads > 0 {
        anyhow::bail!(
            "{} image(s) failed and {} upload(s) failed",
            failed_rows,
            failed_uploads
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_mcq::{ItemError, ReplyProcessor, UploadOutcome};

    #[test]
    fn hints_split_on_blank_lines() {
        let hints = parse_hints("First hint\nstill first.\n\n\nSecond\r\n\r\nThird\n");
        assert_eq!(hints, vec!["First hint\nstill first.", "Second", "Third"]);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "mcq2perseus",
            "upload",
            "--exercise",
            "42",
            "--upload-url",
            "https://cms.example.org",
            "a.png",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.common.verbose);
        match cli.command {
            Command::Upload {
                exercise, inputs, ..
            } => {
                assert_eq!(exercise, "42");
                assert_eq!(inputs, vec!["a.png"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_failure_is_reported_with_raw_reply() {
        let report = ImageReport::failed(
            2,
            "blurry.png",
            ItemError::Parse {
                source_name: "blurry.png".into(),
                detail: "no parser matched".into(),
                raw: "Sorry, I cannot read this.".into(),
            },
        );
        let lines = report_lines(&report);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("blurry.png"));
        assert!(lines[1].contains("Sorry, I cannot read this."));
    }

    #[test]
    fn rejections_and_failed_uploads_are_reported() {
        let processor = ReplyProcessor::from_config(&ExtractionConfig::default());
        let mut report = ImageReport::new(1, "sheet.png");
        report.row = Some(4);
        report.questions = processor
            .process(
                r#"[{"question": "q", "options": ["a","b","c","d"], "answer_index": -1},
                    {"question": "2+2=?", "options": ["3","4","5","6"], "answer_index": 1}]"#,
            )
            .unwrap();
        report.questions[1].upload = Some(UploadOutcome::TransportFailure {
            cause: "connection refused".into(),
        });

        let lines = report_lines(&report);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("row 4 (sheet.png) question 1"));
        assert!(lines[1].contains("connection refused"));
    }

    #[test]
    fn clean_report_prints_nothing() {
        let processor = ReplyProcessor::from_config(&ExtractionConfig::default());
        let mut report = ImageReport::new(1, "ok.png");
        report.questions = processor
            .process(r#"[{"question": "2+2=?", "options": ["3","4","5","6"], "answer_index": 1}]"#)
            .unwrap();
        assert!(report_lines(&report).is_empty());
    }

    #[test]
    fn document_names_do_not_collide_across_inputs() {
        let names: Vec<String> = ["scans/page.png", "scans/page.jpg", "other/page.png"]
            .iter()
            .enumerate()
            .map(|(i, source)| document_file_name(&ImageReport::new(i + 1, *source), 1))
            .collect();
        assert_eq!(
            names,
            vec!["001-page-q1.json", "002-page-q1.json", "003-page-q1.json"]
        );
    }

    #[test]
    fn combinator_answer_requires_rewrite_flag() {
        assert!(Cli::try_parse_from([
            "mcq2perseus",
            "convert",
            "--which-of-the-above-answer",
            "2",
            "a.png",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "mcq2perseus",
            "convert",
            "--which-of-the-above",
            "--which-of-the-above-answer",
            "4",
            "a.png",
        ])
        .is_err());
    }
}
