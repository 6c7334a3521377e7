//! CLI argument definitions (spec §6 "External interfaces").

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trialforge")]
#[command(about = "Clinical-trial protocol extraction engine")]
#[command(long_about = r#"
trialforge ingests a clinical-trial protocol PDF and produces a
standards-compliant unified JSON document through a set of LLM-driven
extraction modules, an optional schedule-of-assessments pipeline, and a
twelve-stage interpretation pipeline.

EXAMPLES:
  # Run the full module extraction pipeline over a protocol PDF
  trialforge extract protocol.pdf

  # Check the status of a previously submitted job
  trialforge status job-abc123

  # Resume a job from its last completed module
  trialforge resume job-abc123

CONFIGURATION:
  Configuration is loaded from an optional TOML file (--config), then
  layered with environment-variable overrides (DATABASE_URL, CACHE_DIR,
  CONCEPT_SEARCH_DB_PATH, LLM_PRIMARY_MODEL, ANTHROPIC_API_KEY).
"#)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the module extraction pipeline over a protocol PDF.
    Extract {
        /// Path to the source protocol PDF.
        file: PathBuf,

        /// Resume from the last completed module instead of starting over.
        #[arg(long)]
        resume: bool,

        /// Existing job id to resume (required with --resume).
        #[arg(long)]
        job: Option<String>,

        /// Write the unified document to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the current status of a job.
    Status {
        /// Job id to inspect.
        job: String,

        /// Output status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resume a job from its last completed module.
    Resume {
        /// Job id to resume.
        job: String,

        /// Path to the source protocol PDF (the job's original input).
        file: PathBuf,

        /// Write the unified document to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Start a Schedule-of-Activities job: detect candidate SOA table
    /// pages over a protocol PDF (spec §4.F, `detecting_pages`).
    Soa {
        /// Path to the source protocol PDF.
        file: PathBuf,

        /// Write the detected-pages payload to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Supply the human-confirmed SOA page list and each table's HTML
    /// transcription (spec §4.F, `awaiting_page_confirmation`).
    ConfirmPages {
        /// Job id returned by `soa`.
        job: String,

        /// Path to a JSON file: `[{"tableId": "...", "html": "<table>..."}]`.
        #[arg(long)]
        input: PathBuf,
    },

    /// Supply the human-confirmed SOA merge plan and run interpretation
    /// to completion (spec §4.F, `awaiting_merge_confirmation`).
    ConfirmMerge {
        /// Job id to confirm.
        job: String,
    },

    /// Start an eligibility-criteria job: detect candidate Inclusion/
    /// Exclusion sections over a protocol PDF (spec §4.F,
    /// `detecting_sections`).
    Eligibility {
        /// Path to the source protocol PDF.
        file: PathBuf,

        /// Write the detected-criteria payload to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Supply the human-confirmed criterion ids, run the classification
    /// funnel, and run interpretation to completion (spec §4.F,
    /// `awaiting_section_confirmation`).
    ConfirmSections {
        /// Job id to confirm.
        job: String,

        /// Confirmed criterion ids (e.g. `CRIT-1 CRIT-3`).
        #[arg(long, required = true, num_args = 1..)]
        criterion: Vec<String>,
    },

    /// Internal: run a single pipeline phase in its own process. Spawned
    /// by the process supervisor (spec §4.E); not intended for direct
    /// interactive use.
    Worker {
        /// Which phase to run: `module_extraction` drives the two-phase
        /// extractor over every enabled module; `interpret` runs the
        /// twelve-stage interpretation pipeline over the job's current
        /// document (the SOA/eligibility "interpreting" phase, spec
        /// §4.F).
        #[arg(long, value_parser = ["module_extraction", "interpret"])]
        phase: String,

        /// Which job kind `interpret` is running for. Ignored for
        /// `module_extraction`.
        #[arg(long, value_parser = ["soa", "eligibility"], default_value = "soa")]
        kind: String,

        /// Job id this worker is running.
        #[arg(long)]
        job: String,

        /// Protocol id this job belongs to.
        #[arg(long)]
        protocol: String,

        /// Path to the source protocol PDF. Required for
        /// `module_extraction`; ignored for `interpret`.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}
