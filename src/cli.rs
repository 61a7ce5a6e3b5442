//! Command-line interface built on clap.
//!
//! [`Cli`] carries the [`Command`] subcommands (new, status, watch, list,
//! delete, manifest, discard, profiles) and the global flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::{EvidenceLevel, OutputFormat, ProfileId, Sku};

/// dpack: build Decision Packs from grant notices and RFPs.
#[derive(Debug, Parser)]
#[command(name = "dpack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the run store (overrides config).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fill the wizard from flags and submit a new run.
    New(NewRun),

    /// Show the current state of a run.
    Status { run_id: String },

    /// Poll a run until it finishes.
    Watch { run_id: String },

    /// List recent runs, newest first.
    List,

    /// Delete a run.
    Delete { run_id: String },

    /// Print or save the run manifest.
    Manifest {
        run_id: String,

        /// Write to this path instead of stdout. A directory receives
        /// `Run_Manifest_<run_id>.json`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Keep the inputs and error of a failed run for later review.
    Discard {
        run_id: String,

        #[arg(long)]
        note: Option<String>,

        /// Print the saved record instead of saving a new one.
        #[arg(long, conflicts_with = "note")]
        show: bool,
    },

    /// Show the feature table of each profile.
    Profiles,
}

#[derive(Debug, Args)]
pub struct NewRun {
    #[arg(long)]
    pub sku: Sku,

    #[arg(long)]
    pub profile: ProfileId,

    /// Disable URL sources (RFP with P2/P3 only).
    #[arg(long, default_value_t = false)]
    pub secure: bool,

    #[arg(long)]
    pub name: String,

    /// Grant project name.
    #[arg(long)]
    pub project_name: Option<String>,

    /// Grant announcement URL.
    #[arg(long)]
    pub announcement_url: Option<String>,

    /// Issuing agency of the RFP.
    #[arg(long)]
    pub agency: Option<String>,

    /// Scope of the RFP.
    #[arg(long)]
    pub scope: Option<String>,

    /// Source file; only its name and size are recorded.
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Source URL.
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Output format; PDF when omitted.
    #[arg(long = "format")]
    pub formats: Vec<OutputFormat>,

    #[arg(long, default_value_t = EvidenceLevel::Standard)]
    pub evidence: EvidenceLevel,

    /// Acknowledge that the pack is AI-generated and needs human review.
    #[arg(long, default_value_t = false)]
    pub agree_disclosure: bool,

    /// Keep polling after submission until the run finishes.
    #[arg(long, default_value_t = false)]
    pub watch: bool,
}
