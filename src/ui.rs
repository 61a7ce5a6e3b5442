//! Terminal output: the watch spinner and colored run listings.
//!
//! Uses `indicatif` for the spinner and `console` for styling.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::{ProfileId, Sku, secure_mode_available};
use crate::error::describe;
use crate::poller::PollEvent;
use crate::run::{DiscardKnowledge, Run, RunStatus, RunSummary};

fn status_style(status: RunStatus) -> Style {
    match status {
        RunStatus::Queued => Style::new().dim(),
        RunStatus::Running => Style::new().cyan(),
        RunStatus::Succeeded => Style::new().green().bold(),
        RunStatus::Failed => Style::new().red().bold(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Spinner shown while a run is being watched.
pub struct RunProgress {
    pb: ProgressBar,
    yellow: Style,
}

impl RunProgress {
    pub fn start(run_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{run_id}: waiting for status"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            yellow: Style::new().yellow(),
        }
    }

    pub fn update(&self, event: &PollEvent) {
        match event {
            PollEvent::Updated(run) => {
                let status = status_style(run.status).apply_to(run.status);
                self.pb.set_message(format!("{status} {}", run.run_name));
            }
            PollEvent::NotFound => self.pb.set_message("run not found"),
            PollEvent::Error(message) => {
                self.pb.println(format!(
                    "  {} status check failed: {message}",
                    self.yellow.apply_to("↻")
                ));
            }
        }
    }

    /// Stop the spinner and print the final state, if any.
    pub fn finish(&self, run: Option<&Run>) {
        self.pb.finish_and_clear();
        if let Some(run) = run {
            print_run(run);
        }
    }
}

/// Detailed view of one run.
pub fn print_run(run: &Run) {
    let bold = Style::new().bold();
    println!(
        "{} {}",
        bold.apply_to(&run.run_name),
        Style::new().dim().apply_to(&run.run_id)
    );
    println!(
        "  status:   {}",
        status_style(run.status).apply_to(run.status)
    );
    println!("  sku:      {} ({})", run.sku.label(), run.sku);
    println!("  profile:  {}", run.profile_id);
    println!("  created:  {}", run.created_at.to_rfc3339());
    println!("  updated:  {}", run.updated_at.to_rfc3339());
    if run.manifest.secure_mode.enabled {
        println!("  {}", Style::new().yellow().apply_to("secure mode (airgap)"));
    }

    match run.status {
        RunStatus::Succeeded => {
            println!("  artifacts:");
            for artifact in &run.artifacts {
                let size = artifact
                    .size_bytes
                    .map(|b| format!("{} KiB", b / 1024))
                    .unwrap_or_default();
                println!("    {:<18} {:<40} {size}", artifact.kind.as_str(), artifact.filename);
            }
        }
        RunStatus::Failed => {
            if let Some(error) = &run.error {
                let red = Style::new().red();
                println!("  {} {}", red.apply_to(&error.code), error.message);
                if let Some(details) = &error.details {
                    println!("    {details}");
                }
            }
        }
        RunStatus::Queued | RunStatus::Running => {}
    }
}

pub fn print_runs(runs: &[RunSummary]) {
    if runs.is_empty() {
        println!("No runs yet.");
        return;
    }
    for run in runs {
        let status = status_style(run.status).apply_to(format!("{:<9}", run.status.to_string()));
        println!(
            "{}  {status}  {:<8} {}  {}  {}",
            run.run_id,
            run.sku.as_str(),
            run.profile_id,
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.run_name
        );
    }
}

pub fn print_discard_knowledge(knowledge: &DiscardKnowledge) {
    println!("{}", Style::new().bold().apply_to(&knowledge.run_id));
    if let Some(saved_at) = knowledge.saved_at {
        println!("  saved:    {}", saved_at.to_rfc3339());
    }
    let inputs = &knowledge.inputs;
    if let (Some(sku), Some(profile)) = (inputs.sku, inputs.profile_id) {
        println!("  sku:      {} ({sku})", sku.label());
        println!("  profile:  {profile}");
    }
    println!(
        "  sources:  {} file(s), {} URL(s)",
        inputs.sources.files.len(),
        inputs.sources.urls.len()
    );
    if let Some(error) = &knowledge.error {
        println!("  {} {}", Style::new().red().apply_to(&error.code), error.message);
    }
    if let Some(note) = &knowledge.note {
        println!("  note:     {note}");
    }
}

/// Report a failed command on stderr.
pub fn print_error(err: &anyhow::Error) {
    eprintln!(
        "{} {}",
        Style::new().red().bold().apply_to("error:"),
        describe(err)
    );
}

/// Feature table of every profile.
pub fn print_profiles() {
    let bold = Style::new().bold();
    println!(
        "{}",
        bold.apply_to("profile  quick-pass  switching-slots  advanced-gates  secure-mode")
    );
    for profile in ProfileId::ALL {
        let features = profile.features();
        let secure: Vec<&str> = Sku::ALL
            .iter()
            .filter(|sku| secure_mode_available(Some(**sku), Some(profile)))
            .map(|sku| sku.as_str())
            .collect();
        println!(
            "{:<8} {:<11} {:<16} {:<15} {}",
            profile.as_str(),
            yes_no(features.quick_pass),
            features.switching_slots,
            yes_no(features.advanced_gates),
            if secure.is_empty() { "-".to_string() } else { secure.join(", ") }
        );
    }
}
