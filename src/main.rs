mod api;
mod catalog;
mod cli;
mod clock;
mod config;
mod error;
mod poller;
mod run;
mod scheduler;
mod store;
mod telemetry;
mod ui;
mod wizard;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use url::Url;

use api::RunApi;
use catalog::{Sku, secure_mode_available};
use cli::{Cli, Command, NewRun};
use clock::SystemClock;
use config::AppConfig;
use error::{DpackError, ErrorCode};
use poller::{PollEvent, poll_run};
use scheduler::TokioTimers;
use store::FileKv;
use ui::RunProgress;
use wizard::{
    GrantContext, RfpContext, SourceFile, Wizard, WizardAction, check_submit, validate_file,
    validate_url,
};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::print_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    if let Command::Profiles = cli.command {
        ui::print_profiles();
        return Ok(());
    }

    let mut config = AppConfig::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let kv = Arc::new(FileKv::open(&config.data_dir)?);
    let api = RunApi::new(
        &config,
        kv,
        Arc::new(SystemClock),
        Arc::new(TokioTimers::current()),
    )?;
    let every = Duration::from_millis(config.poll_interval_ms);

    match cli.command {
        Command::New(args) => {
            let watch_after = args.watch;
            let summary = submit(&api, &config, args).await?;
            println!("Created {} ({})", summary.run_id, summary.status);
            if watch_after {
                watch_run(&api, &summary.run_id, every).await?;
            }
        }
        Command::Status { run_id } => match api.get_run(&run_id).await? {
            Some(run) => ui::print_run(&run),
            None => bail!(DpackError::RunNotFound(run_id)),
        },
        Command::Watch { run_id } => watch_run(&api, &run_id, every).await?,
        Command::List => ui::print_runs(&api.list_runs().await?),
        Command::Delete { run_id } => {
            if api.get_run(&run_id).await?.is_none() {
                bail!(DpackError::RunNotFound(run_id));
            }
            api.delete_run(&run_id).await?;
            println!("Deleted {run_id}");
        }
        Command::Manifest { run_id, out } => {
            let json = api.export_manifest(&run_id).await?;
            match out {
                Some(out) => {
                    let path = manifest_path(&out, &run_id);
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Saved {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Discard {
            run_id,
            show: true,
            ..
        } => match api.discard_knowledge(&run_id).await? {
            Some(knowledge) => ui::print_discard_knowledge(&knowledge),
            None => println!("No discard knowledge saved for {run_id}"),
        },
        Command::Discard { run_id, note, .. } => {
            let saved = api.save_discard_knowledge(&run_id, note).await?;
            println!("Saved discard knowledge for {}", saved.run_id);
        }
        Command::Profiles => {}
    }

    Ok(())
}

/// Walk the wizard through every step with the values from `args`, then
/// submit the run.
async fn submit(api: &RunApi, config: &AppConfig, args: NewRun) -> Result<run::RunSummary> {
    let limits = config.limits();
    let mut wizard = Wizard::new();

    // Step 0: SKU and profile.
    wizard.dispatch(WizardAction::SetSku(args.sku));
    wizard.dispatch(WizardAction::SetProfile(args.profile));
    if args.secure {
        if !secure_mode_available(Some(args.sku), Some(args.profile)) {
            bail!(DpackError::validation_with(
                ErrorCode::ValidationRange,
                format!(
                    "secure mode is not available for {} with {}",
                    args.sku, args.profile
                ),
            ));
        }
        wizard.dispatch(WizardAction::SetSecureMode(true));
    }
    wizard.next()?;

    // Step 1: context.
    match args.sku {
        Sku::Grant => {
            if let Some(raw) = &args.announcement_url
                && Url::parse(raw.trim()).is_err()
            {
                bail!(DpackError::validation_with(
                    ErrorCode::UrlInvalid,
                    format!("not a valid URL: {raw}"),
                ));
            }
            wizard.dispatch(WizardAction::SetGrantContext(GrantContext {
                project_name: args.project_name.unwrap_or_default(),
                announcement_url: args.announcement_url.map(|u| u.trim().to_string()),
            }));
        }
        Sku::Rfp => wizard.dispatch(WizardAction::SetRfpContext(RfpContext {
            agency: args.agency.unwrap_or_default(),
            scope: args.scope.unwrap_or_default(),
        })),
    }
    wizard.next()?;

    // Step 2: sources.
    for path in &args.files {
        let file = source_file(path)?;
        validate_file(wizard.state(), &file, &limits)?;
        wizard.dispatch(WizardAction::AddFile(file));
    }
    for raw in &args.urls {
        let url = validate_url(wizard.state(), raw, &limits)?;
        wizard.dispatch(WizardAction::AddUrl(url));
    }
    wizard.next()?;

    // Step 3: output.
    if !args.formats.is_empty() {
        let mut formats = Vec::new();
        for format in args.formats {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        wizard.dispatch(WizardAction::SetOutputFormats(formats));
    }
    wizard.dispatch(WizardAction::SetEvidenceLevel(args.evidence));
    wizard.next()?;

    // Step 4: review.
    wizard.dispatch(WizardAction::SetRunName(args.name));
    check_submit(wizard.state(), args.agree_disclosure)?;

    Ok(api.create_run(wizard.into_state()).await?)
}

fn source_file(path: &Path) -> Result<SourceFile> {
    let meta =
        fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a file", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile {
        name,
        size_bytes: meta.len(),
    })
}

fn manifest_path(out: &Path, run_id: &str) -> PathBuf {
    if out.is_dir() {
        out.join(format!("Run_Manifest_{run_id}.json"))
    } else {
        out.to_path_buf()
    }
}

async fn watch_run(api: &RunApi, run_id: &str, every: Duration) -> Result<()> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let progress = RunProgress::start(run_id);
    let mut missing = false;
    let done = poll_run(api, run_id, every, cancel_rx, |event| {
        missing |= matches!(event, PollEvent::NotFound);
        progress.update(&event);
    })
    .await;
    progress.finish(done.as_ref());

    if missing {
        bail!(DpackError::RunNotFound(run_id.to_string()));
    }
    Ok(())
}
