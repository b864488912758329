mod config;
mod models;
mod portal_client;

use clap::Parser;
use config::{Cli, TOKEN_VAR};
use parser::{process, JunitSink, RecordingSink, ReportError, ReportSink, RunOptions};
use models::ItemId;
use portal_client::{PortalConfig, PortalSink};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
enum UploadError {
    #[error("Cannot open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("RP_TOKEN is not set")]
    MissingToken,

    #[error("--url is required to upload")]
    MissingUrl,

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn run_sink<S: ReportSink>(sink: S, cli: &Cli, options: &RunOptions) -> Result<S, UploadError> {
    let reader: Box<dyn BufRead> = if cli.reads_stdin() {
        info!("Reading log from stdin");
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&cli.file).map_err(|source| UploadError::Open {
            path: cli.file.display().to_string(),
            source,
        })?;
        info!("Reading log from {}", cli.file.display());
        Box::new(BufReader::new(file))
    };

    let mut stdout = io::stdout().lock();
    let echo: Option<&mut dyn Write> = if cli.quiet { None } else { Some(&mut stdout) };
    Ok(process(sink, options, reader, echo)?)
}

/// How an upload relates to what the portal already holds.
#[derive(Debug, PartialEq)]
enum Resume {
    Fresh,
    Skip,
    Launch(ItemId),
    LaunchAndSuite(ItemId, ItemId),
}

fn plan_resume(launch: Option<ItemId>, suite: Option<ItemId>, skip_existing: bool) -> Resume {
    match (launch, suite) {
        (None, _) => Resume::Fresh,
        (Some(_), Some(_)) if skip_existing => Resume::Skip,
        (Some(launch_id), Some(suite_id)) => Resume::LaunchAndSuite(launch_id, suite_id),
        (Some(launch_id), None) => Resume::Launch(launch_id),
    }
}

fn upload(cli: &Cli, options: &RunOptions) -> Result<(), UploadError> {
    let token = std::env::var(TOKEN_VAR).map_err(|_| UploadError::MissingToken)?;
    let base_url = cli.url.clone().ok_or(UploadError::MissingUrl)?;
    let config = PortalConfig {
        base_url,
        project: cli.project.clone(),
        token,
        skip_tls: cli.skip_tls,
        timeout: Duration::from_secs(cli.timeout),
    };
    let mut sink = PortalSink::connect(&config)?;

    let launch = sink.find_launch_id(&options.launch_name)?;
    let suite = match &launch {
        Some(launch_id) => sink.find_suite_id(launch_id, &options.suite_name)?,
        None => None,
    };
    match plan_resume(launch, suite, cli.skip_existing) {
        Resume::Skip => {
            println!(
                "Suite '{}' already reported in launch '{}', skipping",
                options.suite_name, options.launch_name
            );
            return Ok(());
        }
        Resume::Fresh => {}
        Resume::Launch(launch_id) => sink.resume_launch(&options.launch_name, launch_id),
        Resume::LaunchAndSuite(launch_id, suite_id) => {
            sink.resume_launch(&options.launch_name, launch_id);
            sink.resume_suite(&options.suite_name, suite_id);
        }
    }

    run_sink(sink, cli, options)?;
    info!("Upload to project '{}' finished", cli.project);
    Ok(())
}

fn run(cli: &Cli) -> Result<(), UploadError> {
    let options = cli.run_options();
    info!(
        "Reporting launch '{}' suite '{}' with {:?} policy",
        options.launch_name, options.suite_name, options.policy
    );

    if let Some(path) = &cli.junit {
        let sink = run_sink(JunitSink::new(), cli, &options)?;
        std::fs::write(path, sink.to_xml()?)?;
        info!("JUnit report written to {}", path.display());
        Ok(())
    } else if cli.dry_run {
        let sink = run_sink(RecordingSink::new(), cli, &options)?;
        println!("{}", sink.to_json()?);
        Ok(())
    } else {
        upload(cli, &options)
    }
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the echoed input
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uploader=info,parser=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
