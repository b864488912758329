use chrono::Local;
use clap::Parser;
use parser::line_grammar::DEFAULT_HARNESS_PREFIX;
use parser::{ErrorPolicy, RunOptions};
use std::path::PathBuf;

pub const TOKEN_VAR: &str = "RP_TOKEN";

#[derive(Parser, Debug, Clone)]
#[command(name = "uploader", version, about = "Upload test harness logs to a report portal")]
pub struct Cli {
    /// Log file to read, '-' for stdin
    #[arg(short = 'f', long = "file", value_name = "PATH", default_value = "-")]
    pub file: PathBuf,

    /// Launch name (defaults to run<timestamp>)
    #[arg(short = 'l', long = "launch")]
    pub launch: Option<String>,

    /// Suite name (defaults to run<timestamp>)
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,

    #[arg(short = 'p', long = "project", default_value = "gitops-adhoc")]
    pub project: String,

    /// Portal base URL
    #[arg(short = 'u', long = "url", required_unless_present_any = ["junit", "dry_run"])]
    pub url: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long = "skip-tls", default_value_t = false)]
    pub skip_tls: bool,

    /// Do nothing if the suite is already reported in the launch
    #[arg(long = "skip-existing", default_value_t = false)]
    pub skip_existing: bool,

    /// Log sink failures and keep going
    #[arg(long = "ignore-errors", default_value_t = false)]
    pub ignore_errors: bool,

    /// Path prefix stripped from test names
    #[arg(long = "harness-prefix", default_value = DEFAULT_HARNESS_PREFIX)]
    pub harness_prefix: String,

    /// Write a JUnit XML report to PATH instead of uploading
    #[arg(long = "junit", value_name = "PATH", conflicts_with = "dry_run")]
    pub junit: Option<PathBuf>,

    /// Parse only and print the discovered report as JSON
    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,

    /// Do not echo input lines to stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    pub timeout: u64,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.file.as_os_str() == "-"
    }

    pub fn launch_name(&self) -> String {
        self.launch.clone().unwrap_or_else(default_run_name)
    }

    pub fn suite_name(&self) -> String {
        self.name.clone().unwrap_or_else(default_run_name)
    }

    pub fn policy(&self) -> ErrorPolicy {
        if self.ignore_errors {
            ErrorPolicy::Tolerate
        } else {
            ErrorPolicy::Abort
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.launch_name(), self.suite_name())
            .policy(self.policy())
            .harness_prefix(self.harness_prefix.as_str())
    }
}

fn default_run_name() -> String {
    format!("run{}", Local::now().format("%Y%m%d%H%M%S"))
}
