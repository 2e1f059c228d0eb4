//! confluence-poster - publish markdown and HTML files as Confluence pages.
//!
//! Every file (or every supported file directly inside a directory) becomes a
//! child page of the given parent page. Pages are matched by title, so
//! re-running updates the existing pages instead of creating duplicates.

mod error;
mod output;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use poster_config::{CliSettings, Configuration};
use tracing_subscriber::EnvFilter;

use error::CliError;
use output::Output;

/// Publish markdown and HTML files as Confluence pages.
#[derive(Parser)]
#[command(name = "confluence-poster", version, about)]
struct Cli {
    /// Confluence base URL, e.g. https://confluence.example.com.
    #[arg(short = 'c', long = "url")]
    base_url: Option<String>,

    /// Username for basic auth.
    #[arg(short, long)]
    username: Option<String>,

    /// Password or API token for basic auth.
    #[arg(short, long, env = "CONFLUENCE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Client private key (PEM) for certificate auth.
    #[arg(short = 'l', long = "key")]
    key_file: Option<PathBuf>,

    /// Client certificate (PEM) for certificate auth.
    #[arg(short = 't', long = "cert")]
    cert_file: Option<PathBuf>,

    /// Markdown/HTML file or directory of files to publish.
    #[arg(short = 'f', long = "file")]
    source: Option<PathBuf>,

    /// Title of the page to publish under.
    #[arg(short = 's', long = "parent")]
    parent_title: Option<String>,

    /// Space key.
    #[arg(short = 'k', long = "space")]
    space_key: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to configuration file (default: auto-discover confluence-poster.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of documents published in parallel.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Convert and print pages without contacting Confluence.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn settings(&self) -> CliSettings {
        CliSettings {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            key_file: self.key_file.clone(),
            cert_file: self.cert_file.clone(),
            source: self.source.clone(),
            parent_title: self.parent_title.clone(),
            space_key: self.space_key.clone(),
            jobs: self.jobs,
            verbose: self.verbose,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    match execute(&cli, &output) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            output.error(&format!("Error: {err}"));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, output: &Output) -> Result<bool, CliError> {
    let config = Configuration::load(cli.config.as_deref(), &cli.settings())?;
    init_logging(config.verbose());
    tracing::debug!(config = ?config, "Loaded configuration");
    run::execute(&config, cli.dry_run, output)
}

/// Verbose enables DEBUG, otherwise use `RUST_LOG` or default to INFO.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "confluence-poster",
            "-c",
            "https://confluence.example.com",
            "-u",
            "bot",
            "-p",
            "s3cret",
            "-f",
            "docs",
            "-s",
            "Docs",
            "-k",
            "ENG",
            "-v",
            "-j",
            "8",
        ])
        .unwrap();

        let settings = cli.settings();
        assert_eq!(settings.base_url.as_deref(), Some("https://confluence.example.com"));
        assert_eq!(settings.username.as_deref(), Some("bot"));
        assert_eq!(settings.password.as_deref(), Some("s3cret"));
        assert_eq!(settings.source, Some(PathBuf::from("docs")));
        assert_eq!(settings.parent_title.as_deref(), Some("Docs"));
        assert_eq!(settings.space_key.as_deref(), Some("ENG"));
        assert_eq!(settings.jobs, Some(8));
        assert!(settings.verbose);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_certificate_flags() {
        let cli = Cli::try_parse_from([
            "confluence-poster",
            "-l",
            "client.key",
            "-t",
            "client.crt",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.key_file, Some(PathBuf::from("client.key")));
        assert_eq!(cli.cert_file, Some(PathBuf::from("client.crt")));
        assert!(cli.dry_run);
    }
}
