use agencycheck::connection::AgencyConfig;
use agencycheck::report::write_atomic;
use agencycheck::{
    AgencyClient, AnalyzerError, AnalyzerOptions, Edition, HttpServerConnector, Report, Snapshot,
    analyze, analyze_live, load_file,
};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agencycheck")]
#[command(about = "Consistency analyzer for ArangoDB cluster metadata")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks and write remediation files for what was found
    Analyze {
        #[command(flatten)]
        source: Source,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Infer enterprise sharding strategies
        #[arg(long)]
        enterprise: bool,
        /// Ask every live server about one-shard databases (live only)
        #[arg(long)]
        check_one_shard: bool,
        /// Print the full report as JSON instead of status lines
        #[arg(long)]
        json: bool,
    },
    /// Print the health of all primaries
    Health {
        #[command(flatten)]
        source: Source,
    },
    /// Save an agency dump that `analyze --file` can replay
    Fetch {
        #[command(flatten)]
        connection: ConnectionArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct Source {
    /// Agency dump to analyze
    #[arg(long, conflicts_with = "endpoint", required_unless_present = "endpoint")]
    file: Option<PathBuf>,
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Agency endpoint, e.g. tcp://agent1:8531
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long, default_value = "root")]
    username: String,
    #[arg(long, env = "ARANGO_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, env = "ARANGO_JWT", hide_env_values = true)]
    jwt: Option<String>,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Accept self-signed TLS certificates
    #[arg(long)]
    insecure: bool,
}

impl ConnectionArgs {
    fn config(&self) -> Result<AgencyConfig> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            bail!("--endpoint is required");
        };
        let mut config = AgencyConfig::from_url(endpoint)
            .with_context(|| format!("invalid endpoint '{}'", endpoint))?
            .timeout(Duration::from_secs(self.timeout))
            .verify_tls(!self.insecure);
        if let Some(jwt) = &self.jwt {
            config = config.jwt(jwt);
        } else if let Some(password) = &self.password {
            config = config.basic_auth(&self.username, password);
        }
        Ok(config)
    }
}

async fn load(source: &Source) -> Result<Snapshot> {
    match &source.file {
        Some(path) => {
            load_file(path).with_context(|| format!("failed to load '{}'", path.display()))
        }
        None => {
            let config = source.connection.config()?;
            let client = AgencyClient::new(config)?;
            client
                .read_snapshot()
                .await
                .context("failed to read agency snapshot")
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            source,
            output_dir,
            enterprise,
            check_one_shard,
            json,
        } => {
            let options = AnalyzerOptions::default()
                .edition(if enterprise {
                    Edition::Enterprise
                } else {
                    Edition::Community
                })
                .output_dir(output_dir)
                .check_one_shard(check_one_shard);
            run_analyze(&source, &options, json).await
        }
        Command::Health { source } => {
            let snapshot = load(&source).await?;
            print_health(&snapshot);
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch { connection, out } => {
            let client = AgencyClient::new(connection.config()?)?;
            let dump = client.read_raw().await.context("failed to read agency")?;
            write_atomic(&out, &serde_json::to_vec_pretty(&dump)?)
                .with_context(|| format!("failed to write '{}'", out.display()))?;
            println!("agency dump written to {}", out.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn build_report(source: &Source, options: &AnalyzerOptions) -> Result<Report> {
    let snapshot = load(source).await?;
    Ok(match (&source.file, options.check_one_shard) {
        (None, true) => {
            let mut connector = HttpServerConnector::new(source.connection.config()?)?;
            analyze_live(&snapshot, options, &mut connector).await?
        }
        _ => analyze(&snapshot, options)?,
    })
}

/// `{"error": {"code", "message"}}`, for callers that parse `--json`.
fn error_json(err: &anyhow::Error) -> serde_json::Value {
    let code = err
        .downcast_ref::<AnalyzerError>()
        .map_or("ERROR", AnalyzerError::code);
    json!({"error": {"code": code, "message": format!("{:#}", err)}})
}

async fn run_analyze(source: &Source, options: &AnalyzerOptions, json: bool) -> Result<ExitCode> {
    let report = match build_report(source, options).await {
        Ok(report) => report,
        Err(e) if json => {
            println!("{}", serde_json::to_string_pretty(&error_json(&e))?);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e),
    };

    let written = report
        .write_remediation_files(&options.output_dir)
        .with_context(|| format!("failed to write into '{}'", options.output_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json()?)?);
    } else {
        print_report(&report, &options.output_dir);
    }
    if !written.is_empty() {
        warn!(files = written.len(), "remediation files written");
    }

    Ok(if report.infected {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &Report, dir: &Path) {
    for line in report.status_lines() {
        println!("{}", line);
    }
    for warning in report.warnings() {
        println!("warning: {}", warning);
    }
    if !report.infected {
        println!("cluster metadata is consistent");
        return;
    }
    println!();
    for suggestion in report.suggestions() {
        let file = dir.join(suggestion.file);
        match suggestion.next_action {
            Some(action) => println!("{}: run '{}' with {}", suggestion.check, action, file.display()),
            None => println!("{}: inspect {} manually", suggestion.check, file.display()),
        }
    }
}

fn print_health(snapshot: &Snapshot) {
    println!("{:<40} {:<16} {:<8} ENDPOINT", "SERVER", "NAME", "STATUS");
    let index = agencycheck::health::HealthIndex::compute(snapshot);
    for (id, health) in &index.all_primaries {
        println!(
            "{:<40} {:<16} {:<8} {}",
            id,
            health.short_name.as_deref().unwrap_or("-"),
            format!("{:?}", health.status).to_uppercase(),
            health.endpoint.as_deref().unwrap_or("-"),
        );
    }
    println!(
        "{} of {} primaries alive",
        index.alive_primaries.len(),
        index.all_primaries.len()
    );
}
