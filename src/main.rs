use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use roguepkg::{
    config::Config,
    error::InputError,
    github::GitHubClient,
    lockfile::{self, find_dependency_files, load_all},
    mcp::McpServer,
    model::PackageSpec,
    osv::{OsvClient, VulnDatabase},
    output::{
        print_batch_report, print_json, print_package_report, print_sequential_summary,
        OutputFormat,
    },
    scan::ScanEngine,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "roguepkg")]
#[command(
    author,
    version,
    about = "Scan npm packages for vulnerabilities and malware using OSV.dev"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a package, a dependency file, or a project directory
    Scan {
        /// Package spec (name or name@version, scoped names supported)
        spec: Option<String>,

        /// Scan a package.json, package-lock.json, or yarn.lock file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Recursively scan a directory for dependency files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Use a single batch query instead of one query per package
        #[arg(short, long)]
        batch: bool,

        /// Output JSON instead of the text report
        #[arg(short, long)]
        json: bool,

        /// Only report malware findings
        #[arg(short, long)]
        malware_only: bool,
    },

    /// Run the MCP tool server on stdin/stdout
    Serve {
        /// GitHub token for repository and organization scans
        #[arg(long)]
        github_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::Scan {
            spec,
            file,
            dir,
            batch,
            json,
            malware_only,
        } => {
            let engine = ScanEngine::new(OsvClient::new(&config.osv_url));
            let json = json
                || config.default_format.parse::<OutputFormat>() == Ok(OutputFormat::Json);

            if let Some(path) = file {
                run_file_scan(&engine, &path, batch, json, malware_only).await
            } else if let Some(path) = dir {
                run_dir_scan(&engine, &path, json, malware_only).await
            } else if let Some(spec) = spec {
                run_package_scan(&engine, &spec, json, malware_only).await
            } else {
                eprintln!("Nothing to scan. Provide a package spec, --file, or --dir.");
                Ok(exit_codes::ERROR)
            }
        }
        Commands::Serve { github_token } => {
            let token = github_token.or(config.github_token);
            let github = token.map(|t| {
                Box::new(GitHubClient::new(&config.github_url, Some(t)))
                    as Box<dyn roguepkg::github::SourceHost>
            });
            let engine = ScanEngine::new(OsvClient::new(&config.osv_url));
            let server = McpServer::new(engine, github).max_repos(config.max_repos);
            server.serve().await?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_package_scan(
    engine: &ScanEngine<OsvClient>,
    spec: &str,
    json: bool,
    malware_only: bool,
) -> Result<u8> {
    let parsed = PackageSpec::parse(spec);

    if json {
        // Raw OSV response, suitable for piping into jq.
        let response = engine
            .database()
            .query(&parsed.name, parsed.version.as_deref())
            .await;
        match response {
            Some(response) => print_json(&response)?,
            None => print_json(&serde_json::json!({}))?,
        }
        return Ok(exit_codes::SUCCESS);
    }

    let spinner = query_spinner(format!("Querying OSV.dev for {parsed}..."));
    let result = engine.scan_package(spec, malware_only).await;
    spinner.finish_and_clear();

    print_package_report(
        &parsed.name,
        parsed.version.as_deref(),
        &result.findings,
        malware_only,
    );
    Ok(exit_codes::SUCCESS)
}

async fn run_file_scan(
    engine: &ScanEngine<OsvClient>,
    path: &PathBuf,
    batch: bool,
    json: bool,
    malware_only: bool,
) -> Result<u8> {
    let deps = match lockfile::load_file(path) {
        Ok(deps) => deps,
        Err(e @ InputError::NoDependencies(_)) => {
            if json {
                print_json(&serde_json::json!({ "error": e.to_string() }))?;
            } else {
                println!("{}", e);
            }
            return Ok(exit_codes::ERROR);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_codes::ERROR);
        }
    };

    if !json {
        println!("Found {} dependencies in {}", deps.len(), path.display());
    }

    if batch {
        let spinner = query_spinner(format!("Batch querying {} packages...", deps.len()));
        let result = engine.scan_dependencies(&deps, malware_only).await;
        spinner.finish_and_clear();

        if json {
            print_json(&result)?;
        } else {
            print_batch_report(&result, malware_only);
        }
    } else {
        let spinner = query_spinner(format!("Querying {} packages...", deps.len()));
        let results = engine.scan_each(&deps, malware_only).await;
        spinner.finish_and_clear();

        if json {
            print_json(&results)?;
        } else {
            for result in &results {
                let spec = PackageSpec::parse(&result.package);
                print_package_report(
                    &spec.name,
                    spec.version.as_deref(),
                    &result.findings,
                    malware_only,
                );
            }
            print_sequential_summary(&results, malware_only);
        }
    }

    Ok(exit_codes::SUCCESS)
}

async fn run_dir_scan(
    engine: &ScanEngine<OsvClient>,
    path: &PathBuf,
    json: bool,
    malware_only: bool,
) -> Result<u8> {
    if !path.is_dir() {
        eprintln!("Error: directory not found: {}", path.display());
        return Ok(exit_codes::ERROR);
    }

    let files = find_dependency_files(path);
    if files.total() == 0 {
        eprintln!("No dependency files found in {}", path.display());
        return Ok(exit_codes::ERROR);
    }

    if !json {
        println!(
            "Found {} dependency files in {}",
            files.total(),
            path.display()
        );
    }

    let deps = load_all(&files);
    if deps.is_empty() {
        if json {
            print_json(&serde_json::json!({ "error": "No dependencies found" }))?;
        } else {
            println!("No dependencies found");
        }
        return Ok(exit_codes::ERROR);
    }

    if !json {
        println!("Collected {} unique dependencies", deps.len());
    }

    let spinner = query_spinner(format!("Batch querying {} packages...", deps.len()));
    let result = engine.scan_dependencies(&deps, malware_only).await;
    spinner.finish_and_clear();

    if json {
        print_json(&result)?;
    } else {
        print_batch_report(&result, malware_only);
    }

    Ok(exit_codes::SUCCESS)
}

/// Spinner shown while waiting on OSV.dev. Hidden automatically when
/// stderr is not a terminal.
fn query_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}
