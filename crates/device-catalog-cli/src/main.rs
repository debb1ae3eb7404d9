use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use device_catalog_core::catalog::{KnownProfiles, LocalCatalog, RemoteCatalog};
use device_catalog_core::config::Config;
use device_catalog_core::contributor::Contributor;
use device_catalog_core::discovery::Discovery;
use device_catalog_core::github::GitHubClient;
use device_catalog_core::indigo::{IndigoClient, IndigoEndpoint};
use device_catalog_core::validate::{validate_catalog, IndexCheck};
use device_catalog_core::{CatalogError, Result};

mod args;
use args::{Cli, Commands, ConfigAction, IndigoArgs, Shell};

const SCHEMA_RELATIVE_PATH: &str = "schema/device-profile.schema.json";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let base_dir = resolve_base_dir(cli.base_dir);
    debug!(base_dir = %base_dir.display(), "resolved base directory");

    let result = match cli.command {
        Some(Commands::Discover {
            indigo,
            apply,
            catalog_dir,
        }) => handle_discover(&base_dir, &indigo, apply, catalog_dir),
        Some(Commands::Validate {
            catalog_dir,
            schema,
        }) => handle_validate(&base_dir, catalog_dir, schema),
        Some(Commands::Reindex { catalog_dir }) => {
            handle_reindex(&base_dir, catalog_dir).map(|()| ExitCode::SUCCESS)
        }
        Some(Commands::Export { indigo, output }) => handle_export(&base_dir, &indigo, output),
        Some(Commands::Submit { indigo }) => handle_submit(&base_dir, &indigo),
        Some(Commands::Config { action }) => {
            handle_config(action, &base_dir).map(|()| ExitCode::SUCCESS)
        }
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            Cli::command().print_help().ok();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// `RUST_LOG` wins; otherwise warn, or debug/error with -v/-q.
/// `DEVICE_CATALOG_LOG_JSON=1` switches to JSON lines.
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let json_logging = std::env::var("DEVICE_CATALOG_LOG_JSON")
        .map(|v| matches!(v.as_str(), "1" | "true"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .with_writer(io::stderr)
            .init();
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "device-catalog", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("DEVICE_CATALOG_BASE") {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".device-catalog"))
        .unwrap_or_else(|| PathBuf::from(".device-catalog"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn endpoint(config: &Config, args: &IndigoArgs) -> IndigoEndpoint {
    let mut endpoint = config.indigo_endpoint();
    if let Some(host) = &args.host {
        endpoint.host = host.clone();
    }
    if let Some(port) = args.port {
        endpoint.port = port;
    }
    if args.no_tls {
        endpoint.tls = false;
    }
    if let Some(key) = &args.api_key {
        endpoint.api_key = Some(key.clone());
    }
    endpoint
}

fn contributor_name(config: &Config, args: &IndigoArgs) -> String {
    args.contributor
        .clone()
        .unwrap_or_else(|| config.contributor.name.clone())
}

fn print_connection_help() {
    println!();
    println!("Make sure:");
    println!("  - Indigo web server is enabled (Preferences > Web Server)");
    println!("  - The host/port are correct");
    println!("  - Try --no-tls if using HTTP");
}

/// Connect to Indigo and discover against `known`. Prints progress and
/// per-device results. `None` means Indigo was unreachable, which has
/// already been reported.
fn run_discovery(
    config: &Config,
    args: &IndigoArgs,
    known: &dyn KnownProfiles,
) -> Result<Option<Contributor>> {
    let client = IndigoClient::new(&endpoint(config, args))?;
    let mut contributor = Contributor::new(contributor_name(config, args));

    println!("Connecting to {}...", client.base_url());
    let report = match contributor.discover(&client, known, today()) {
        Ok(report) => report,
        Err(e) if e.is_transient() => {
            eprintln!(
                "{} Could not connect to Indigo: {}",
                "[ERROR]".red().bold(),
                e
            );
            print_connection_help();
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if let Some(warning) = &report.warning {
        println!("{} {}", "[WARN]".yellow().bold(), warning);
    }
    println!("Catalog has {} existing profiles", report.known);
    println!("Found {} devices", report.devices);

    if let Some(discovery) = contributor.pending() {
        print_discovery(discovery);
    }
    Ok(Some(contributor))
}

fn print_discovery(discovery: &Discovery) {
    if discovery.total() + discovery.failures.len() == 0 {
        return;
    }

    println!();
    for (_, profile) in discovery.profiles() {
        println!(
            "  {} {} / {}",
            "OK:".green(),
            profile.plugin_name,
            profile.device_type_id
        );
    }
    for failure in &discovery.failures {
        println!("  {} {}: {}", "FAIL:".red(), failure.key, failure.message);
    }
    println!();
    println!(
        "Discovered {} new profile(s) across {} class(es) ({} error(s))",
        discovery.total(),
        discovery.class_count(),
        discovery.failures.len()
    );
}

/// Exit status for a discovery that produced nothing: failure only when
/// every candidate failed
fn empty_discovery_code(discovery: &Discovery) -> ExitCode {
    if discovery.failures.is_empty() {
        println!();
        println!("{}", "No new device types found - catalog is up to date!".green());
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn catalog_dir(config: &Config, cli_dir: Option<PathBuf>) -> PathBuf {
    cli_dir.unwrap_or_else(|| config.catalog.dir.clone())
}

fn handle_discover(
    base_dir: &Path,
    args: &IndigoArgs,
    apply: bool,
    catalog_dir_arg: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = Config::load(base_dir)?;
    let catalog = LocalCatalog::new(catalog_dir(&config, catalog_dir_arg));

    let Some(contributor) = run_discovery(&config, args, &catalog)? else {
        return Ok(ExitCode::FAILURE);
    };
    let Some(discovery) = contributor.pending() else {
        return Ok(ExitCode::SUCCESS);
    };
    if discovery.is_empty() {
        return Ok(empty_discovery_code(discovery));
    }

    if apply {
        println!();
        println!("Applying to catalog...");
        let result = catalog.apply(discovery, today())?;
        for (file, count) in &result.files {
            println!("  {} {}: now {} profiles", "Updated".green(), file, count);
        }
        println!("  Regenerated _index.json and by-plugin/_index.json");
        if result.skipped > 0 {
            println!("  {} profile(s) already in the catalog", result.skipped);
        }
        println!();
        println!(
            "{} {} new profile(s) added to catalog.",
            "Done!".green().bold(),
            result.added
        );
        println!("Run 'device-catalog validate' to verify, then commit and open a PR.");
    } else {
        println!();
        println!("Dry run - showing what would be added:");
        println!("{}", serde_json::to_string_pretty(&discovery.summary())?);
        println!();
        println!("Re-run with --apply to write these to the catalog.");
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_validate(
    base_dir: &Path,
    catalog_dir_arg: Option<PathBuf>,
    schema: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = Config::load(base_dir)?;
    let catalog_dir = catalog_dir(&config, catalog_dir_arg);
    let schema = schema.unwrap_or_else(|| {
        catalog_dir
            .parent()
            .map(|p| p.join(SCHEMA_RELATIVE_PATH))
            .unwrap_or_else(|| PathBuf::from(SCHEMA_RELATIVE_PATH))
    });

    let report = validate_catalog(&catalog_dir, &schema)?;

    for file in &report.files {
        println!("Validating {}...", file.file);
        if file.is_ok() {
            println!("  {} ({} profiles)", "OK".green(), file.profiles);
        }
        for error in &file.errors {
            println!("  {} {}", "ERROR:".red(), error);
        }
    }
    for dup in &report.duplicates {
        println!(
            "  {} Duplicate profile {} in {} (also in {})",
            "ERROR:".red(),
            dup.key,
            dup.also_in,
            dup.first
        );
    }
    match &report.index {
        IndexCheck::Valid => println!("Validating _index.json...\n  {}", "OK".green()),
        IndexCheck::Invalid(message) => {
            println!("Validating _index.json...");
            println!("  {} Invalid JSON: {}", "ERROR:".red(), message);
        }
        IndexCheck::Missing => {}
    }
    for warning in &report.warnings {
        println!("{} {}", "WARNING:".yellow(), warning);
    }

    println!();
    println!(
        "Validated {} class files, {} profiles total",
        report.files.len(),
        report.total_profiles
    );
    if report.passed() {
        println!("{}", "PASSED".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}",
            format!("FAILED: {} error(s)", report.error_count()).red().bold()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn handle_reindex(base_dir: &Path, catalog_dir_arg: Option<PathBuf>) -> Result<()> {
    let config = Config::load(base_dir)?;
    let catalog = LocalCatalog::new(catalog_dir(&config, catalog_dir_arg));
    let indexes = catalog.regenerate_indexes(today())?;

    println!(
        "{} {} ({} classes, {} profiles)",
        "Wrote:".green(),
        catalog.class_index_path().display(),
        indexes.classes.classes.len(),
        indexes.classes.total_profiles()
    );
    println!(
        "{} {} ({} plugins)",
        "Wrote:".green(),
        catalog.plugin_index_path().display(),
        indexes.plugins.plugins.len()
    );
    Ok(())
}

/// The plugin flow: discover against the published catalog
fn discover_against_published(config: &Config, args: &IndigoArgs) -> Result<Option<Contributor>> {
    let remote = RemoteCatalog::new(config.remote_catalog())?;
    run_discovery(config, args, &remote)
}

fn handle_export(
    base_dir: &Path,
    args: &IndigoArgs,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = Config::load(base_dir)?;
    let path = match output {
        Some(path) => path,
        None => config.export_path()?,
    };

    let Some(contributor) = discover_against_published(&config, args)? else {
        return Ok(ExitCode::FAILURE);
    };
    if let Some(discovery) = contributor.pending().filter(|d| d.is_empty()) {
        return Ok(empty_discovery_code(discovery));
    }

    let total = contributor.export(&path)?;
    println!();
    println!(
        "{} {} profile(s) to {}",
        "Exported".green(),
        total,
        path.display()
    );
    println!(
        "To contribute: create an issue at https://github.com/{}/{}/issues and attach this file.",
        config.github.owner, config.github.repo
    );
    Ok(ExitCode::SUCCESS)
}

fn handle_submit(base_dir: &Path, args: &IndigoArgs) -> Result<ExitCode> {
    let config = Config::load(base_dir)?;
    let token = config
        .github_token()
        .ok_or_else(|| CatalogError::MissingCredential {
            what: "GitHub token (set github.token, DEVICE_CATALOG_GITHUB_TOKEN or GITHUB_TOKEN). \
                   Or use `device-catalog export` instead"
                .to_string(),
        })?;
    let github = GitHubClient::new(token, config.upstream())?.with_api_base(&config.github.api_base);

    let Some(contributor) = discover_against_published(&config, args)? else {
        return Ok(ExitCode::FAILURE);
    };
    if let Some(discovery) = contributor.pending().filter(|d| d.is_empty()) {
        return Ok(empty_discovery_code(discovery));
    }

    println!();
    println!("Submitting to {}/{}...", config.github.owner, config.github.repo);
    let outcome = match contributor.submit(&github, today()) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} GitHub submission failed: {}", "[ERROR]".red().bold(), e);
            println!("You can still use 'device-catalog export' and submit manually.");
            return Ok(ExitCode::from(e.exit_code() as u8));
        }
    };

    for file in &outcome.files {
        println!(
            "  {} {}: +{} profile(s)",
            "Updated".green(),
            file.path,
            file.added
        );
    }
    if outcome.skipped > 0 {
        println!(
            "  {} profile(s) already on branch {}",
            outcome.skipped, outcome.branch
        );
    }
    println!();
    match &outcome.pr_url {
        Some(url) => println!("{} {}", "Pull request created:".green().bold(), url),
        None => println!(
            "{} {}:{}",
            "Pull request already open for".green().bold(),
            outcome.fork_owner,
            outcome.branch
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(CatalogError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {}", "Set:".green(), key);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}
