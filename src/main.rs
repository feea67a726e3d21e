//! orgsync CLI
//!
//! Entry point for the `orgsync` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use orgsync::mock::InMemoryProvider;
use orgsync::settings::{default_settings_path, Settings};
use orgsync::sync::{sort_operations, Category, DriftPolicy, SyncError, SyncSummary};
use orgsync::{load_effective_config, logging, push_from_root, FsIncludeLoader, SyncOptions};
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "orgsync")]
#[command(about = "Sync declarative org configuration to a tenant", version)]
struct Cli {
    /// Settings file (default: $ORGSYNC_SETTINGS or ~/.config/orgsync/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration of a root document and its includes
    Render {
        /// Root config document
        root: String,

        /// Prefix the output with the contributing documents and their digests
        #[arg(long)]
        sources: bool,
    },

    /// Reconcile a root document against a tenant state snapshot
    Push {
        /// Root config document
        root: String,

        /// Compute operations without applying them
        #[arg(long)]
        dry_run: bool,

        /// Remove remote elements missing from the config
        #[arg(long)]
        force: bool,

        /// Tenant state snapshot (default: settings `state_file`)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Restrict the push to these categories (repeatable)
        #[arg(long = "only", value_name = "CATEGORY")]
        only: Vec<Category>,

        /// What to do with same-named elements whose content differs
        #[arg(long)]
        drift: Option<DriftPolicy>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the effective tool settings and where they came from
    Settings,
}

fn main() {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Push { state, only, drift, .. } => push_overrides(state, only, drift),
        _ => None,
    };
    let settings_path = cli.settings.clone().or_else(default_settings_path);
    let settings = match Settings::build(settings_path.as_deref(), overrides) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };
    logging::init(cli.verbose, &settings.resolved.log_level);

    match cli.command {
        Commands::Render { root, sources } => run_render(&root, sources),
        Commands::Push {
            root,
            dry_run,
            force,
            json,
            ..
        } => run_push(&root, &settings, dry_run, force, json),
        Commands::Settings => run_settings(&settings),
    }
}

fn push_overrides(
    state: &Option<PathBuf>,
    only: &[Category],
    drift: &Option<DriftPolicy>,
) -> Option<serde_json::Value> {
    let mut overrides = serde_json::Map::new();
    if let Some(path) = state {
        overrides.insert("state_file".to_string(), json!(path));
    }
    if !only.is_empty() {
        overrides.insert("categories".to_string(), json!(only));
    }
    if let Some(drift) = drift {
        overrides.insert("drift".to_string(), json!(drift));
    }
    if overrides.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(overrides))
    }
}

fn run_render(root: &str, show_sources: bool) {
    let effective = match load_effective_config(root, &FsIncludeLoader::current_dir()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if show_sources {
        for source in &effective.sources {
            println!("# {} sha256:{}", source.id, source.digest);
        }
    }
    match effective.config.to_yaml() {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(1);
        }
    }
}

fn run_push(root: &str, settings: &Settings, dry_run: bool, force: bool, json_output: bool) {
    let resolved = &settings.resolved;
    let mut provider = match InMemoryProvider::load(&resolved.state_file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading state: {}", e);
            process::exit(1);
        }
    };

    let options = resolved
        .categories
        .iter()
        .fold(SyncOptions::new(), |options, category| options.with_category(*category))
        .dry_run(dry_run)
        .force(force)
        .with_drift(resolved.drift);

    let result = push_from_root(&mut provider, root, &options);

    let reached_remote = !matches!(
        result,
        Err(SyncError::Config(_) | SyncError::InvalidConfig(_) | SyncError::NoCategoriesSelected)
    );
    if !dry_run && reached_remote {
        if let Err(e) = provider.save(&resolved.state_file) {
            error!(error = %e, "failed to save state");
            process::exit(1);
        }
        info!(path = %resolved.state_file.display(), "state saved");
    }

    let (mut operations, failures) = match result {
        Ok(ops) => (ops, Vec::new()),
        Err(SyncError::RemoteMutation { failures, operations }) => (operations, failures),
        Err(e) => {
            error!(error = %e, "push failed");
            eprintln!("Push failed: {}", e);
            process::exit(e.exit_code());
        }
    };
    sort_operations(&mut operations);
    let summary = SyncSummary::from_operations(&operations);

    if json_output {
        let output = json!({
            "dry_run": dry_run,
            "force": force,
            "operations": operations,
            "summary": summary,
            "failures": failures.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for op in &operations {
            println!("{}", op);
        }
        println!();
        println!("{}{}", if dry_run { "[dry-run] " } else { "" }, summary);
    }

    if !failures.is_empty() {
        for failure in &failures {
            warn!(%failure, "mutation failed");
            eprintln!("Failed: {}", failure);
        }
        eprintln!("Push incomplete: {} mutation(s) failed", failures.len());
        process::exit(3);
    }
}

fn run_settings(settings: &Settings) {
    match settings.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing settings: {}", e);
            process::exit(1);
        }
    }
}
