//! archivist CLI entry point

use archivist::{
    commands::{
        cmd_add_target, cmd_export, cmd_fleet_list, cmd_init, cmd_list_targets, cmd_remove_target,
        cmd_rescan, cmd_reset_settings, cmd_set_setting, cmd_status, cmd_sweep, cmd_sync,
        cmd_watch, export_fleet, print_export_stats, print_fleet, print_pass_summary,
        print_rescan_stats, print_settings, print_status, print_sweep_summary, print_targets,
        FleetExportFormat,
    },
    config::Config,
    error::{Error, Result},
    progress::BarSafeWriterFactory,
    registry::RegistryDb,
    source::HttpSource,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Mirror remote channel/group history into local archives", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize archivist configuration and registry
    Init {
        /// Base directory for archivist data (defaults to ~/.archivist)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage watched targets
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },

    /// Run one ingestion pass
    Sync {
        /// Only sync this target id (all registered targets if omitted)
        #[arg(long)]
        target: Option<String>,
    },

    /// Poll registered targets continuously until Ctrl-C
    Watch,

    /// Fleet-wide operations over every account-visible target
    Fleet {
        #[command(subcommand)]
        action: FleetAction,
    },

    /// Regenerate CSV/JSON snapshots for one or all targets
    Export {
        /// Only export this target id
        #[arg(long)]
        target: Option<String>,
    },

    /// Retry unresolved media downloads for a target
    Rescan {
        /// Target id to re-scan
        target: String,
    },

    /// Read or update persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// Resolve and register a target (id or @username)
    Add {
        /// Target reference: canonical id, bare numeric id, or @username
        reference: String,
    },

    /// Unregister a target (its archive stays on disk)
    Remove {
        /// Target id to remove
        id: String,
    },

    /// List registered targets with cursors and stored counts
    List,
}

#[derive(Subcommand)]
enum FleetAction {
    /// Harvest membership from every visible target, rate limited
    Sweep,

    /// List every visible target with member counts
    List {
        /// Also write the listing to a file in this format
        #[arg(long, value_enum)]
        export: Option<FleetExportFormat>,

        /// Output path for --export (defaults to target_list.<ext>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show current settings
    Show,

    /// Set one setting (dotted key, e.g. sweep.batch_size)
    Set { key: String, value: String },

    /// Reset all settings to defaults
    Reset,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(BarSafeWriterFactory::default()))
        .with(filter)
        .init();

    // Init and completions work without an existing config
    match &cli.command {
        Commands::Init { base_dir, force } => {
            cmd_init(base_dir.clone(), *force).await?;
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "archivist", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    // Load configuration
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => {
            let config = Config::load_from(None)?;
            if !config.paths.config_file.exists() {
                return Err(Error::NotInitialized);
            }
            config
        }
    };

    // Initialize components
    let registry = RegistryDb::new(&config.paths.registry_file).await?;
    let source = HttpSource::new(&config.gateway)?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Target { action } => match action {
            TargetAction::Add { reference } => {
                let (id, added) = cmd_add_target(&registry, &source, &reference).await?;
                if added {
                    println!("Added target {}", id);
                } else {
                    println!("Target {} is already registered", id);
                }
            }
            TargetAction::Remove { id } => {
                cmd_remove_target(&registry, &id).await?;
                println!("Removed target {} (archive left on disk)", id);
            }
            TargetAction::List => {
                let targets = cmd_list_targets(&config, &registry).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&targets)?);
                } else {
                    print_targets(&targets);
                }
            }
        },

        Commands::Sync { target } => {
            let summary = cmd_sync(&config, &registry, &source, target.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_pass_summary(&summary);
            }
        }

        Commands::Watch => {
            cmd_watch(&config, &registry, &source).await?;
        }

        Commands::Fleet { action } => match action {
            FleetAction::Sweep => {
                let summary = cmd_sweep(&config, &source).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    print_sweep_summary(&summary);
                }
            }
            FleetAction::List { export, output } => {
                let listing = cmd_fleet_list(&source).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&listing)?);
                } else {
                    print_fleet(&listing);
                }
                if let Some(format) = export {
                    let path = output.unwrap_or_else(|| {
                        PathBuf::from(match format {
                            FleetExportFormat::Csv => "target_list.csv",
                            FleetExportFormat::Txt => "target_list.txt",
                        })
                    });
                    export_fleet(&listing.entries, format, &path)?;
                    println!("\nListing written to {}", path.display());
                }
            }
        },

        Commands::Export { target } => {
            let results = cmd_export(&config, &registry, target.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_export_stats(&results);
            }
        }

        Commands::Rescan { target } => {
            let stats = cmd_rescan(&config, &registry, &source, &target).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_rescan_stats(&target, &stats);
            }
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    print_settings(&config);
                }
            }
            SettingsAction::Set { key, value } => {
                cmd_set_setting(&mut config, &key, &value).await?;
            }
            SettingsAction::Reset => {
                cmd_reset_settings(&mut config).await?;
            }
        },

        Commands::Status => {
            let status = cmd_status(&config, &registry, &source).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}
