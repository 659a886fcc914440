//! dbsettings - inspect database connection settings resolution
//!
//! Usage:
//!     dbsettings --config dbsettings.toml resolve Orders Billing
//!     dbsettings list --json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbsettings::{
    ConnectionSource, ConnectionStringBuilder, ConnectionStrings, DbSettingsConfig,
    RegistryOptions, SettingsRegistry,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod output;

use output::{render_json, render_table, SettingsRow};

const DEFAULT_LOG_FILTER: &str = "dbsettings=info";

#[derive(Parser, Debug)]
#[command(name = "dbsettings", about = "Resolve database connection settings")]
struct Cli {
    /// Config file (defaults to $DBSETTINGS_CONFIG, then ./dbsettings.toml)
    #[arg(short, long, global = true, env = "DBSETTINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Fail instead of falling back to an embedded database file
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one or more logical database names
    Resolve {
        /// Logical database names
        #[arg(required = true)]
        names: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Print passwords instead of masking them
        #[arg(long)]
        show_secrets: bool,
    },

    /// Register settings, then resolve names against the updated registry
    Register {
        name: String,
        connection_string: String,
        provider_name: String,

        /// Names to resolve after registering (defaults to NAME)
        #[arg(long = "resolve")]
        resolve: Vec<String>,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        show_secrets: bool,
    },

    /// Resolve every configured name and list the registry contents
    List {
        #[arg(long)]
        json: bool,

        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate the config file and report how unconfigured names will resolve
    Check,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dbsettings=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config =
        DbSettingsConfig::discover(cli.config.as_deref()).context("Failed to load config")?;
    if cli.strict {
        config.registry.strict = true;
    }
    info!(
        entries = config.connection_strings.len(),
        template = %config.registry.template,
        strict = config.registry.strict,
        "Configuration loaded"
    );

    if let Commands::Check = cli.command {
        return check(&config.connection_strings, &config.registry);
    }

    let configured: Vec<String> = config.connection_strings.names().map(String::from).collect();
    let registry = SettingsRegistry::with_options(config.connection_strings, config.registry);

    let (names, json, show_secrets) = match cli.command {
        Commands::Resolve {
            names,
            json,
            show_secrets,
        } => (names, json, show_secrets),
        Commands::Register {
            name,
            connection_string,
            provider_name,
            resolve,
            json,
            show_secrets,
        } => {
            registry
                .register(name.clone(), connection_string, provider_name)
                .with_context(|| format!("Failed to register '{}'", name))?;
            let names = if resolve.is_empty() { vec![name] } else { resolve };
            (names, json, show_secrets)
        }
        Commands::List { json, show_secrets } => (configured, json, show_secrets),
        Commands::Check => return Ok(()),
    };

    print_resolved(&registry, &names, json, show_secrets)
}

fn print_resolved(
    registry: &SettingsRegistry<ConnectionStrings>,
    names: &[String],
    json: bool,
    show_secrets: bool,
) -> Result<()> {
    for name in names {
        registry
            .resolve(name)
            .with_context(|| format!("Failed to resolve '{}'", name))?;
    }

    let mut rows: Vec<SettingsRow> = registry
        .snapshot()
        .iter()
        .map(|entry| SettingsRow::from_entry(entry, show_secrets))
        .collect();

    if json {
        println!("{}", render_json(&mut rows)?);
    } else {
        println!("{}", render_table(&mut rows));
    }
    Ok(())
}

fn check(entries: &ConnectionStrings, options: &RegistryOptions) -> Result<()> {
    let mut problems = 0;

    for (name, entry) in entries.iter() {
        if entry.provider_name == options.primary_provider {
            if let Err(e) = ConnectionStringBuilder::parse(&entry.connection_string) {
                println!("✗ {}: {}", name, e);
                problems += 1;
                continue;
            }
        }
        println!("✓ {} [{}]", name, entry.provider_name);
    }

    match entries.lookup(&options.template) {
        Some(template) if template.provider_name == options.primary_provider => {
            match dbsettings::registry::derive_server_connection(
                &options.template,
                &template.connection_string,
                "<name>",
            ) {
                Ok(example) => println!(
                    "Unconfigured names derive from '{}': {}",
                    options.template,
                    output::redact_password(&example)
                ),
                Err(e) => {
                    println!("✗ {}", e);
                    problems += 1;
                }
            }
        }
        Some(template) => {
            println!(
                "Template '{}' uses provider '{}', not '{}'",
                options.template, template.provider_name, options.primary_provider
            );
            if options.strict {
                problems += 1;
            } else {
                println!(
                    "Unconfigured names fall back to <name>.{} via {}",
                    options.embedded_extension, options.embedded_provider
                );
            }
        }
        None => {
            println!("No template entry '{}'", options.template);
            if options.strict {
                problems += 1;
            } else {
                println!(
                    "Unconfigured names fall back to <name>.{} via {}",
                    options.embedded_extension, options.embedded_provider
                );
            }
        }
    }

    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    Ok(())
}
