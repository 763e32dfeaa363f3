mod render;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use viewlineage_catalog::{SnowflakeDriverBuilder, WarehouseDriver};
use viewlineage_core::{Config, LineageReport, WarehouseConfig};
use viewlineage_engine::Session;
use viewlineage_oracle::{ChatCompletionsClient, OracleCredential, OracleSourceExtractor, SourceExtractor};

/// viewlineage - view lineage discovery for Snowflake
#[derive(Parser)]
#[command(name = "viewlineage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: viewlineage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the oracle key and the warehouse connection
    Check,

    /// List databases visible to the session
    Databases,

    /// List schemas in a database
    Schemas {
        database: String,
    },

    /// List tables and views in a schema
    Objects {
        database: String,
        schema: String,
    },

    /// Build the lineage tree of a view or table
    Lineage {
        database: String,
        schema: String,
        object: String,

        /// Maximum depth below the root (default from config)
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format on stdout
        #[arg(short, long, value_enum, default_value_t = Format::Tree)]
        format: Format,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Tree,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    let session = connect(&config, cli.verbose).await?;

    match cli.command {
        Commands::Check => {
            println!("{}", "✓ Oracle key and warehouse connection are valid".green());
            Ok(())
        }
        Commands::Databases => {
            print_names("Databases", &session.list_databases().await?);
            Ok(())
        }
        Commands::Schemas { database } => {
            print_names(&format!("Schemas in {}", database), &session.list_schemas(&database).await?);
            Ok(())
        }
        Commands::Objects { database, schema } => {
            objects_command(&session, &database, &schema).await
        }
        Commands::Lineage {
            database,
            schema,
            object,
            max_depth,
            output,
            format,
        } => {
            lineage_command(
                &session,
                (&database, &schema, &object),
                max_depth,
                output.as_deref(),
                format,
                cli.verbose,
            )
            .await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new("viewlineage.toml").exists() {
        Config::from_file(Path::new("viewlineage.toml"))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if verbose {
        eprintln!(
            "{} model {} at {}, max depth {}",
            "Using".cyan(),
            config.oracle.model,
            config.oracle.base_url,
            config.lineage.max_depth
        );
    }

    Ok(config)
}

/// Build the driver and extractor from config and open a validated session
async fn connect(config: &Config, verbose: bool) -> Result<Session> {
    let credential = OracleCredential::from_env(&config.oracle.api_key_env)?;

    let client = ChatCompletionsClient::from_settings(&config.oracle)?;
    let extractor: Arc<dyn SourceExtractor> =
        Arc::new(OracleSourceExtractor::with_settings(client, &config.oracle));

    let warehouse = config.warehouse.clone().unwrap_or_default();
    let driver = build_driver(&warehouse)?;

    if verbose {
        eprintln!("{} {}...", "Connecting to".cyan(), driver.name());
    }

    let session = Session::connect(driver, extractor, credential, config.lineage.clone()).await?;

    if verbose {
        eprintln!("{}", "✓ Connection successful".green());
    }

    Ok(session)
}

fn build_driver(warehouse: &WarehouseConfig) -> Result<Arc<dyn WarehouseDriver>> {
    match warehouse.warehouse_type.to_lowercase().as_str() {
        "snowflake" => {
            let account = warehouse
                .setting_or_env("account", "SNOWFLAKE_ACCOUNT")
                .ok_or_else(|| anyhow::anyhow!("Snowflake requires 'account' (or SNOWFLAKE_ACCOUNT)"))?;
            let username = warehouse
                .setting_or_env("username", "SNOWFLAKE_USER")
                .ok_or_else(|| anyhow::anyhow!("Snowflake requires 'username' (or SNOWFLAKE_USER)"))?;

            let mut builder = if let Some(key_path) =
                warehouse.setting_or_env("private_key_path", "SNOWFLAKE_PRIVATE_KEY_PATH")
            {
                let pem = std::fs::read_to_string(&key_path)
                    .map_err(|e| anyhow::anyhow!("Failed to read private key {}: {}", key_path, e))?;
                SnowflakeDriverBuilder::with_key_pair(account, username, pem)
            } else {
                let password = warehouse
                    .setting_or_env("password", "SNOWFLAKE_PASSWORD")
                    .ok_or_else(|| anyhow::anyhow!("Snowflake requires 'password' (or SNOWFLAKE_PASSWORD)"))?;
                SnowflakeDriverBuilder::with_password(account, username, password)
            };

            if let Some(wh) = warehouse.setting_or_env("warehouse", "SNOWFLAKE_WAREHOUSE") {
                builder = builder.with_warehouse(wh);
            }
            if let Some(role) = warehouse.setting_or_env("role", "SNOWFLAKE_ROLE") {
                builder = builder.with_role(role);
            }
            if let Some(database) = warehouse.setting_or_env("database", "SNOWFLAKE_DATABASE") {
                builder = builder.with_database(database);
            }

            Ok(Arc::new(builder.build()?))
        }
        other => Err(anyhow::anyhow!(
            "Unsupported warehouse type '{}'. Supported: snowflake",
            other
        )),
    }
}

fn print_names(title: &str, names: &[String]) {
    println!("{} ({})", title.bold(), names.len());
    for name in names {
        println!("  {}", name);
    }
}

async fn objects_command(session: &Session, database: &str, schema: &str) -> Result<()> {
    let objects = session.list_objects(database, schema).await?;

    println!("{} ({})", format!("Objects in {}.{}", database, schema).bold(), objects.len());
    for object in &objects {
        let kind = object.kind.as_str();
        let kind = if kind == "VIEW" { kind.cyan() } else { kind.green() };
        println!("  {:<6} {}", kind, object.name);
    }

    Ok(())
}

async fn lineage_command(
    session: &Session,
    (database, schema, object): (&str, &str, &str),
    max_depth: Option<usize>,
    output: Option<&Path>,
    format: Format,
    verbose: bool,
) -> Result<()> {
    if verbose {
        eprintln!("{} {}.{}.{}...", "Resolving lineage of".cyan(), database, schema, object);
    }

    let report = session.resolve_lineage(database, schema, object, max_depth).await;

    if let Some(path) = output {
        report.save_to_file(path)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    match format {
        Format::Json => println!("{}", report.lineage.to_json()?),
        Format::Tree => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &LineageReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Lineage of".bold().bright_blue(), report.root.bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    print!("{}", render::render_tree(&report.lineage, true));

    println!();
    println!("{}", render::summarize(&report.lineage));
    println!(
        "{} objects resolved, {} oracle calls, {} tokens, max depth {}",
        report.stats.nodes_resolved, report.stats.oracle_calls, report.stats.tokens_used, report.max_depth
    );

    if report.stats.truncated {
        println!(
            "{}",
            "⚠ Traversal budget exhausted; some branches are TRUNCATED".yellow().bold()
        );
    }

    println!("{}", "=".repeat(60).bright_blue());
}
