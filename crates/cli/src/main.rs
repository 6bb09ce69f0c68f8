//! CLI for the World Development Indicators dashboard backend.

mod export;
mod output;
mod server;

use clap::{Parser, Subcommand};
use output::{render_points, render_rows, render_wide, OutputFormat};
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wdi_db::{
    pivot_wide, CountryCode, DbConfig, DbPool, IndicatorQuery, IndicatorRepository,
    SqliteIndicatorRepository, WdiWriter, YearRange,
};
use wdi_ingestion::api_client::DEFAULT_BASE_URL;
use wdi_ingestion::loader::{DEFAULT_COUNTRIES, DEFAULT_END_YEAR, DEFAULT_START_YEAR};
use wdi_ingestion::{LoadConfig, Loader, RetryPolicy, WorldBankClient};
use wdi_telemetry::{init_logging, Metrics};

#[derive(Parser)]
#[command(name = "wdi")]
#[command(about = "World Bank indicator store and dashboard API")]
struct Cli {
    /// Database path or sqlite: URL
    #[arg(long, global = true, env = "WDI_DATABASE_URL", default_value = "wdi.db")]
    database_path: String,

    /// Log level or filter directive
    #[arg(long, global = true, env = "WDI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, global = true, default_value = "5")]
    max_connections: u32,

    /// Per-statement timeout in seconds (0 disables it)
    #[arg(long, global = true, default_value = "30")]
    statement_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Download indicators from the World Bank API into the database
    Load {
        /// First year to download
        #[arg(long, default_value_t = DEFAULT_START_YEAR)]
        start_year: i32,

        /// Last year to download
        #[arg(long, default_value_t = DEFAULT_END_YEAR)]
        end_year: i32,

        /// ISO3 country codes, comma-separated
        #[arg(
            long,
            value_delimiter = ',',
            default_values_t = DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect::<Vec<_>>()
        )]
        countries: Vec<String>,

        /// Pause between indicators in milliseconds
        #[arg(long, default_value = "100")]
        pause_ms: u64,

        /// World Bank API root
        #[arg(long, env = "WDI_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
        api_base_url: String,

        /// Append one JSON line per indicator and per run to this file
        #[arg(long, env = "WDI_AUDIT_PATH")]
        audit_path: Option<PathBuf>,
    },
    /// Fetch one indicator for a set of countries and years
    Fetch {
        /// ISO3 country codes, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        countries: Vec<String>,

        /// Indicator code, e.g. NY.GDP.MKTP.CD
        #[arg(long)]
        indicator: String,

        /// First year (inclusive)
        #[arg(long)]
        from: i32,

        /// Last year (inclusive)
        #[arg(long)]
        to: i32,

        /// Leave out years without a value
        #[arg(long)]
        drop_missing: bool,

        /// Pivot to one column per country
        #[arg(long)]
        wide: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List countries
    Countries {
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },
    /// List indicator metadata
    Indicators {
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },
    /// Print non-null observation counts per country and indicator
    Summary {
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },
    /// Write CSV files and an Excel workbook of metadata and observations
    Export {
        /// Output file prefix
        #[arg(long, default_value = "worldbank_wdi_mercosur_chile")]
        out_prefix: String,
    },
    /// Serve the JSON API for the dashboard front end
    Serve {
        /// Bind address
        #[arg(long, env = "WDI_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let writable = matches!(cli.command, Commands::Migrate | Commands::Load { .. });
    let config = DbConfig {
        max_connections: cli.max_connections,
        statement_timeout: (cli.statement_timeout_secs > 0)
            .then(|| Duration::from_secs(cli.statement_timeout_secs)),
        create_if_missing: writable,
        ..DbConfig::default()
    };
    let db = DbPool::with_config(&cli.database_path, config).await?;
    let metrics = Metrics::new()?;
    let repo = SqliteIndicatorRepository::new(db.clone()).with_metrics(metrics.clone());

    match cli.command {
        Commands::Migrate => db.migrate().await?,
        Commands::Load {
            start_year,
            end_year,
            countries,
            pause_ms,
            api_base_url,
            audit_path,
        } => {
            db.migrate().await?;
            let countries = countries
                .iter()
                .map(|c| c.parse::<CountryCode>())
                .collect::<Result<Vec<_>, _>>()?;
            let years = YearRange::new(start_year, end_year)?;
            let mut load_config = LoadConfig::new(countries, years);
            load_config.pause = Duration::from_millis(pause_ms);
            load_config.audit_path = audit_path;

            let client =
                WorldBankClient::new(&api_base_url, RetryPolicy::default(), metrics.clone())?;
            let loader = Loader::new(client, WdiWriter::new(db.clone()), metrics, load_config);
            let report = loader.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Fetch {
            countries,
            indicator,
            from,
            to,
            drop_missing,
            wide,
            format,
        } => {
            let query =
                IndicatorQuery::new(&countries, &indicator, from, to)?.drop_missing(drop_missing);
            let points = repo.fetch(&query).await?;
            let rendered = if wide {
                render_wide(&pivot_wide(&points), format)?
            } else {
                render_points(&points, format)?
            };
            print!("{}", rendered);
        }
        Commands::Countries { format } => {
            print!("{}", render_rows(&repo.countries().await?, format)?);
        }
        Commands::Indicators { format } => {
            print!("{}", render_rows(&repo.indicators().await?, format)?);
        }
        Commands::Summary { format } => {
            print!("{}", render_rows(&repo.summary_counts().await?, format)?);
        }
        Commands::Export { out_prefix } => {
            export::export(&repo, &out_prefix).await?;
        }
        Commands::Serve { bind } => {
            let state = AppState {
                repo: Arc::new(repo),
                metrics,
            };
            server::serve(&bind, state).await?;
        }
    }

    db.close().await;
    Ok(())
}
