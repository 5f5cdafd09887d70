use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{debug, info};

use crate::dashboard;
use crate::data::configuration::Configuration;
use crate::data::dbconnector::{EcoDBConnection, SQLConnector};
use crate::recorder::CollectionRecorder;
use crate::server;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from("configuration.toml"))]
    configuration_path: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Overrides `server.port` from the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Rebuild stored aggregates from collection records
    Reconcile {
        /// Only this household
        #[arg(long)]
        qr: Option<String>,
        /// Recount households for this ward instead
        #[arg(long, conflicts_with = "qr")]
        ward: Option<String>,
    },
    /// Print dashboard statistics as JSON
    Stats,
}

pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    debug!("Configuration path: {}", args.configuration_path);
    let config = Configuration::load(&args.configuration_path)?;
    debug!("Loaded configuration: {config:?}");
    // Check the database connection
    let mut db_connector = SQLConnector::new(&config.database.path);
    db_connector.connect().await?;
    db_connector.check().await?;
    // Has database been initialised ?
    if db_connector.is_initialized().await? {
        info!("Database is initialized");
    } else {
        info!("Database is not initialized, performing initialization");
        db_connector.initialize(&config).await?;
    }

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            server::run(config, db_connector, port).await
        }
        Command::Reconcile { qr, ward } => {
            let result = reconcile(&config, &db_connector, qr, ward).await;
            db_connector.close().await?;
            result
        }
        Command::Stats => {
            let dashboard = dashboard::load_dashboard(
                &db_connector,
                &config.dashboard,
                Local::now().date_naive(),
                &Local,
            )
            .await;
            db_connector.close().await?;
            println!("{}", serde_json::to_string_pretty(&dashboard?)?);
            Ok(())
        }
    }
}

async fn reconcile(
    config: &Configuration,
    db_connector: &SQLConnector,
    qr: Option<String>,
    ward: Option<String>,
) -> anyhow::Result<()> {
    let recorder = CollectionRecorder::new(db_connector, &config.recorder);
    if let Some(qr) = qr {
        let reconciliation = recorder
            .reconcile_household(&qr)
            .await
            .with_context(|| format!("failed to reconcile household {qr}"))?;
        println!("{}", serde_json::to_string_pretty(&reconciliation)?);
    } else if let Some(ward) = ward {
        let census = recorder
            .reconcile_ward(&ward)
            .await
            .with_context(|| format!("failed to recount ward {ward}"))?;
        println!("{}", serde_json::to_string_pretty(&census)?);
    } else {
        let report = recorder.reconcile_all().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
