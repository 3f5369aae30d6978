use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fleet_pooling::config::EnvironmentConfig;
use fleet_pooling::fixtures::{generate_demo_dataset, DemoOptions};
use fleet_pooling::models::OptimizationType;
use fleet_pooling::services::batch_runner::{BatchRequest, BatchRunner};
use fleet_pooling::services::valhalla_service::{HaversineRouter, RoutingProvider, ValhallaService};
use fleet_pooling::store::memory::InMemoryStore;
use fleet_pooling::store::postgres::PgStore;
use fleet_pooling::store::EntityStore;
use fleet_pooling::utils::clock::SystemClock;

#[derive(Parser)]
#[command(name = "fleet_pooling", about = "Collaborative nightly trip optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Corre el batch de optimización para un día
    Optimize {
        /// Día objetivo (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Limita la corrida a una empresa (requerido en single_company)
        #[arg(long)]
        company_id: Option<Uuid>,
        /// cross_company | single_company
        #[arg(long = "type", default_value = "cross_company")]
        optimization_type: String,
        /// Dataset JSON; por defecto DATASET_PATH o dataset.json
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// No llamar al motor de rutas: distancias por haversine
        #[arg(long)]
        offline: bool,
    },
    /// Genera un dataset de demo
    Seed {
        #[arg(long, default_value = "dataset.json")]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        companies: usize,
        #[arg(long, default_value_t = 12)]
        trips: usize,
        /// Día de los viajes generados (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = EnvironmentConfig::default();
    config.validate()?;

    match cli.command {
        Command::Optimize {
            date,
            company_id,
            optimization_type,
            dataset,
            offline,
        } => {
            let optimization_type = OptimizationType::from_code(&optimization_type)
                .ok_or_else(|| anyhow::anyhow!("unknown optimization type: {}", optimization_type))?;

            let store: Arc<dyn EntityStore> = match &config.database_url {
                Some(url) => {
                    info!("using Postgres entity store");
                    Arc::new(PgStore::connect(url).await?)
                }
                None => {
                    let path = dataset.unwrap_or_else(|| PathBuf::from(&config.dataset_path));
                    info!("using JSON dataset store: {:?}", path);
                    Arc::new(InMemoryStore::load_dataset_file(&path).await?)
                }
            };

            let routing: Arc<dyn RoutingProvider> = if offline {
                Arc::new(HaversineRouter)
            } else {
                Arc::new(ValhallaService::new(
                    config.routing_base_url.clone(),
                    config.routing_timeout_s,
                ))
            };

            let runner = BatchRunner::new(store, routing, Arc::new(SystemClock), config);
            let request = BatchRequest {
                date,
                optimization_type,
                company_id,
            };

            match runner.run(request).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    error!("optimization batch failed: {}", e);
                    Ok(ExitCode::from(2))
                }
            }
        }
        Command::Seed {
            output,
            companies,
            trips,
            date,
            seed,
        } => {
            let dataset = generate_demo_dataset(&DemoOptions {
                companies,
                trips,
                date,
                seed,
            });
            tokio::fs::write(&output, serde_json::to_string_pretty(&dataset)?).await?;
            info!(
                "✅ wrote demo dataset with {} companies, {} vehicles, {} trips to {:?}",
                dataset.companies.len(),
                dataset.vehicles.len(),
                dataset.trips.len(),
                output
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
