//! Process entry point: parses the CLI, loads configuration, opens the
//! relational store, and either serves the Control Plane or runs a
//! single operator diagnostic.

use std::sync::Arc;

use clap::Parser;

use wafleet::cli::{Cli, Commands};
use wafleet::config;
use wafleet::container::ContainerStore;
use wafleet::control_plane::{self, ControlPlaneState};
use wafleet::credentials;
use wafleet::db;
use wafleet::engine::{Engine, RegisterRequest, RegistrationOutcome};
use wafleet::logging;
use wafleet::pairing;
use wafleet::supervisor::Supervisor;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("startup misconfigured: {e}");
            std::process::exit(1);
        }
    };

    let _guard = logging::init(cfg.logging.dir.as_deref());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cfg, cli.command))
}

async fn run(cfg: config::Config, command: Commands) -> anyhow::Result<()> {
    let production = std::env::var("WAFLEET_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let pool = match db::connect(&cfg, production).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to the relational store");
            std::process::exit(1);
        }
    };

    let current_tenant = cfg.tenancy.resolve_default_tenant_name();
    db::repository::tenant::ensure_exists(&pool, &current_tenant, cfg.tenancy.default_bot_count)
        .await?;
    db::repository::tenant::reconcile_counts(&pool).await?;

    let containers = ContainerStore::new(config::wafleet_home().join("auth"));
    let ledger_path = config::wafleet_home().join("failure_ledger.json");
    let supervisor = Arc::new(Supervisor::new(pool.clone(), containers.clone(), ledger_path).await);
    let engine = Arc::new(Engine::new(pool.clone(), containers.clone(), supervisor.clone()));

    match command {
        Commands::Serve => serve(cfg, pool, containers, supervisor, engine, current_tenant).await,
        Commands::Register {
            bot_name,
            session_string,
            phone,
            target_tenant,
        } => {
            let req = RegisterRequest {
                display_name: bot_name,
                wire_or_blob: session_string,
                caller_phone: phone,
                target_tenant,
                features: Default::default(),
                is_guest: false,
                discover_existing: true,
            };
            match engine.register(&current_tenant, req).await {
                Ok(RegistrationOutcome::NewRegistration(bot)) => {
                    println!("registered bot {} on tenant {}", bot.id, bot.tenant);
                    Ok(())
                }
                Ok(RegistrationOutcome::ExistingBotFound(bot)) => {
                    println!("existing bot found: {} on tenant {}", bot.id, bot.tenant);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("registration failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Approve { bot_id, months } => match engine.approve(bot_id, months).await {
            Ok(()) => {
                println!("bot {bot_id} approved for {months} months");
                Ok(())
            }
            Err(e) => {
                eprintln!("approval failed: {e}");
                std::process::exit(1);
            }
        },
        Commands::Migrate {
            bot_id,
            target_tenant,
        } => match engine.migrate(bot_id, &target_tenant).await {
            Ok(()) => {
                println!("bot {bot_id} migrated to {target_tenant}");
                Ok(())
            }
            Err(e) => {
                eprintln!("migration failed: {e}");
                std::process::exit(1);
            }
        },
        Commands::PairingCode { phone } => {
            match pairing::generate_pairing_code(&containers, &phone).await {
                Ok(outcome) => {
                    println!("pairing code for {}: {}", outcome.phone, outcome.code);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("pairing failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::LegacyChecksum { root } => {
            let root = root
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| config::wafleet_home().join("auth"));
            match credentials::legacy::scan_containers(&root) {
                Ok(found) => {
                    for entry in found {
                        println!("{}: {:08x}", entry.path.display(), entry.checksum);
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("scan failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Resumes every active tenant's approved bots, serves the Control
/// Plane, and stops every worker cleanly on `ctrl_c`.
async fn serve(
    cfg: config::Config,
    pool: sqlx::PgPool,
    containers: ContainerStore,
    supervisor: Arc<Supervisor>,
    engine: Arc<Engine>,
    current_tenant: String,
) -> anyhow::Result<()> {
    for tenant in db::repository::tenant::list_active(&pool).await? {
        supervisor.resume_tenant(&tenant.name).await;
    }

    let sweep_engine = engine.clone();
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXPIRATION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_engine.sweep_expirations().await {
                tracing::error!(error = %e, "expiration sweep failed");
            }
        }
    });

    let state = ControlPlaneState {
        engine,
        supervisor: supervisor.clone(),
        containers,
        current_tenant,
    };

    let control_plane_cfg = cfg.control_plane.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = control_plane::serve(state, &control_plane_cfg).await {
            tracing::error!(error = %e, "control plane exited with an error");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping all workers");
    supervisor.stop_all().await;
    server.abort();
    sweeper.abort();

    Ok(())
}

const EXPIRATION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);
