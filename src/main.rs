use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agora::adapters::{LedgerStore, PostgresLedger};
use agora::config::{AppConfig, LoggingConfig};
use agora::engine::{AlertEngine, CycleOrchestrator, DecisionEngine, MetricsEngine, TradeExecutor};
use agora::error::{AgoraError, Result};
use agora::events::EventBus;
use agora::intel::{HttpIntelProvider, IntelProvider};
use agora::providers::ProviderRegistry;

#[derive(Parser)]
#[command(name = "agora", version, about = "Prediction-market trading arena for AI agents")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cycle scheduler until interrupted
    Run,
    /// Execute exactly one trading cycle, then exit
    Cycle,
    /// Print the roster, balances and last cycle
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {}", e);
        }
        return Err(AgoraError::InvalidConfig(errors.join("; ")));
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await,
        Commands::Cycle => run_single_cycle(config).await,
        Commands::Status => show_status(config).await,
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_store(config: &AppConfig) -> Result<Arc<PostgresLedger>> {
    let store = PostgresLedger::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

fn build_orchestrator(config: &AppConfig, store: Arc<dyn LedgerStore>) -> CycleOrchestrator {
    let events = EventBus::default();
    let registry = ProviderRegistry::from_config(&config.providers, config.decision.max_tokens);
    let decisions = DecisionEngine::new(
        registry,
        config.decision.clone(),
        config.risk.max_trade_fraction,
    );
    let metrics = MetricsEngine::new(store.clone());
    let executor = TradeExecutor::new(
        store.clone(),
        metrics,
        config.risk.clone(),
        config.execution.clone(),
    );
    let alerts = AlertEngine::new(store.clone(), events.clone(), config.alerts.clone());
    let intel: Arc<dyn IntelProvider> = Arc::new(HttpIntelProvider::new(config.intel.clone()));

    CycleOrchestrator::new(
        store,
        intel,
        decisions,
        executor,
        alerts,
        events,
        config.agents.clone(),
        config.scheduler.interval_secs,
    )
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let store = connect_store(&config).await?;
    let orchestrator = build_orchestrator(&config, store);

    orchestrator.start().await?;
    info!("press Ctrl-C to stop");
    signal::ctrl_c().await?;

    orchestrator.stop().await;
    info!(
        cycles = orchestrator.current_cycle_number(),
        "shutdown complete"
    );
    Ok(())
}

async fn run_single_cycle(config: AppConfig) -> Result<()> {
    let store = connect_store(&config).await?;
    let orchestrator = build_orchestrator(&config, store);

    // start() runs the first cycle inline; stopping right after leaves
    // exactly one cycle behind
    orchestrator.start().await?;
    orchestrator.stop().await;
    info!(
        cycle = orchestrator.current_cycle_number(),
        "single cycle complete"
    );
    Ok(())
}

async fn show_status(config: AppConfig) -> Result<()> {
    let store = connect_store(&config).await?;

    println!("=== AGORA STATUS ===");
    match store.last_cycle().await? {
        Some(cycle) => {
            println!(
                "Cycle #{} [{}] markets: {} | trades: {} | errors: {}",
                cycle.cycle_number,
                cycle.status,
                cycle.stats.markets_processed,
                cycle.stats.trades_executed,
                cycle.stats.errors
            );
        }
        None => println!("No cycles recorded yet"),
    }

    println!("\nAgents:");
    for agent in store.list_agents().await? {
        let metrics = store.latest_metrics(agent.id).await?;
        let (pnl, trades) = metrics
            .map(|m| (m.net_pnl.to_string(), m.total_trades))
            .unwrap_or_else(|| ("0".to_string(), 0));
        println!(
            "  {:<20} [{}] capital ${} (start ${}) | net PnL ${} | trades {}{}",
            agent.name,
            agent.model,
            agent.current_capital,
            agent.initial_capital,
            pnl,
            trades,
            if agent.active { "" } else { " (inactive)" }
        );
    }

    let unread = store.list_alerts(true).await?;
    println!("\nUnread alerts: {}", unread.len());
    for alert in unread.iter().take(10) {
        println!("  [{}] {}: {}", alert.severity, alert.title, alert.message);
    }

    Ok(())
}
