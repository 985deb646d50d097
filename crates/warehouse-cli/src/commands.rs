use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use warehouse_ledger::{InMemoryStockStore, PgStockStore, StockLedger, SCHEMA};
use warehouse_server::{ServerConfig, WarehouseServer};

use crate::cli::*;
use crate::logging;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => {
            if let Some(port) = args.port {
                config.http_port = port;
            }
            logging::init(config.log_path.as_deref(), cli.verbose)?;
            cmd_serve(config, args).await
        }
        Command::Config => cmd_config(&config, &cli.format),
        Command::Schema => {
            print!("{SCHEMA}");
            Ok(())
        }
        Command::Ping(args) => {
            logging::init(config.log_path.as_deref(), cli.verbose)?;
            cmd_ping(&config, args).await
        }
    }
}

fn banner() {
    println!(
        "{} v{}",
        "Warehouse".green().bold(),
        env!("CARGO_PKG_VERSION")
    );
}

async fn connect(config: &ServerConfig) -> anyhow::Result<PgStockStore> {
    let db = &config.database;
    let store = PgStockStore::connect_lazy(
        db.connect_options(),
        db.max_connections,
        config.ledger_timeout(),
    );
    store
        .ping()
        .await
        .with_context(|| format!("database {}:{}/{} unreachable", db.host, db.port, db.name))?;
    tracing::info!(host = %db.host, port = db.port, database = %db.name, "database connected");
    Ok(store)
}

async fn cmd_serve(config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    banner();
    let ledger = if args.memory {
        tracing::warn!("using the in-memory store; stock is lost on exit");
        StockLedger::new(Arc::new(InMemoryStockStore::new()))
    } else {
        let store = connect(&config).await?;
        if args.init_schema {
            store.ensure_schema().await?;
        }
        StockLedger::new(Arc::new(store))
    }
    .with_timeout(config.ledger_timeout());

    println!("listening on {}", config.bind_addr().to_string().bold());
    WarehouseServer::new(config, ledger).serve().await?;
    Ok(())
}

async fn cmd_ping(config: &ServerConfig, args: PingArgs) -> anyhow::Result<()> {
    let store = connect(config).await?;
    if args.init_schema {
        store.ensure_schema().await?;
        println!("{} schema ready", "✓".green().bold());
    }
    println!(
        "{} {}:{}/{} reachable",
        "✓".green().bold(),
        config.database.host,
        config.database.port,
        config.database.name
    );
    Ok(())
}

fn cmd_config(config: &ServerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let shown = config.redacted();
    match format {
        OutputFormat::Text => print!("{}", shown.to_toml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
    }
    Ok(())
}
