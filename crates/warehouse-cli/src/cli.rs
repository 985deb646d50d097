use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "warehouse",
    about = "Warehouse stock service: per-SKU, per-warehouse stock ledger over HTTP",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Show the effective configuration (password masked)
    Config,
    /// Print the SQL schema used by the Postgres backend
    Schema,
    /// Check that the database is reachable
    Ping(PingArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Keep stock in memory instead of Postgres
    #[arg(long)]
    pub memory: bool,
    /// Create missing tables before serving
    #[arg(long, conflicts_with = "memory")]
    pub init_schema: bool,
    /// Override HTTP_PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args)]
pub struct PingArgs {
    /// Create missing tables after a successful ping
    #[arg(long)]
    pub init_schema: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["warehouse", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(!args.memory);
            assert!(args.port.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_memory_with_port() {
        let cli = Cli::try_parse_from(["warehouse", "serve", "--memory", "-p", "9100"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.memory);
            assert_eq!(args.port, Some(9100));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn memory_conflicts_with_init_schema() {
        assert!(Cli::try_parse_from(["warehouse", "serve", "--memory", "--init-schema"]).is_err());
    }

    #[test]
    fn parse_global_config() {
        let cli = Cli::try_parse_from(["warehouse", "config", "--config", "/etc/warehouse.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Config));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/warehouse.toml")));
    }

    #[test]
    fn parse_ping() {
        let cli = Cli::try_parse_from(["warehouse", "ping", "--init-schema"]).unwrap();
        if let Command::Ping(args) = cli.command {
            assert!(args.init_schema);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["warehouse", "--verbose", "schema"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["warehouse", "--format", "json", "config"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
