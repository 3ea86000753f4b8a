//! oxide-db CLI
//!
//! Command-line tool for running and previewing SQL on a configured
//! connection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxide_db::{DatabaseConfig, DatabaseManager, DriverRegistry};
use oxide_query::prelude::*;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

/// Run SQL through oxide-query connections.
#[derive(Parser)]
#[command(name = "oxide-db")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database: String,

    /// JSON connection configuration; overrides the database URL.
    #[arg(long, env = "OXIDE_DB_CONFIG")]
    config: Option<PathBuf>,

    /// Connection name (the configured default if not specified).
    #[arg(short, long)]
    connection: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print each row as a JSON line.
    Select {
        /// SQL text with `?` placeholders.
        sql: String,

        /// Values for the placeholders, in order.
        #[arg(short, long = "bind")]
        bindings: Vec<String>,
    },

    /// Run a statement and print the number of affected rows.
    Statement {
        /// SQL text with `?` placeholders.
        sql: String,

        /// Values for the placeholders, in order.
        #[arg(short, long = "bind")]
        bindings: Vec<String>,
    },

    /// Print the statements without executing them (dry run).
    Pretend {
        /// Statements to preview.
        #[arg(required = true)]
        statements: Vec<String>,
    },

    /// Print one page of a table as JSON.
    Table {
        /// Table name.
        name: String,

        /// Page number, starting at 1.
        #[arg(short, long, default_value_t = 1)]
        page: u64,

        /// Rows per page.
        #[arg(long, default_value_t = 15)]
        per_page: u64,
    },
}

/// Reads a command-line binding: `null`, an integer, a float, or text.
fn parse_binding(value: &str) -> SqlValue {
    if value.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(n) = value.parse::<i64>() {
        SqlValue::Int(n)
    } else if let Ok(f) = value.parse::<f64>() {
        SqlValue::Float(f)
    } else {
        SqlValue::Text(value.to_string())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = DatabaseConfig::load(cli.config.as_deref(), &cli.database)?;
    let manager = DatabaseManager::new(config, DriverRegistry::with_defaults());
    let db = manager.connection(cli.connection.as_deref())?;
    debug!(connection = %db.name(), "Connected");

    match cli.command {
        Commands::Select { sql, bindings } => {
            let bindings: Vec<SqlValue> = bindings.iter().map(|b| parse_binding(b)).collect();
            let rows = db.select(&sql, &bindings, true)?;
            for row in &rows {
                println!("{}", serde_json::to_string(row)?);
            }
            info!(rows = rows.len(), "Query finished");
        }

        Commands::Statement { sql, bindings } => {
            let bindings: Vec<SqlValue> = bindings.iter().map(|b| parse_binding(b)).collect();
            let affected = db.affecting_statement(&sql, &bindings)?;
            println!("{affected}");
        }

        Commands::Pretend { statements } => {
            info!("Dry run mode - SQL will be printed but not executed.");
            let log = db.pretend(|db| {
                for sql in &statements {
                    db.statement(sql, &[])?;
                }
                Ok(())
            })?;
            for entry in log {
                println!("{};", entry.sql);
            }
        }

        Commands::Table {
            name,
            page,
            per_page,
        } => {
            let paginator = db.table(&name).paginate(per_page, page, None)?;
            println!("{}", serde_json::to_string_pretty(&paginator)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding("NULL"), SqlValue::Null);
        assert_eq!(parse_binding("42"), SqlValue::Int(42));
        assert_eq!(parse_binding("1.5"), SqlValue::Float(1.5));
        assert_eq!(parse_binding("ada"), SqlValue::Text("ada".into()));
    }

    #[test]
    fn test_cli_parses_bindings() {
        let cli = Cli::parse_from(["oxide-db", "select", "SELECT ?", "--bind", "1", "-b", "x"]);
        match cli.command {
            Commands::Select { sql, bindings } => {
                assert_eq!(sql, "SELECT ?");
                assert_eq!(bindings, ["1", "x"]);
            }
            _ => panic!("expected select"),
        }
    }
}
