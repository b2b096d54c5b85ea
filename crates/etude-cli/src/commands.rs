use std::io::Write;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use etude_pg::PgCatalog;
use etude_sql::{Connection, Database, IdentKind, Value, require_identifier};
use serde::Serialize;

use crate::cli::{Cli, Command};

/// Run a parsed command line, writing results to `out`.
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    if !cli.command.needs_connection() {
        return execute_offline(cli.command, out);
    }

    let config = cli.connection.config()?;
    tracing::debug!(?config, "connecting");
    let mut db = etude_pg::connect(&config).with_context(|| {
        format!(
            "failed to connect to {} (database {:?})",
            config.address(),
            config.database
        )
    })?;

    let result = execute(&mut db, cli.command, out);
    let closed = db.close().context("failed to close the connection");
    result?;
    closed
}

fn execute_offline(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Check { name } => check(&name, out),
        other => bail!("{:?} needs a database connection", other),
    }
}

/// Run a command that talks to the server over `db`.
pub fn execute<C: Connection>(
    db: &mut Database<C>,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Query { sql, params } => {
            let params: Vec<Value> = params.into_iter().map(Value::from).collect();
            let records = db
                .query_records(&sql, &params)
                .with_context(|| format!("query failed: {}", sql))?;
            print_json(out, &records)
        }
        Command::Describe { table, catalog } => {
            let (columns, _) = if catalog {
                db.sql_table_info(&table)
            } else {
                db.table_info(&table)
            }
            .with_context(|| format!("failed to describe {}", table))?;
            print_json(out, &columns)
        }
        Command::Tables { columns: false } => {
            let tables = db.show_tables().context("failed to list tables")?;
            print_json(out, &tables)
        }
        Command::Tables { columns: true } => {
            let tables = db.show_tables_map().context("failed to list tables")?;
            print_json(out, &tables)
        }
        Command::Databases => {
            let databases = db.show_databases().context("failed to list databases")?;
            print_json(out, &databases)
        }
        Command::Exists { table } => {
            let exists = db
                .table_exists(&table)
                .with_context(|| format!("failed to look up {}", table))?;
            if exists {
                writeln!(out, "{} {}", "✓".green(), table)?;
                Ok(())
            } else {
                bail!("table {} does not exist", table)
            }
        }
        Command::Check { name } => check(&name, out),
    }
}

fn check(name: &str, out: &mut impl Write) -> Result<()> {
    require_identifier(IdentKind::Table, name)?;
    writeln!(out, "{} {} is a valid identifier", "✓".green(), name.bold())?;
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
