//! # etude-pg
//!
//! A blocking PostgreSQL driver for etude-sql.
//!
//! ## Features
//! - **Wire protocol v3** over a plain `TcpStream`, text-format results.
//! - **SCRAM-SHA-256**: cleartext and SCRAM authentication; MD5 is refused.
//! - **Auto-create**: a missing database can be created on connect.
//! - **Catalog**: tables, databases and column types via [`PgCatalog`].

pub mod auth;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod types;

pub use catalog::{PgCatalog, quote_literal};
pub use config::PgConfig;
pub use connection::{PgConnection, PgCursor};
pub use error::{PgError, PgResult};

use etude_sql::Database;

/// Open a session on the database named in `config`.
pub fn connect(config: &PgConfig) -> PgResult<Database<PgConnection>> {
    let conn = PgConnection::connect(config)?;
    Ok(Database::new(conn, config.database.as_str()))
}
