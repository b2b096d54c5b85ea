//! Blocking PgConnection: connects, authenticates, and queries PostgreSQL.
//!
//! Every statement goes through the unnamed extended-query pipeline
//! (Parse/Bind/Describe/Execute/Sync) with text-format parameters and
//! results. The whole response is read up to ReadyForQuery before a
//! [`PgCursor`] is handed out, so the socket is free again as soon as
//! `query` returns.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpStream;

use etude_sql::{ColumnType, Connection, Cursor, RawValue, Value, is_valid_identifier};

use crate::auth::{self, ScramClient};
use crate::codec::{self, BodyReader, ColumnDesc, MessageWriter};
use crate::config::PgConfig;
use crate::error::{PgError, PgResult};
use crate::protocol::*;
use crate::types;

type DataRow = Vec<Option<Vec<u8>>>;

/// A synchronous PostgreSQL connection.
pub struct PgConnection {
    stream: TcpStream,
    read_buf: Vec<u8>,
    read_pos: usize,
    writer: MessageWriter,
    tx_status: TransactionStatus,
    process_id: i32,
    server_params: Vec<(String, String)>,
    closed: bool,
}

/// Everything the server sent for one statement.
#[derive(Default)]
struct Response {
    columns: Vec<ColumnDesc>,
    rows: VecDeque<DataRow>,
    affected: u64,
    error: Option<PgError>,
}

impl PgConnection {
    /// Connect to PostgreSQL and complete authentication.
    ///
    /// With `auto_create` set, a database the server reports as missing is
    /// created through the maintenance database and the connect retried.
    pub fn connect(config: &PgConfig) -> PgResult<Self> {
        match Self::open(config) {
            Err(e) if config.auto_create && e.is_missing_database() => {
                log::debug!("Database {:?} does not exist, creating it", config.database);
                Self::create_database(config)?;
                Self::open(config)
            }
            other => other,
        }
    }

    fn open(config: &PgConfig) -> PgResult<Self> {
        let stream = TcpStream::connect(config.address())?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            read_buf: vec![0u8; 64 * 1024],
            read_pos: 0,
            writer: MessageWriter::new(),
            tx_status: TransactionStatus::Idle,
            process_id: 0,
            server_params: Vec::new(),
            closed: false,
        };
        conn.startup(config)?;
        log::debug!(
            "Connected to {} as {} (database {:?})",
            config.address(),
            config.user,
            config.database
        );
        Ok(conn)
    }

    fn create_database(config: &PgConfig) -> PgResult<()> {
        if !is_valid_identifier(&config.database) {
            return Err(PgError::Config(format!(
                "invalid database name: {:?}",
                config.database
            )));
        }
        let mut admin = Self::open(&config.maintenance())?;
        admin.simple_query(&format!("CREATE DATABASE {}", config.database))?;
        admin.close()
    }

    /// Perform the startup and authentication handshake.
    fn startup(&mut self, config: &PgConfig) -> PgResult<()> {
        self.writer
            .startup(&config.user, &config.database, &[("client_encoding", "UTF8")]);
        self.flush()?;

        loop {
            let (tag, body) = self.read_message()?;
            match tag {
                BackendTag::AuthenticationRequest => {
                    let mut r = BodyReader::new(&body);
                    let auth_type = r.i32()?;
                    match AuthType::from_i32(auth_type) {
                        Some(AuthType::Ok) => log::trace!("Authentication accepted"),
                        Some(AuthType::CleartextPassword) => {
                            log::trace!("Sending cleartext password");
                            self.writer.password(&config.password);
                            self.flush()?;
                        }
                        Some(AuthType::SASLInit) => {
                            let mut mechanisms = Vec::new();
                            while r.remaining() > 0 {
                                match r.cstring()? {
                                    "" => break,
                                    m => mechanisms.push(m),
                                }
                            }
                            if !mechanisms.contains(&auth::MECHANISM) {
                                return Err(PgError::Auth(format!(
                                    "No supported SASL mechanism in {:?}",
                                    mechanisms
                                )));
                            }
                            self.authenticate_scram(config)?;
                        }
                        Some(AuthType::MD5Password) => {
                            return Err(PgError::Auth(
                                "MD5 auth not supported, use SCRAM-SHA-256".to_string(),
                            ));
                        }
                        _ => {
                            return Err(PgError::Auth(format!(
                                "Unsupported auth type: {}",
                                auth_type
                            )));
                        }
                    }
                }
                BackendTag::ParameterStatus => {
                    let mut r = BodyReader::new(&body);
                    let name = r.cstring()?.to_string();
                    let value = r.cstring()?.to_string();
                    self.server_params.push((name, value));
                }
                BackendTag::BackendKeyData => {
                    self.process_id = BodyReader::new(&body).i32()?;
                }
                BackendTag::ReadyForQuery => {
                    self.set_ready(&body);
                    return Ok(());
                }
                BackendTag::ErrorResponse => {
                    return Err(PgError::from_fields(&codec::parse_error_fields(&body)?));
                }
                _ => {}
            }
        }
    }

    /// Handle the SASL Continue/Final exchange.
    fn authenticate_scram(&mut self, config: &PgConfig) -> PgResult<()> {
        log::trace!("Starting SCRAM-SHA-256 exchange");
        let mut scram = ScramClient::new(&config.user, &config.password);
        let client_first = scram.client_first_message();
        self.writer.sasl_initial(auth::MECHANISM, &client_first);
        self.flush()?;

        loop {
            let (tag, body) = self.read_message()?;
            match tag {
                BackendTag::AuthenticationRequest => {
                    let mut r = BodyReader::new(&body);
                    match AuthType::from_i32(r.i32()?) {
                        Some(AuthType::SASLContinue) => {
                            let client_final = scram.process_server_first(r.rest())?;
                            self.writer.sasl_response(&client_final);
                            self.flush()?;
                        }
                        Some(AuthType::SASLFinal) => scram.verify_server_final(r.rest())?,
                        Some(AuthType::Ok) => return Ok(()),
                        _ => {
                            return Err(PgError::Auth(
                                "Unexpected auth message during SASL".to_string(),
                            ));
                        }
                    }
                }
                BackendTag::ErrorResponse => {
                    return Err(PgError::from_fields(&codec::parse_error_fields(&body)?));
                }
                _ => {}
            }
        }
    }

    // ─── Query Methods ────────────────────────────────────────

    /// Run SQL text through the simple query protocol, without parameters.
    pub fn simple_query(&mut self, sql: &str) -> PgResult<u64> {
        log::debug!("Executing simple query: {}", sql);
        let response = self.round_trip(|w| w.query(sql))?;
        match response.error {
            Some(err) => Err(err),
            None => Ok(response.affected),
        }
    }

    fn extended(&mut self, sql: &str, params: &[Value]) -> PgResult<Response> {
        let params: Vec<Option<Vec<u8>>> = params.iter().map(types::encode_param).collect();
        self.round_trip(|w| {
            w.parse("", sql, &[]);
            w.bind("", "", &params);
            w.describe(DescribeTarget::Portal, "");
            w.execute("", 0);
            w.sync();
        })
    }

    /// Send one batch of messages and read everything up to ReadyForQuery.
    ///
    /// A transport or protocol failure leaves the stream in an unknown state,
    /// so the connection is marked closed.
    fn round_trip(&mut self, encode: impl FnOnce(&mut MessageWriter)) -> PgResult<Response> {
        if self.closed {
            return Err(PgError::ConnectionClosed);
        }
        encode(&mut self.writer);
        let result = self.flush().and_then(|_| self.read_response());
        if let Err(PgError::Io(_) | PgError::Protocol(_) | PgError::ConnectionClosed) = &result {
            self.closed = true;
        }
        result
    }

    fn read_response(&mut self) -> PgResult<Response> {
        let mut response = Response::default();
        loop {
            let (tag, body) = self.read_message()?;
            match tag {
                BackendTag::RowDescription => {
                    response.columns = codec::parse_row_description(&body)?;
                }
                BackendTag::DataRow => {
                    response.rows.push_back(codec::parse_data_row(&body)?);
                }
                BackendTag::CommandComplete => {
                    response.affected = codec::parse_command_complete(&body)?;
                }
                BackendTag::ErrorResponse => {
                    let err = PgError::from_fields(&codec::parse_error_fields(&body)?);
                    response.error.get_or_insert(err);
                }
                BackendTag::NoticeResponse => {
                    let fields = codec::parse_error_fields(&body)?;
                    log::debug!("Server notice: {}", PgError::from_fields(&fields));
                }
                BackendTag::ReadyForQuery => {
                    self.set_ready(&body);
                    return Ok(response);
                }
                _ => {}
            }
        }
    }

    /// Current transaction status.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// A run-time parameter reported by the server, e.g. `server_version`.
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Process ID of the serving backend.
    pub fn backend_pid(&self) -> i32 {
        self.process_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ─── Internal Methods ─────────────────────────────────────

    fn flush(&mut self) -> PgResult<()> {
        let result = self.stream.write_all(self.writer.as_bytes());
        self.writer.clear();
        result.map_err(PgError::from)
    }

    fn set_ready(&mut self, body: &[u8]) {
        self.tx_status = body
            .first()
            .map_or(TransactionStatus::Idle, |&b| TransactionStatus::from(b));
    }

    fn read_message(&mut self) -> PgResult<(BackendTag, Vec<u8>)> {
        loop {
            if let Some(len) = codec::message_complete(&self.read_buf[..self.read_pos])? {
                let tag = BackendTag::from(self.read_buf[0]);
                let body = self.read_buf[5..len].to_vec();
                self.consume_read(len);
                return Ok((tag, body));
            }
            self.fill_read_buf()?;
        }
    }

    fn fill_read_buf(&mut self) -> PgResult<()> {
        if self.read_pos == self.read_buf.len() {
            let grown = (self.read_buf.len() * 2).min(codec::MAX_MESSAGE_SIZE + 5);
            self.read_buf.resize(grown, 0);
        }
        let n = self.stream.read(&mut self.read_buf[self.read_pos..])?;
        if n == 0 {
            return Err(PgError::ConnectionClosed);
        }
        self.read_pos += n;
        Ok(())
    }

    fn consume_read(&mut self, n: usize) {
        self.read_buf.copy_within(n..self.read_pos, 0);
        self.read_pos -= n;
    }
}

impl Connection for PgConnection {
    type Error = PgError;
    type Cursor = PgCursor;

    fn execute(&mut self, sql: &str, params: &[Value]) -> PgResult<u64> {
        let response = self.extended(sql, params)?;
        match response.error {
            Some(err) => Err(err),
            None => {
                log::trace!("{} rows affected", response.affected);
                Ok(response.affected)
            }
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> PgResult<PgCursor> {
        let response = self.extended(sql, params)?;
        if response.rows.is_empty() {
            if let Some(err) = response.error {
                return Err(err);
            }
        }
        log::trace!(
            "{} rows buffered over {} columns",
            response.rows.len(),
            response.columns.len()
        );
        Ok(PgCursor {
            columns: response.columns,
            rows: response.rows,
            pending_error: response.error,
            closed: false,
        })
    }

    fn close(&mut self) -> PgResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.terminate();
        self.flush()
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.writer.terminate();
            let _ = self.stream.write_all(self.writer.as_bytes());
        }
    }
}

/// Rows of one query, decoded cell by cell as they are fetched.
///
/// When the server failed after streaming some rows, the failure is
/// returned by `next_row` once those rows are consumed.
#[derive(Debug)]
pub struct PgCursor {
    columns: Vec<ColumnDesc>,
    rows: VecDeque<DataRow>,
    pending_error: Option<PgError>,
    closed: bool,
}

impl PgCursor {
    /// Rows not fetched yet.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Cursor for PgCursor {
    type Error = PgError;

    fn column_types(&self) -> PgResult<Vec<ColumnType>> {
        Ok(self
            .columns
            .iter()
            .map(|c| ColumnType::new(c.name.as_str(), types::type_name(c.type_oid)))
            .collect())
    }

    fn next_row(&mut self) -> PgResult<Option<Vec<RawValue>>> {
        if self.closed {
            return Ok(None);
        }
        let Some(cells) = self.rows.pop_front() else {
            return match self.pending_error.take() {
                Some(err) => Err(err),
                None => Ok(None),
            };
        };
        if cells.len() != self.columns.len() {
            return Err(PgError::Protocol(format!(
                "DataRow has {} cells for {} columns",
                cells.len(),
                self.columns.len()
            )));
        }
        cells
            .iter()
            .zip(&self.columns)
            .map(|(cell, column)| types::decode_text(column.type_oid, cell.as_deref()))
            .collect::<PgResult<Vec<_>>>()
            .map(Some)
    }

    fn close(&mut self) -> PgResult<()> {
        self.closed = true;
        self.rows.clear();
        self.pending_error = None;
        Ok(())
    }
}
