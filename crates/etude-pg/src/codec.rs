//! Binary codec for the PostgreSQL v3 wire protocol.
//!
//! Encoding appends framed messages to a growable buffer. Decoding reads
//! message bodies with bounds checks, so a truncated or malformed message
//! is a protocol error rather than a panic.

use crate::error::{PgError, PgResult};
use crate::protocol::*;

/// Maximum size of a single PG message we'll accept (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// ─── Encoding (Frontend → Server) ─────────────────────────────

/// Accumulates frontend messages until they are flushed to the socket.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write one tagged message; the length prefix is patched in afterwards.
    fn message(&mut self, tag: u8, body: impl FnOnce(&mut Self)) {
        self.buf.push(tag);
        let len_pos = self.buf.len();
        self.put_i32(0);
        body(self);
        let len = (self.buf.len() - len_pos) as i32;
        self.buf[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// StartupMessage: Int32(len) Int32(v3.0) { CString(param) CString(value) }* \0
    pub fn startup(&mut self, user: &str, database: &str, params: &[(&str, &str)]) {
        let start = self.buf.len();
        self.put_i32(0);
        self.put_i32(PROTOCOL_VERSION);
        self.put_cstring("user");
        self.put_cstring(user);
        if !database.is_empty() {
            self.put_cstring("database");
            self.put_cstring(database);
        }
        for (k, v) in params {
            self.put_cstring(k);
            self.put_cstring(v);
        }
        self.buf.push(0);
        let len = (self.buf.len() - start) as i32;
        self.buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// PasswordMessage with a cleartext password.
    pub fn password(&mut self, password: &str) {
        self.message(b'p', |w| w.put_cstring(password));
    }

    pub fn sasl_initial(&mut self, mechanism: &str, data: &[u8]) {
        self.message(b'p', |w| {
            w.put_cstring(mechanism);
            w.put_i32(data.len() as i32);
            w.buf.extend_from_slice(data);
        });
    }

    pub fn sasl_response(&mut self, data: &[u8]) {
        self.message(b'p', |w| w.buf.extend_from_slice(data));
    }

    /// Simple Query ('Q').
    pub fn query(&mut self, sql: &str) {
        self.message(b'Q', |w| w.put_cstring(sql));
    }

    pub fn parse(&mut self, stmt_name: &str, sql: &str, param_oids: &[u32]) {
        self.message(b'P', |w| {
            w.put_cstring(stmt_name);
            w.put_cstring(sql);
            w.put_i16(param_oids.len() as i16);
            for &oid in param_oids {
                w.put_i32(oid as i32);
            }
        });
    }

    /// Bind with text-format parameters and text-format results.
    pub fn bind(&mut self, portal: &str, stmt_name: &str, params: &[Option<Vec<u8>>]) {
        self.message(b'B', |w| {
            w.put_cstring(portal);
            w.put_cstring(stmt_name);
            w.put_i16(0);
            w.put_i16(params.len() as i16);
            for param in params {
                match param {
                    Some(data) => {
                        w.put_i32(data.len() as i32);
                        w.buf.extend_from_slice(data);
                    }
                    None => w.put_i32(-1),
                }
            }
            w.put_i16(0);
        });
    }

    pub fn describe(&mut self, target: DescribeTarget, name: &str) {
        self.message(b'D', |w| {
            w.buf.push(match target {
                DescribeTarget::Statement => b'S',
                DescribeTarget::Portal => b'P',
            });
            w.put_cstring(name);
        });
    }

    pub fn execute(&mut self, portal: &str, max_rows: i32) {
        self.message(b'E', |w| {
            w.put_cstring(portal);
            w.put_i32(max_rows);
        });
    }

    pub fn sync(&mut self) {
        self.message(b'S', |_| {});
    }

    pub fn terminate(&mut self) {
        self.message(b'X', |_| {});
    }

    fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

// ─── Decoding (Server → Frontend) ─────────────────────────────

/// A decoded backend message header.
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub tag: BackendTag,
    /// Length including the 4-byte length field, excluding the tag byte.
    pub length: u32,
}

/// Try to read a message header from `buf`.
pub fn decode_header(buf: &[u8]) -> Option<MessageHeader> {
    if buf.len() < 5 {
        return None;
    }
    let tag = BackendTag::from(buf[0]);
    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    Some(MessageHeader { tag, length })
}

/// Total size of the first message in `buf` if it has fully arrived.
pub fn message_complete(buf: &[u8]) -> PgResult<Option<usize>> {
    let Some(header) = decode_header(buf) else {
        return Ok(None);
    };
    let length = header.length as usize;
    if !(4..=MAX_MESSAGE_SIZE).contains(&length) {
        return Err(PgError::Protocol(format!("Invalid message length {}", length)));
    }
    let total = 1 + length;
    Ok((buf.len() >= total).then_some(total))
}

/// Bounds-checked cursor over a message body.
pub struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn bytes(&mut self, n: usize) -> PgResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(PgError::Protocol("Truncated message".to_string()));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> PgResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn i16(&mut self) -> PgResult<i16> {
        let b = self.bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i32(&mut self) -> PgResult<i32> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a NUL-terminated string.
    pub fn cstring(&mut self) -> PgResult<&'a str> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| PgError::Protocol("Unterminated string".to_string()))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|_| PgError::Protocol("Invalid UTF-8 in string".to_string()))?;
        self.pos += end + 1;
        Ok(s)
    }

    /// Everything not read yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// A column descriptor from RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub table_oid: u32,
    pub col_attr: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format_code: FormatCode,
}

/// Parse a RowDescription message body.
pub fn parse_row_description(body: &[u8]) -> PgResult<Vec<ColumnDesc>> {
    let mut r = BodyReader::new(body);
    let num_fields = r.i16()?.max(0) as usize;
    let mut columns = Vec::with_capacity(num_fields);
    for _ in 0..num_fields {
        columns.push(ColumnDesc {
            name: r.cstring()?.to_string(),
            table_oid: r.i32()? as u32,
            col_attr: r.i16()?,
            type_oid: r.i32()? as u32,
            type_size: r.i16()?,
            type_modifier: r.i32()?,
            format_code: FormatCode::from(r.i16()?),
        });
    }
    Ok(columns)
}

/// Parse a DataRow message body. `None` is SQL NULL.
pub fn parse_data_row(body: &[u8]) -> PgResult<Vec<Option<Vec<u8>>>> {
    let mut r = BodyReader::new(body);
    let num_columns = r.i16()?.max(0) as usize;
    let mut cells = Vec::with_capacity(num_columns);
    for _ in 0..num_columns {
        let len = r.i32()?;
        if len < 0 {
            cells.push(None);
        } else {
            cells.push(Some(r.bytes(len as usize)?.to_vec()));
        }
    }
    Ok(cells)
}

/// Parse an ErrorResponse or NoticeResponse body into (field type, value) pairs.
pub fn parse_error_fields(body: &[u8]) -> PgResult<Vec<(u8, String)>> {
    let mut r = BodyReader::new(body);
    let mut fields = Vec::new();
    while r.remaining() > 0 {
        let field_type = r.u8()?;
        if field_type == 0 {
            break;
        }
        fields.push((field_type, r.cstring()?.to_string()));
    }
    Ok(fields)
}

/// Affected-row count from a CommandComplete tag such as `INSERT 0 3` or `UPDATE 2`.
///
/// Tags without a count (`CREATE TABLE`) report 0.
pub fn parse_command_complete(body: &[u8]) -> PgResult<u64> {
    let tag = BodyReader::new(body).cstring()?;
    Ok(tag
        .rsplit(' ')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(w: &MessageWriter) -> &[u8] {
        &w.as_bytes()[5..]
    }

    #[test]
    fn test_startup_encoding() {
        let mut w = MessageWriter::new();
        w.startup("postgres", "mydb", &[]);
        let buf = w.as_bytes();
        assert_eq!(
            i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize,
            buf.len()
        );
        assert_eq!(i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]), PROTOCOL_VERSION);
        assert_eq!(&buf[8..], b"user\0postgres\0database\0mydb\0\0");
    }

    #[test]
    fn test_startup_without_database() {
        let mut w = MessageWriter::new();
        w.startup("postgres", "", &[]);
        assert_eq!(&w.as_bytes()[8..], b"user\0postgres\0\0");
    }

    #[test]
    fn test_query_encoding() {
        let mut w = MessageWriter::new();
        w.query("SELECT 1");
        assert_eq!(w.as_bytes()[0], b'Q');
        assert_eq!(message_complete(w.as_bytes()).unwrap(), Some(w.as_bytes().len()));
        assert_eq!(body(&w), b"SELECT 1\0");
    }

    #[test]
    fn test_bind_encoding() {
        let mut w = MessageWriter::new();
        w.bind("", "", &[Some(b"42".to_vec()), None]);
        let mut r = BodyReader::new(body(&w));
        assert_eq!(r.cstring().unwrap(), "");
        assert_eq!(r.cstring().unwrap(), "");
        assert_eq!(r.i16().unwrap(), 0);
        assert_eq!(r.i16().unwrap(), 2);
        assert_eq!(r.i32().unwrap(), 2);
        assert_eq!(r.bytes(2).unwrap(), b"42");
        assert_eq!(r.i32().unwrap(), -1);
        assert_eq!(r.i16().unwrap(), 0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_pipelined_messages() {
        let mut w = MessageWriter::new();
        w.sync();
        w.terminate();
        assert_eq!(w.as_bytes(), &[b'S', 0, 0, 0, 4, b'X', 0, 0, 0, 4]);
        w.clear();
        assert!(w.as_bytes().is_empty());
    }

    #[test]
    fn test_message_complete() {
        let msg = [b'Z', 0, 0, 0, 5, b'I'];
        assert_eq!(message_complete(&msg).unwrap(), Some(6));
        assert_eq!(message_complete(&msg[..4]).unwrap(), None);
        assert_eq!(message_complete(&msg[..5]).unwrap(), None);
        assert!(message_complete(&[b'Z', 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_parse_row_description() {
        let mut body = vec![0, 2];
        for (name, oid) in [("id", 23u32), ("name", 1043)] {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
            body.extend_from_slice(&0i32.to_be_bytes());
            body.extend_from_slice(&0i16.to_be_bytes());
            body.extend_from_slice(&(oid as i32).to_be_bytes());
            body.extend_from_slice(&(-1i16).to_be_bytes());
            body.extend_from_slice(&(-1i32).to_be_bytes());
            body.extend_from_slice(&0i16.to_be_bytes());
        }
        let columns = parse_row_description(&body).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].name, "name");
        assert_eq!(columns[1].type_oid, 1043);
        assert_eq!(columns[1].format_code, FormatCode::Text);

        assert!(parse_row_description(&body[..body.len() - 1]).is_err());
    }

    #[test]
    fn test_parse_data_row() {
        let mut body = vec![0, 2];
        body.extend_from_slice(&1i32.to_be_bytes());
        body.push(b'7');
        body.extend_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(
            parse_data_row(&body).unwrap(),
            vec![Some(b"7".to_vec()), None]
        );

        // Declared length runs past the end of the body.
        let truncated = [0, 1, 0, 0, 0, 9, b'x'];
        assert!(parse_data_row(&truncated).is_err());
    }

    #[test]
    fn test_parse_command_complete() {
        assert_eq!(parse_command_complete(b"INSERT 0 3\0").unwrap(), 3);
        assert_eq!(parse_command_complete(b"UPDATE 12\0").unwrap(), 12);
        assert_eq!(parse_command_complete(b"SELECT 1\0").unwrap(), 1);
        assert_eq!(parse_command_complete(b"CREATE TABLE\0").unwrap(), 0);
    }

    #[test]
    fn test_parse_error_fields() {
        let body = b"SERROR\0C42P01\0Mrelation \"cars\" does not exist\0\0";
        let fields = parse_error_fields(body).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], (b'C', "42P01".to_string()));
    }
}
