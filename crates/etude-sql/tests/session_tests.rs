use std::collections::HashMap;

use etude_sql::cursor::MemoryCursorError;
use etude_sql::{
    Connection, Database, MemoryCursor, RawValue, SqlError, TypeFamily, Value, coerce,
};

/// A connection serving canned cursors keyed by SQL text.
#[derive(Default)]
struct ScriptedConnection {
    responses: HashMap<String, MemoryCursor>,
}

impl ScriptedConnection {
    fn respond(mut self, sql: &str, cursor: MemoryCursor) -> Self {
        self.responses.insert(sql.to_string(), cursor);
        self
    }
}

impl Connection for ScriptedConnection {
    type Error = MemoryCursorError;
    type Cursor = MemoryCursor;

    fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<u64, Self::Error> {
        Ok(0)
    }

    fn query(&mut self, sql: &str, _params: &[Value]) -> Result<MemoryCursor, Self::Error> {
        Ok(self.responses.remove(sql).unwrap_or_default())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
}

fn cars_cursor() -> MemoryCursor {
    MemoryCursor::new([("id", "INT4"), ("name", "VARCHAR"), ("price", "INT4")])
}

#[test]
fn test_cars_round_trip() {
    let conn = ScriptedConnection::default()
        .respond(
            "SELECT * FROM cars LIMIT 1",
            cars_cursor().with_row(vec![text("1"), text("Skoda"), text("9000")]),
        )
        .respond(
            "SELECT * FROM cars",
            cars_cursor().with_rows([
                vec![text("1"), text("Skoda"), text("9000")],
                vec![text("2"), text("Mercedes"), text("57127")],
                vec![text("3"), RawValue::Null, RawValue::Null],
            ]),
        );
    let mut db = Database::new(conn, "testdb");

    let (columns, index) = db.table_info("cars").unwrap();
    let first = &columns[0];
    assert_eq!((first.sequence, first.name.as_str(), first.type_name.as_str()), (1, "id", "INT4"));
    assert_eq!(
        serde_json::to_string(&index).unwrap(),
        r#"{"id":"INT4","name":"VARCHAR","price":"INT4"}"#
    );

    let records = db.query_records("SELECT * FROM cars", &[]).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["id"], Value::Integer(1));
    assert_eq!(records[0]["name"], Value::Text("Skoda".into()));
    assert_eq!(records[0]["price"], Value::Integer(9000));

    // A NULL VARCHAR passes through, a NULL INT4 becomes zero.
    assert_eq!(records[2]["name"], Value::Null);
    assert_eq!(records[2]["price"], Value::Integer(0));

    let json = serde_json::to_string(&records[1]).unwrap();
    assert_eq!(json, r#"{"id":2,"name":"Mercedes","price":57127}"#);
}

#[test]
fn test_partial_result_on_scan_failure() {
    let conn = ScriptedConnection::default().respond(
        "SELECT * FROM cars",
        cars_cursor()
            .with_rows([
                vec![text("1"), text("Skoda"), text("9000")],
                vec![text("2"), text("Audi"), text("52642")],
                vec![text("3"), text("Volvo"), text("29000")],
            ])
            .fail_at(2),
    );
    let mut db = Database::new(conn, "testdb");
    let err = db.query_records("SELECT * FROM cars", &[]).unwrap_err();
    assert!(err.to_string().starts_with("scan failed at row 2"));
    let partial = err.into_partial().unwrap();
    assert_eq!(partial.len(), 2);
    assert_eq!(partial[1]["name"], Value::Text("Audi".into()));
}

#[test]
fn test_error_messages() {
    let mut db: Database<ScriptedConnection> = Database::disconnected(None);
    assert_eq!(db.table_info("cars").unwrap_err().to_string(), "not connected");

    let mut db = Database::new(ScriptedConnection::default(), "testdb");
    assert_eq!(
        db.table_info("").unwrap_err().to_string(),
        "table name cannot be blank"
    );
    assert!(matches!(
        db.table_info("a.b.c"),
        Err(SqlError::InvalidIdentifier { .. })
    ));
}

#[test]
fn test_coercion_properties() {
    assert_eq!(coerce(text("123.456"), "INT4"), Value::Integer(123));
    assert_eq!(coerce(text("abc"), "INTEGER"), Value::Integer(0));
    assert_eq!(coerce(text("FALSE"), "BOOL"), Value::Bool(false));
    assert_eq!(coerce(text("no"), "BOOLEAN"), Value::Bool(true));
    assert_eq!(coerce(RawValue::Null, "BYTEA"), Value::Bytes(vec![]));
    assert_eq!(coerce(text("x"), "JSONB"), Value::Text("x".into()));
    assert_eq!(TypeFamily::of("float8"), TypeFamily::Real);
}
