use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::SlotbookAuthSource;
use crate::engine::{BookingError, BookingRequest, DayAvailability, DaySummary, Engine};
use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, blocks_to_json, Command};

pub struct SlotbookHandler {
    engine: Arc<Engine>,
    query_parser: Arc<SlotbookQueryParser>,
}

impl SlotbookHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(SlotbookQueryParser),
        }
    }

    async fn run(&self, sql: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label).record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::SelectDayAvailability { date } => {
                let day = engine.resolve_day_availability(date).await.map_err(engine_err)?;
                Ok(day_rows(&day))
            }
            Command::SelectMonthAvailability { year, month } => {
                let days = engine
                    .resolve_month_availability(year, month)
                    .await
                    .map_err(engine_err)?;
                Ok(month_rows(days.iter()))
            }
            Command::InsertBooking {
                date,
                start_time,
                end_time,
                visitor,
            } => {
                let booking = engine
                    .validate_and_book(BookingRequest {
                        date,
                        start_time,
                        end_time,
                        visitor,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(booking_rows(std::slice::from_ref(&booking)))
            }
            Command::DeleteBooking { id } => {
                engine.cancel_booking(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SetBookingStatus { id, status } => {
                engine.transition_booking(id, status).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SelectBookings { date } => {
                let bookings = engine.list_bookings(date).await.map_err(engine_err)?;
                Ok(booking_rows(&bookings))
            }
            Command::UpsertWeeklyDay { day } => {
                engine.set_weekly_day(day).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteWeeklyDay { day_of_week } => {
                let removed = engine.clear_weekly_day(day_of_week).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(removed as usize)))
            }
            Command::SelectWeeklySchedule => {
                let days = engine.weekly_schedule().await.map_err(engine_err)?;
                Ok(weekly_rows(&days))
            }
            Command::UpsertOverride { day } => {
                engine.set_override(day).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteOverride { date } => {
                let removed = engine.clear_override(date).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(removed as usize)))
            }
            Command::SelectOverride { date } => {
                let found = engine.get_override(date).await.map_err(engine_err)?;
                Ok(override_rows(found.as_slice()))
            }
            Command::UpdateSettings { settings } => {
                engine.update_settings(settings).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SelectSettings => {
                let settings = engine.settings().await.map_err(engine_err)?;
                Ok(settings_rows(&settings))
            }
        }
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn day_availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("date", Type::VARCHAR),
        text_field("day_status", Type::VARCHAR),
        text_field("start_time", Type::VARCHAR),
        text_field("end_time", Type::VARCHAR),
        text_field("readable", Type::VARCHAR),
        text_field("available", Type::BOOL),
        text_field("status", Type::VARCHAR),
        text_field("booking_id", Type::VARCHAR),
    ]
}

fn month_availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("date", Type::VARCHAR),
        text_field("day_status", Type::VARCHAR),
        text_field("slot_count", Type::INT8),
        text_field("available_count", Type::INT8),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("date", Type::VARCHAR),
        text_field("start_time", Type::VARCHAR),
        text_field("end_time", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("email", Type::VARCHAR),
        text_field("phone", Type::VARCHAR),
        text_field("message", Type::VARCHAR),
        text_field("created_at", Type::VARCHAR),
    ]
}

fn weekly_schedule_schema() -> Vec<FieldInfo> {
    vec![
        text_field("day_of_week", Type::INT4),
        text_field("enabled", Type::BOOL),
        text_field("blocks", Type::VARCHAR),
    ]
}

fn overrides_schema() -> Vec<FieldInfo> {
    vec![
        text_field("date", Type::VARCHAR),
        text_field("enabled", Type::BOOL),
        text_field("is_holiday", Type::BOOL),
        text_field("blocks", Type::VARCHAR),
    ]
}

fn settings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("duration_minutes", Type::INT4),
        text_field("max_advance_booking_days", Type::INT4),
        text_field("min_advance_booking_hours", Type::FLOAT8),
    ]
}

/// Rows for a single-table result, encoded against `schema`.
fn query_response<T>(
    schema: Vec<FieldInfo>,
    items: impl IntoIterator<Item = T>,
    encode: impl Fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
) -> Response {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// One row per slot. A date without slots still yields one row carrying the
/// day status, with the slot columns NULL.
fn day_rows(day: &DayAvailability) -> Response {
    let date = day.date.to_string();
    let status = day.status.as_str();
    if day.slots.is_empty() {
        return query_response(day_availability_schema(), [()], |enc, ()| {
            enc.encode_field(&date)?;
            enc.encode_field(&status)?;
            for _ in 0..3 {
                enc.encode_field(&None::<String>)?;
            }
            enc.encode_field(&None::<bool>)?;
            enc.encode_field(&None::<String>)?;
            enc.encode_field(&None::<String>)
        });
    }
    query_response(day_availability_schema(), &day.slots, |enc, slot| {
        enc.encode_field(&date)?;
        enc.encode_field(&status)?;
        enc.encode_field(&slot.start_time())?;
        enc.encode_field(&slot.end_time())?;
        enc.encode_field(&slot.readable())?;
        enc.encode_field(&slot.available)?;
        enc.encode_field(&slot.status.as_str())?;
        enc.encode_field(&slot.booking_id.map(|id| id.to_string()))
    })
}

fn month_rows<'a>(days: impl Iterator<Item = (&'a chrono::NaiveDate, &'a DaySummary)>) -> Response {
    query_response(month_availability_schema(), days, |enc, (date, summary)| {
        enc.encode_field(&date.to_string())?;
        enc.encode_field(&summary.status.as_str())?;
        enc.encode_field(&(summary.slot_count as i64))?;
        enc.encode_field(&(summary.available_count as i64))
    })
}

fn booking_rows(bookings: &[Booking]) -> Response {
    query_response(bookings_schema(), bookings, |enc, b| {
        enc.encode_field(&b.id.to_string())?;
        enc.encode_field(&b.date.to_string())?;
        enc.encode_field(&b.start_time())?;
        enc.encode_field(&b.end_time())?;
        enc.encode_field(&b.status.as_str())?;
        enc.encode_field(&b.visitor.name)?;
        enc.encode_field(&b.visitor.email)?;
        enc.encode_field(&b.visitor.phone)?;
        enc.encode_field(&b.visitor.message)?;
        enc.encode_field(&b.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
    })
}

fn weekly_rows(days: &[WeeklyScheduleDay]) -> Response {
    query_response(weekly_schedule_schema(), days, |enc, d| {
        enc.encode_field(&i32::from(d.day_of_week))?;
        enc.encode_field(&d.enabled)?;
        enc.encode_field(&blocks_to_json(&d.blocks))
    })
}

fn override_rows(days: &[DailyOverride]) -> Response {
    query_response(overrides_schema(), days, |enc, d| {
        enc.encode_field(&d.date.to_string())?;
        enc.encode_field(&d.enabled)?;
        enc.encode_field(&d.is_holiday)?;
        enc.encode_field(&blocks_to_json(&d.blocks))
    })
}

fn settings_rows(s: &Settings) -> Response {
    query_response(settings_schema(), [s], |enc, s| {
        enc.encode_field(&(s.duration_minutes as i32))?;
        enc.encode_field(&(s.max_advance_booking_days as i32))?;
        enc.encode_field(&s.min_advance_booking_hours)
    })
}

/// Result columns for a statement, decided from its text alone so that
/// statements with unbound `$N` placeholders can be described.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.trim_start().to_lowercase();
    let is_select = lower.starts_with("select");
    if lower.contains("day_availability") {
        day_availability_schema()
    } else if lower.contains("month_availability") {
        month_availability_schema()
    } else if lower.contains("booking_status") {
        vec![]
    } else if lower.contains("bookings") && (is_select || lower.starts_with("insert")) {
        bookings_schema()
    } else if is_select && lower.contains("weekly_schedule") {
        weekly_schedule_schema()
    } else if is_select && lower.contains("overrides") {
        overrides_schema()
    } else if is_select && lower.contains("settings") {
        settings_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for SlotbookHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SlotbookQueryParser;

#[async_trait]
impl QueryParser for SlotbookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SlotbookHandler {
    type Statement = String;
    type QueryParser = SlotbookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        self.run(&sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// `$N` placeholders outside quoted literals and identifiers, as
/// `(start, end, n)` byte ranges into `sql`.
fn placeholders(sql: &str) -> Vec<(usize, usize, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            // A doubled quote closes and immediately reopens.
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => {
                quote = Some(b);
                i += 1;
            }
            b'$' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    found.push((start, i, n));
                }
            }
            _ => i += 1,
        }
    }
    found
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, _, n)| n).max().unwrap_or(0)
}

/// Single left-to-right pass: each placeholder in the original text becomes
/// its bound value as an escaped literal. Bound values are never rescanned.
fn bind_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    for (start, end, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|k| params.get(k)) else {
            continue;
        };
        out.push_str(&sql[copied..start]);
        match param {
            Some(bytes) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        copied = end;
    }
    out.push_str(&sql[copied..]);
    out
}

fn substitute_params(portal: &Portal<String>) -> String {
    bind_params(&portal.statement.statement, portal.parameters.as_slice())
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SlotbookFactory {
    handler: Arc<SlotbookHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SlotbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl SlotbookFactory {
    pub fn new(engine: Arc<Engine>, user: String, password: String) -> Self {
        let auth_source = SlotbookAuthSource::new(user, password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(SlotbookHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for SlotbookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    factory: Arc<SlotbookFactory>,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE for each booking outcome.
pub fn sqlstate(e: &BookingError) -> &'static str {
    match e {
        BookingError::InvalidFormat(_) => "22007",
        BookingError::InvalidInput(_) => "22000",
        BookingError::TooSoon { .. } | BookingError::TooFar { .. } => "22023",
        BookingError::SlotNotFound | BookingError::NotFound(_) => "P0002",
        BookingError::SlotUnavailable | BookingError::Conflict(_) => "23P01",
        BookingError::InvalidTransition { .. } => "55000",
        BookingError::LimitExceeded(_) => "54000",
        BookingError::Storage(_) => "58030",
    }
}

fn engine_err(e: BookingError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.user_message(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM settings"), 0);
        assert_eq!(count_params("INSERT INTO booking_status VALUES ($1, $2)"), 2);
        assert_eq!(count_params("SELECT * FROM day_availability WHERE date = $10"), 10);
    }

    #[test]
    fn placeholders_inside_literals_are_not_counted() {
        assert_eq!(count_params("SELECT * FROM bookings WHERE date = '$3'"), 0);
        assert_eq!(count_params("INSERT INTO bookings VALUES ($1, 'it''s $9', $2)"), 2);
    }

    #[test]
    fn bound_values_are_not_rescanned() {
        let sql = "INSERT INTO bookings VALUES ($1, $2, $3)";
        let params = [
            Some("2026-10-21".as_bytes()),
            Some("Budget is $1 or $150k".as_bytes()),
            Some("O'Brien".as_bytes()),
        ];
        assert_eq!(
            bind_params(sql, &params),
            "INSERT INTO bookings VALUES ('2026-10-21', 'Budget is $1 or $150k', 'O''Brien')"
        );
    }

    #[test]
    fn quoted_text_and_unbound_placeholders_pass_through() {
        let params = [Some(b"x".as_slice()), None];
        assert_eq!(
            bind_params("SELECT '$1', $1, $2, $3", &params),
            "SELECT '$1', 'x', NULL, $3"
        );
        // A bound value cannot close its literal and smuggle in SQL.
        let params = [Some("a'), ('b".as_bytes())];
        let bound = bind_params("INSERT INTO settings VALUES ($1)", &params);
        assert_eq!(bound, "INSERT INTO settings VALUES ('a''), (''b')");
        assert!(crate::sql::parse_sql(&bound).is_err());
    }

    #[test]
    fn schemas_follow_table_and_verb() {
        assert_eq!(result_schema("SELECT * FROM day_availability WHERE date = $1").len(), 8);
        assert_eq!(result_schema("select * from month_availability where month = $1").len(), 4);
        assert_eq!(result_schema("INSERT INTO bookings VALUES ($1,$2,$3,$4,$5,$6)").len(), 10);
        assert!(result_schema("DELETE FROM bookings WHERE id = $1").is_empty());
        assert!(result_schema("INSERT INTO booking_status VALUES ($1, $2)").is_empty());
        assert!(result_schema("INSERT INTO settings VALUES (30, 60, 24)").is_empty());
        assert_eq!(result_schema("SELECT * FROM settings").len(), 3);
    }

    #[test]
    fn race_losers_share_sqlstate() {
        assert_eq!(sqlstate(&BookingError::SlotUnavailable), "23P01");
        assert_eq!(sqlstate(&BookingError::Conflict(ulid::Ulid::new())), "23P01");
        assert_eq!(sqlstate(&BookingError::TooSoon { min_hours: 24.0 }), "22023");
        assert_eq!(sqlstate(&BookingError::SlotNotFound), "P0002");
    }
}
