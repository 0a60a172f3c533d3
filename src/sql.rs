use chrono::NaiveDate;
use serde::Deserialize;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::limits::MAX_BLOCKS_JSON_LEN;
use crate::model::*;
use crate::time::time_to_seconds;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SelectDayAvailability {
        date: NaiveDate,
    },
    SelectMonthAvailability {
        year: i32,
        month: u32,
    },
    /// Times stay as text: parsing them is part of booking validation.
    InsertBooking {
        date: NaiveDate,
        start_time: String,
        end_time: String,
        visitor: Visitor,
    },
    DeleteBooking {
        id: Ulid,
    },
    SetBookingStatus {
        id: Ulid,
        status: BookingStatus,
    },
    SelectBookings {
        date: NaiveDate,
    },
    UpsertWeeklyDay {
        day: WeeklyScheduleDay,
    },
    DeleteWeeklyDay {
        day_of_week: u8,
    },
    SelectWeeklySchedule,
    UpsertOverride {
        day: DailyOverride,
    },
    DeleteOverride {
        date: NaiveDate,
    },
    SelectOverride {
        date: NaiveDate,
    },
    UpdateSettings {
        settings: Settings,
    },
    SelectSettings,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "bookings" => {
            if values.len() < 6 {
                return Err(SqlError::WrongArity("bookings", 6, values.len()));
            }
            Ok(Command::InsertBooking {
                date: parse_date(&values[0])?,
                start_time: parse_string(&values[1])?,
                end_time: parse_string(&values[2])?,
                visitor: Visitor {
                    name: parse_string(&values[3])?,
                    email: parse_string(&values[4])?,
                    phone: parse_string(&values[5])?,
                    message: match values.get(6) {
                        Some(v) => parse_string_or_null(v)?,
                        None => None,
                    },
                },
            })
        }
        "booking_status" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("booking_status", 2, values.len()));
            }
            let status = parse_string(&values[1])?;
            Ok(Command::SetBookingStatus {
                id: parse_ulid(&values[0])?,
                status: status.parse().map_err(SqlError::Parse)?,
            })
        }
        "weekly_schedule" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("weekly_schedule", 2, values.len()));
            }
            Ok(Command::UpsertWeeklyDay {
                day: WeeklyScheduleDay {
                    day_of_week: parse_u8(&values[0])?,
                    enabled: parse_bool(&values[1])?,
                    blocks: parse_blocks_or_null(values.get(2))?,
                },
            })
        }
        "overrides" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("overrides", 3, values.len()));
            }
            Ok(Command::UpsertOverride {
                day: DailyOverride {
                    date: parse_date(&values[0])?,
                    enabled: parse_bool(&values[1])?,
                    is_holiday: parse_bool(&values[2])?,
                    blocks: parse_blocks_or_null(values.get(3))?,
                },
            })
        }
        "settings" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("settings", 3, values.len()));
            }
            Ok(Command::UpdateSettings {
                settings: Settings {
                    duration_minutes: parse_u32(&values[0])?,
                    max_advance_booking_days: parse_u32(&values[1])?,
                    min_advance_booking_hours: parse_f64(&values[2])?,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = where_filters(delete.selection.as_ref());

    match table.as_str() {
        "bookings" => Ok(Command::DeleteBooking {
            id: parse_ulid(required(&filters, "id")?)?,
        }),
        "weekly_schedule" => Ok(Command::DeleteWeeklyDay {
            day_of_week: parse_u8(required(&filters, "day_of_week")?)?,
        }),
        "overrides" => Ok(Command::DeleteOverride {
            date: parse_date(required(&filters, "date")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = where_filters(select.selection.as_ref());

    match table.as_str() {
        "day_availability" => Ok(Command::SelectDayAvailability {
            date: parse_date(required(&filters, "date")?)?,
        }),
        "month_availability" => {
            let (year, month) = parse_year_month(&parse_string(required(&filters, "month")?)?)?;
            Ok(Command::SelectMonthAvailability { year, month })
        }
        "bookings" => Ok(Command::SelectBookings {
            date: parse_date(required(&filters, "date")?)?,
        }),
        "overrides" => Ok(Command::SelectOverride {
            date: parse_date(required(&filters, "date")?)?,
        }),
        "weekly_schedule" => Ok(Command::SelectWeeklySchedule),
        "settings" => Ok(Command::SelectSettings),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Collect `column = value` pairs from an AND-chain. Other predicates are
/// ignored.
fn where_filters(selection: Option<&Expr>) -> Vec<(String, &Expr)> {
    let mut out = Vec::new();
    if let Some(expr) = selection {
        collect_eq_filters(expr, &mut out);
    }
    out
}

fn collect_eq_filters<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, out);
            collect_eq_filters(right, out);
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if let Some(col) = expr_column_name(left) {
                out.push((col, right.as_ref()));
            }
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        _ => {}
    }
}

fn required<'a>(filters: &[(String, &'a Expr)], col: &'static str) -> Result<&'a Expr, SqlError> {
    filters
        .iter()
        .find(|(c, _)| c == col)
        .map(|(_, e)| *e)
        .ok_or(SqlError::MissingFilter(col))
}

// ── Time blocks ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BlockJson {
    start_time: String,
    end_time: String,
    #[serde(default)]
    slot_duration: Option<u32>,
}

/// Parse a JSON array of blocks. Range checks (start < end, overlap) are
/// left to schedule validation.
pub fn parse_blocks_json(json: &str) -> Result<Vec<TimeBlock>, SqlError> {
    if json.len() > MAX_BLOCKS_JSON_LEN {
        return Err(SqlError::Parse("time blocks JSON too long".into()));
    }
    let raw: Vec<BlockJson> =
        serde_json::from_str(json).map_err(|e| SqlError::Parse(format!("bad time blocks JSON: {e}")))?;
    raw.into_iter()
        .map(|b| {
            let start = time_to_seconds(&b.start_time).map_err(|e| SqlError::Parse(e.to_string()))?;
            let end = time_to_seconds(&b.end_time).map_err(|e| SqlError::Parse(e.to_string()))?;
            Ok(TimeBlock {
                span: Span { start, end },
                slot_duration: b.slot_duration,
            })
        })
        .collect()
}

fn parse_blocks_or_null(expr: Option<&Expr>) -> Result<Vec<TimeBlock>, SqlError> {
    match expr {
        None => Ok(Vec::new()),
        Some(e) => match parse_string_or_null(e)? {
            None => Ok(Vec::new()),
            Some(json) => parse_blocks_json(&json),
        },
    }
}

/// Render blocks back to the JSON shape accepted by [`parse_blocks_json`].
pub fn blocks_to_json(blocks: &[TimeBlock]) -> String {
    let raw: Vec<serde_json::Value> = blocks
        .iter()
        .map(|b| {
            let mut obj = serde_json::json!({
                "start_time": crate::time::seconds_to_time(b.span.start),
                "end_time": crate::time::seconds_to_time(b.span.end),
            });
            if let Some(minutes) = b.slot_duration {
                obj["slot_duration"] = minutes.into();
            }
            obj
        })
        .collect();
    serde_json::Value::Array(raw).to_string()
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.len() != 1 {
                return Err(SqlError::Parse(format!(
                    "expected exactly one VALUES row, got {}",
                    values.rows.len()
                )));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    parse_string_or_null(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| SqlError::Parse(format!("bad date '{s}': {e}")))
}

fn parse_year_month(s: &str) -> Result<(i32, u32), SqlError> {
    let bad = || SqlError::Parse(format!("bad month '{s}', expected YYYY-MM"));
    let (y, m) = s.split_once('-').ok_or_else(bad)?;
    if y.len() != 4 || m.len() != 2 {
        return Err(bad());
    }
    Ok((y.parse().map_err(|_| bad())?, m.parse().map_err(|_| bad())?))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u8(expr: &Expr) -> Result<u8, SqlError> {
    let v = parse_i64_expr(expr)?;
    u8::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected at least {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_select_day_availability() {
        let cmd = parse_sql("SELECT * FROM day_availability WHERE date = '2026-10-21'").unwrap();
        assert_eq!(cmd, Command::SelectDayAvailability { date: d(2026, 10, 21) });
    }

    #[test]
    fn parse_select_month_availability() {
        let cmd = parse_sql("SELECT * FROM month_availability WHERE month = '2026-02'").unwrap();
        assert_eq!(cmd, Command::SelectMonthAvailability { year: 2026, month: 2 });
        assert!(parse_sql("SELECT * FROM month_availability WHERE month = '2026-2'").is_err());
        assert!(matches!(
            parse_sql("SELECT * FROM month_availability"),
            Err(SqlError::MissingFilter("month"))
        ));
    }

    #[test]
    fn parse_insert_booking() {
        let sql = "INSERT INTO bookings (date, start_time, end_time, name, email, phone) \
                   VALUES ('2026-10-21', '09:00:00', '09:30:00', 'Ada', 'ada@example.com', '555-0100')";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking {
                date,
                start_time,
                end_time,
                visitor,
            } => {
                assert_eq!(date, d(2026, 10, 21));
                assert_eq!(start_time, "09:00:00");
                assert_eq!(end_time, "09:30:00");
                assert_eq!(visitor.name, "Ada");
                assert_eq!(visitor.message, None);
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_with_message() {
        let sql = "INSERT INTO bookings VALUES ('2026-10-21', '09:00:00', '09:30:00', 'Ada', \
                   'ada@example.com', '555-0100', 'Is parking available?')";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking { visitor, .. } => {
                assert_eq!(visitor.message.as_deref(), Some("Is parking available?"));
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn insert_booking_short_row_errors() {
        let sql = "INSERT INTO bookings VALUES ('2026-10-21', '09:00:00', '09:30:00')";
        assert!(matches!(parse_sql(sql), Err(SqlError::WrongArity("bookings", 6, 3))));
    }

    #[test]
    fn multi_row_insert_rejected() {
        let sql = "INSERT INTO booking_status VALUES ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'confirmed'), \
                   ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'cancelled')";
        assert!(parse_sql(sql).is_err());
    }

    #[test]
    fn parse_booking_status() {
        let sql = "INSERT INTO booking_status VALUES ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'confirmed')";
        match parse_sql(sql).unwrap() {
            Command::SetBookingStatus { id, status } => {
                assert_eq!(id.to_string(), "01ARZ3NDEKTSV4RRFFQ69G5FAV");
                assert_eq!(status, BookingStatus::Confirmed);
            }
            other => panic!("expected SetBookingStatus, got {other:?}"),
        }
        let bad = "INSERT INTO booking_status VALUES ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'booked')";
        assert!(parse_sql(bad).is_err());
    }

    #[test]
    fn parse_delete_booking() {
        let cmd = parse_sql("DELETE FROM bookings WHERE id = '01ARZ3NDEKTSV4RRFFQ69G5FAV'").unwrap();
        assert!(matches!(cmd, Command::DeleteBooking { .. }));
        assert!(matches!(
            parse_sql("DELETE FROM bookings"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_weekly_schedule_upsert() {
        let sql = r#"INSERT INTO weekly_schedule VALUES (3, true, '[{"start_time":"09:00:00","end_time":"12:00:00","slot_duration":30},{"start_time":"13:00:00","end_time":"17:00:00"}]')"#;
        match parse_sql(sql).unwrap() {
            Command::UpsertWeeklyDay { day } => {
                assert_eq!(day.day_of_week, 3);
                assert!(day.enabled);
                assert_eq!(day.blocks.len(), 2);
                assert_eq!(day.blocks[0].span, Span::new(9 * 3600, 12 * 3600));
                assert_eq!(day.blocks[0].slot_duration, Some(30));
                assert_eq!(day.blocks[1].slot_duration, None);
            }
            other => panic!("expected UpsertWeeklyDay, got {other:?}"),
        }
    }

    #[test]
    fn weekly_schedule_without_blocks() {
        let cmd = parse_sql("INSERT INTO weekly_schedule VALUES (0, false)").unwrap();
        match cmd {
            Command::UpsertWeeklyDay { day } => {
                assert!(!day.enabled);
                assert!(day.blocks.is_empty());
            }
            other => panic!("expected UpsertWeeklyDay, got {other:?}"),
        }
        let cmd = parse_sql("INSERT INTO weekly_schedule VALUES (0, 'f', NULL)").unwrap();
        assert!(matches!(cmd, Command::UpsertWeeklyDay { ref day } if day.blocks.is_empty()));
    }

    #[test]
    fn parse_override_upsert_and_delete() {
        let sql = "INSERT INTO overrides VALUES ('2026-12-25', false, true, '[]')";
        match parse_sql(sql).unwrap() {
            Command::UpsertOverride { day } => {
                assert_eq!(day.date, d(2026, 12, 25));
                assert!(!day.enabled);
                assert!(day.is_holiday);
            }
            other => panic!("expected UpsertOverride, got {other:?}"),
        }
        let cmd = parse_sql("DELETE FROM overrides WHERE date = '2026-12-25'").unwrap();
        assert_eq!(cmd, Command::DeleteOverride { date: d(2026, 12, 25) });
        let cmd = parse_sql("SELECT * FROM overrides WHERE date = '2026-12-25'").unwrap();
        assert_eq!(cmd, Command::SelectOverride { date: d(2026, 12, 25) });
    }

    #[test]
    fn parse_settings() {
        let cmd = parse_sql("INSERT INTO settings VALUES (30, 90, 1.5)").unwrap();
        assert_eq!(
            cmd,
            Command::UpdateSettings {
                settings: Settings {
                    duration_minutes: 30,
                    max_advance_booking_days: 90,
                    min_advance_booking_hours: 1.5,
                }
            }
        );
        // Extended-protocol parameters arrive quoted.
        let cmd = parse_sql("INSERT INTO settings VALUES ('30', '90', '24')").unwrap();
        assert!(matches!(cmd, Command::UpdateSettings { settings } if settings.min_advance_booking_hours == 24.0));
        assert_eq!(parse_sql("SELECT * FROM settings").unwrap(), Command::SelectSettings);
    }

    #[test]
    fn parse_listing_selects() {
        assert_eq!(
            parse_sql("SELECT * FROM bookings WHERE date = '2026-10-21'").unwrap(),
            Command::SelectBookings { date: d(2026, 10, 21) }
        );
        assert_eq!(
            parse_sql("SELECT * FROM weekly_schedule").unwrap(),
            Command::SelectWeeklySchedule
        );
        assert_eq!(
            parse_sql("DELETE FROM weekly_schedule WHERE day_of_week = 6").unwrap(),
            Command::DeleteWeeklyDay { day_of_week: 6 }
        );
    }

    #[test]
    fn filters_found_anywhere_in_and_chain() {
        let sql = "SELECT * FROM day_availability WHERE 1 = 1 AND (date = '2026-10-21')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectDayAvailability { date: d(2026, 10, 21) }
        );
    }

    #[test]
    fn bad_date_and_blocks_error() {
        assert!(parse_sql("SELECT * FROM day_availability WHERE date = '2026-02-30'").is_err());
        assert!(parse_sql("INSERT INTO weekly_schedule VALUES (1, true, 'not json')").is_err());
        let bad_time = r#"INSERT INTO weekly_schedule VALUES (1, true, '[{"start_time":"9am","end_time":"12:00:00"}]')"#;
        assert!(parse_sql(bad_time).is_err());
    }

    #[test]
    fn blocks_json_round_trip_shape() {
        let blocks = parse_blocks_json(
            r#"[{"start_time":"09:00:00","end_time":"12:00:00","slot_duration":30},{"start_time":"13:00:00","end_time":"14:00:00"}]"#,
        )
        .unwrap();
        assert_eq!(
            blocks_to_json(&blocks),
            r#"[{"end_time":"12:00:00","slot_duration":30,"start_time":"09:00:00"},{"end_time":"14:00:00","start_time":"13:00:00"}]"#
        );
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("SELECT * FROM resources"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
