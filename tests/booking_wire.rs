use std::net::SocketAddr;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::net::TcpListener;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use slotbook::engine::{Clock, Engine};
use slotbook::store::WalStore;
use slotbook::wire::{self, SlotbookFactory};

// ── Test infrastructure ──────────────────────────────────────

const WEDNESDAY: &str = "2026-10-21";

/// Server whose clock is frozen at Monday 2026-10-19 10:00.
async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("slotbook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(WalStore::open(dir.join("slotbook.wal")).unwrap());
    let now = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let engine = Arc::new(Engine::with_clock(store, Clock::Fixed(now)));
    let factory = Arc::new(SlotbookFactory::new(engine, "slotbook".into(), "slotbook".into()));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let factory = factory.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, factory, None).await;
            });
        }
    });

    addr
}

async fn try_connect(addr: SocketAddr, user: &str, password: &str) -> Result<Client, tokio_postgres::Error> {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("slotbook")
        .user(user)
        .password(password);

    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(client)
}

async fn connect(addr: SocketAddr) -> Client {
    try_connect(addr, "slotbook", "slotbook").await.unwrap()
}

async fn rows(client: &Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

/// Wednesdays open 09:00-12:00 in 30-minute slots.
async fn open_wednesdays(client: &Client) {
    client
        .batch_execute(
            r#"INSERT INTO weekly_schedule VALUES (3, true, '[{"start_time":"09:00:00","end_time":"12:00:00","slot_duration":30}]')"#,
        )
        .await
        .unwrap();
}

fn book_sql(date: &str, start: &str, end: &str, name: &str) -> String {
    format!(
        "INSERT INTO bookings (date, start_time, end_time, name, email, phone) \
         VALUES ('{date}', '{start}', '{end}', '{name}', '{name}@example.com', '555-0100')"
    )
}

fn sqlstate(err: &tokio_postgres::Error) -> Option<&str> {
    err.code().map(|c| c.code())
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn day_availability_lists_template_slots() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    let slots = rows(&client, &format!("SELECT * FROM day_availability WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0].get("day_status"), Some("available"));
    assert_eq!(slots[0].get("start_time"), Some("09:00:00"));
    assert_eq!(slots[0].get("end_time"), Some("09:30:00"));
    assert_eq!(slots[5].get("end_time"), Some("12:00:00"));
    assert!(slots.iter().all(|r| r.get("available") == Some("t")));

    let weekly = rows(&client, "SELECT * FROM weekly_schedule").await;
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].get("day_of_week"), Some("3"));
}

#[tokio::test]
async fn closed_day_returns_single_null_row() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    // Thursday has no template.
    let day = rows(&client, "SELECT * FROM day_availability WHERE date = '2026-10-22'").await;
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].get("day_status"), Some("weekday_unavailable"));
    assert_eq!(day[0].get("start_time"), None);
}

#[tokio::test]
async fn booking_round_trip_over_the_wire() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    let inserted = rows(&client, &book_sql(WEDNESDAY, "09:30:00", "10:00:00", "ada")).await;
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].get("status"), Some("pending"));
    assert_eq!(inserted[0].get("start_time"), Some("09:30:00"));
    let id = inserted[0].get("id").unwrap().to_string();
    assert!(id.parse::<Ulid>().is_ok());

    let day = rows(&client, &format!("SELECT * FROM day_availability WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(day[0].get("day_status"), Some("time_slots_booking"));
    assert_eq!(day[1].get("available"), Some("f"));
    assert_eq!(day[1].get("status"), Some("pending"));
    assert_eq!(day[1].get("booking_id"), Some(id.as_str()));
    assert_eq!(day[2].get("available"), Some("t"));

    let listed = rows(&client, &format!("SELECT * FROM bookings WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get("email"), Some("ada@example.com"));
}

#[tokio::test]
async fn taken_slot_reports_exclusion_violation() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    client
        .simple_query(&book_sql(WEDNESDAY, "09:00:00", "09:30:00", "ada"))
        .await
        .unwrap();
    let err = client
        .simple_query(&book_sql(WEDNESDAY, "09:00:00", "09:30:00", "grace"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("23P01"));
}

#[tokio::test]
async fn rejection_codes() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    // Off-grid slot.
    let err = client
        .simple_query(&book_sql(WEDNESDAY, "09:15:00", "09:45:00", "ada"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("P0002"));

    // Tomorrow is inside the 24h notice window.
    let err = client
        .simple_query(&book_sql("2026-10-20", "09:00:00", "09:30:00", "ada"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("22023"));

    let err = client
        .simple_query(&book_sql(WEDNESDAY, "9am", "09:30:00", "ada"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("22007"));

    let err = client
        .simple_query("SELECT * FROM resources")
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("42601"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_one_winner() {
    let addr = start_test_server().await;
    let setup = connect(addr).await;
    open_wednesdays(&setup).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        handles.push(tokio::spawn(async move {
            let client = connect(addr).await;
            client
                .simple_query(&book_sql(WEDNESDAY, "10:00:00", "10:30:00", &format!("visitor{i}")))
                .await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert_eq!(sqlstate(&e), Some("23P01")),
        }
    }
    assert_eq!(wins, 1);

    let listed = rows(&setup, &format!("SELECT * FROM bookings WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn cancel_and_status_transitions() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    let first = rows(&client, &book_sql(WEDNESDAY, "11:00:00", "11:30:00", "ada")).await;
    let id = first[0].get("id").unwrap().to_string();

    client
        .batch_execute(&format!("INSERT INTO booking_status VALUES ('{id}', 'confirmed')"))
        .await
        .unwrap();
    let listed = rows(&client, &format!("SELECT * FROM bookings WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(listed[0].get("status"), Some("confirmed"));

    client
        .batch_execute(&format!("DELETE FROM bookings WHERE id = '{id}'"))
        .await
        .unwrap();

    // Cancelling frees the slot for someone else.
    let again = rows(&client, &book_sql(WEDNESDAY, "11:00:00", "11:30:00", "grace")).await;
    assert_eq!(again.len(), 1);
    assert_ne!(again[0].get("id"), Some(id.as_str()));

    // Cancelled is final.
    let err = client
        .batch_execute(&format!("INSERT INTO booking_status VALUES ('{id}', 'confirmed')"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("55000"));

    let err = client
        .batch_execute(&format!("DELETE FROM bookings WHERE id = '{}'", Ulid::new()))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("P0002"));
}

#[tokio::test]
async fn overrides_and_month_view() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    client
        .batch_execute("INSERT INTO overrides VALUES ('2026-10-28', false, true, '[]')")
        .await
        .unwrap();
    let found = rows(&client, "SELECT * FROM overrides WHERE date = '2026-10-28'").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("is_holiday"), Some("t"));

    let month = rows(&client, "SELECT * FROM month_availability WHERE month = '2026-10'").await;
    assert_eq!(month.len(), 31);
    let status_of = |date: &str| {
        month
            .iter()
            .find(|r| r.get("date") == Some(date))
            .and_then(|r| r.get("day_status"))
            .map(str::to_owned)
    };
    assert_eq!(status_of("2026-10-14").as_deref(), Some("from_today_unavailable"));
    assert_eq!(status_of(WEDNESDAY).as_deref(), Some("available"));
    assert_eq!(status_of("2026-10-28").as_deref(), Some("weekday_unavailable"));

    client
        .batch_execute("DELETE FROM overrides WHERE date = '2026-10-28'")
        .await
        .unwrap();
    let day = rows(&client, "SELECT * FROM day_availability WHERE date = '2026-10-28'").await;
    assert_eq!(day.len(), 6);
}

#[tokio::test]
async fn settings_round_trip() {
    let addr = start_test_server().await;
    let client = connect(addr).await;

    let defaults = rows(&client, "SELECT * FROM settings").await;
    assert_eq!(defaults[0].get("duration_minutes"), Some("60"));

    client
        .batch_execute("INSERT INTO settings VALUES (45, 30, 2)")
        .await
        .unwrap();
    let updated = rows(&client, "SELECT * FROM settings").await;
    assert_eq!(updated[0].get("duration_minutes"), Some("45"));
    assert_eq!(updated[0].get("max_advance_booking_days"), Some("30"));

    let err = client
        .batch_execute("INSERT INTO settings VALUES (0, 30, 2)")
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("22000"));
}

#[tokio::test]
async fn extended_protocol_binds_parameters() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    let booked = client
        .query(
            "INSERT INTO bookings (date, start_time, end_time, name, email, phone) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[&WEDNESDAY, &"09:00:00", &"09:30:00", &"O'Brien", &"ob@example.com", &"555-0101"],
        )
        .await
        .unwrap();
    assert_eq!(booked.len(), 1);
    let name: String = booked[0].get("name");
    assert_eq!(name, "O'Brien");

    let day = client
        .query("SELECT * FROM day_availability WHERE date = $1", &[&WEDNESDAY])
        .await
        .unwrap();
    assert_eq!(day.len(), 6);
    let status: String = day[0].get("status");
    assert_eq!(status, "pending");
}

#[tokio::test]
async fn dollar_signs_in_visitor_text_survive_binding() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    open_wednesdays(&client).await;

    let message = "Budget is $150k, ask for $2 parking";
    let booked = client
        .query(
            "INSERT INTO bookings (date, start_time, end_time, name, email, phone, message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &WEDNESDAY,
                &"10:30:00",
                &"11:00:00",
                &"Ada $1",
                &"ada@example.com",
                &"555-0102",
                &message,
            ],
        )
        .await
        .unwrap();
    assert_eq!(booked.len(), 1);
    let name: String = booked[0].get("name");
    let stored: Option<String> = booked[0].get("message");
    assert_eq!(name, "Ada $1");
    assert_eq!(stored.as_deref(), Some(message));

    let listed = rows(&client, &format!("SELECT * FROM bookings WHERE date = '{WEDNESDAY}'")).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get("message"), Some(message));
}

#[tokio::test]
async fn wrong_credentials_are_refused() {
    let addr = start_test_server().await;
    assert!(try_connect(addr, "slotbook", "wrong").await.is_err());
    assert!(try_connect(addr, "intruder", "slotbook").await.is_err());
    assert!(try_connect(addr, "slotbook", "slotbook").await.is_ok());
}
