use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::limits::MAX_BOOKINGS_PER_DAY;
use crate::model::*;
use crate::wal::Wal;

use super::{BookingTxn, DayLedger, Store, StoreError};

pub type SharedDayLedger = Arc<RwLock<DayLedger>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(cmd) = deferred {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Always flush so partially buffered bytes don't leak into the next
    // batch; callers of this batch are told it failed.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Hand one event to the writer and wait for its batch to be fsynced.
async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), StoreError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
        .map_err(|e| StoreError::Wal(e.to_string()))
}

// ── Replay ───────────────────────────────────────────────

/// State rebuilt from the log before it is shared.
#[derive(Default)]
struct Snapshot {
    weekly: HashMap<u8, WeeklyScheduleDay>,
    overrides: HashMap<NaiveDate, DailyOverride>,
    settings: Settings,
    days: HashMap<NaiveDate, DayLedger>,
    booking_dates: HashMap<Ulid, NaiveDate>,
}

impl Snapshot {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::WeeklyDaySet { day } => {
                self.weekly.insert(day.day_of_week, day.clone());
            }
            Event::WeeklyDayCleared { day_of_week } => {
                self.weekly.remove(day_of_week);
            }
            Event::OverrideSet { day } => {
                self.overrides.insert(day.date, day.clone());
            }
            Event::OverrideCleared { date } => {
                self.overrides.remove(date);
            }
            Event::SettingsUpdated { settings } => self.settings = *settings,
            Event::BookingCreated { booking } => {
                self.booking_dates.insert(booking.id, booking.date);
                self.days.entry(booking.date).or_default().insert(booking.clone());
            }
            Event::BookingStatusChanged { id, date, status } => {
                if let Some(b) = self.days.get_mut(date).and_then(|l| l.get_mut(id)) {
                    b.status = *status;
                }
            }
        }
    }
}

// ── Store ────────────────────────────────────────────────

/// WAL-backed store. All state lives in memory; every mutation is fsynced
/// to the log before it becomes visible.
pub struct WalStore {
    weekly: DashMap<u8, WeeklyScheduleDay>,
    overrides: DashMap<NaiveDate, DailyOverride>,
    settings: RwLock<Settings>,
    days: DashMap<NaiveDate, SharedDayLedger>,
    /// Reverse lookup: booking id → date of its ledger.
    booking_dates: Arc<DashMap<Ulid, NaiveDate>>,
    /// Mutations hold it shared across append+apply; compaction holds it
    /// exclusively so no append can slip between snapshot and swap.
    write_gate: Arc<RwLock<()>>,
    /// Serializes schedule, override and settings writes across append and
    /// apply, so memory sees them in WAL order.
    schedule_lock: Mutex<()>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from within a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path, replay.valid_len)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut snapshot = Snapshot::default();
        for event in &replay.events {
            snapshot.apply(event);
        }
        info!(
            path = %wal_path.display(),
            events = replay.events.len(),
            bookings = snapshot.booking_dates.len(),
            "store replayed"
        );

        Ok(Self {
            weekly: snapshot.weekly.into_iter().collect(),
            overrides: snapshot.overrides.into_iter().collect(),
            settings: RwLock::new(snapshot.settings),
            days: snapshot
                .days
                .into_iter()
                .map(|(date, ledger)| (date, Arc::new(RwLock::new(ledger))))
                .collect(),
            booking_dates: Arc::new(snapshot.booking_dates.into_iter().collect()),
            write_gate: Arc::new(RwLock::new(())),
            schedule_lock: Mutex::new(()),
            wal_tx,
        })
    }

    fn existing_ledger(&self, date: &NaiveDate) -> Option<SharedDayLedger> {
        self.days.get(date).map(|e| e.value().clone())
    }

    fn ledger(&self, date: NaiveDate) -> SharedDayLedger {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayLedger::new())))
            .value()
            .clone()
    }

    /// Schedule lock, then the shared gate, then the WAL append. Callers
    /// apply to memory before dropping the returned guards.
    async fn persist(&self, event: &Event) -> Result<ScheduleGuard<'_>, StoreError> {
        let order = self.schedule_lock.lock().await;
        let gate = self.write_gate.clone().read_owned().await;
        wal_append(&self.wal_tx, event).await?;
        Ok(ScheduleGuard {
            _order: order,
            _gate: gate,
        })
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.write().await;

        let mut events = vec![Event::SettingsUpdated {
            settings: *self.settings.read().await,
        }];

        let mut weekly: Vec<WeeklyScheduleDay> = self.weekly.iter().map(|e| e.value().clone()).collect();
        weekly.sort_by_key(|d| d.day_of_week);
        events.extend(weekly.into_iter().map(|day| Event::WeeklyDaySet { day }));

        let mut overrides: Vec<DailyOverride> = self.overrides.iter().map(|e| e.value().clone()).collect();
        overrides.sort_by_key(|d| d.date);
        events.extend(overrides.into_iter().map(|day| Event::OverrideSet { day }));

        let mut ledgers: Vec<(NaiveDate, SharedDayLedger)> = self
            .days
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        ledgers.sort_by_key(|(date, _)| *date);
        for (_, ledger) in ledgers {
            let guard = ledger.read().await;
            events.extend(guard.all().iter().map(|b| Event::BookingCreated { booking: b.clone() }));
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))?;
        info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Store for WalStore {
    async fn weekly_template(&self, day_of_week: u8) -> Result<Option<WeeklyScheduleDay>, StoreError> {
        Ok(self.weekly.get(&day_of_week).map(|e| e.value().clone()))
    }

    async fn weekly_templates(&self) -> Result<Vec<WeeklyScheduleDay>, StoreError> {
        let mut days: Vec<WeeklyScheduleDay> = self.weekly.iter().map(|e| e.value().clone()).collect();
        days.sort_by_key(|d| d.day_of_week);
        Ok(days)
    }

    async fn daily_override(&self, date: NaiveDate) -> Result<Option<DailyOverride>, StoreError> {
        Ok(self.overrides.get(&date).map(|e| e.value().clone()))
    }

    async fn settings(&self) -> Result<Settings, StoreError> {
        Ok(*self.settings.read().await)
    }

    async fn list_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        let Some(ledger) = self.existing_ledger(&date) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        Ok(guard.all().to_vec())
    }

    async fn list_live_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        let Some(ledger) = self.existing_ledger(&date) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        Ok(guard.live().cloned().collect())
    }

    async fn list_live_bookings_overlapping(
        &self,
        date: NaiveDate,
        span: Span,
    ) -> Result<Vec<Booking>, StoreError> {
        let Some(ledger) = self.existing_ledger(&date) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        Ok(guard.live_overlapping(&span).cloned().collect())
    }

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        let Some(date) = self.booking_dates.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(ledger) = self.existing_ledger(&date) else {
            return Ok(None);
        };
        let guard = ledger.read().await;
        Ok(guard.get(&id).cloned())
    }

    async fn begin_booking(&self, date: NaiveDate) -> Result<Box<dyn BookingTxn>, StoreError> {
        let gate = self.write_gate.clone().read_owned().await;
        let ledger = self.ledger(date).write_owned().await;
        Ok(Box::new(WalBookingTxn {
            date,
            ledger,
            _gate: gate,
            wal_tx: self.wal_tx.clone(),
            booking_dates: self.booking_dates.clone(),
        }))
    }

    async fn set_booking_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, StoreError> {
        let date = self
            .booking_dates
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(id))?;
        let _gate = self.write_gate.read().await;
        let ledger = self.ledger(date);
        let mut guard = ledger.write().await;

        let current = guard.get(&id).ok_or(StoreError::NotFound(id))?.status;
        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition { from: current, to: status });
        }

        wal_append(&self.wal_tx, &Event::BookingStatusChanged { id, date, status }).await?;
        let booking = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        booking.status = status;
        Ok(booking.clone())
    }

    async fn put_weekly_day(&self, day: WeeklyScheduleDay) -> Result<(), StoreError> {
        let _guard = self.persist(&Event::WeeklyDaySet { day: day.clone() }).await?;
        self.weekly.insert(day.day_of_week, day);
        Ok(())
    }

    async fn clear_weekly_day(&self, day_of_week: u8) -> Result<bool, StoreError> {
        let _order = self.schedule_lock.lock().await;
        if !self.weekly.contains_key(&day_of_week) {
            return Ok(false);
        }
        let _gate = self.write_gate.read().await;
        wal_append(&self.wal_tx, &Event::WeeklyDayCleared { day_of_week }).await?;
        Ok(self.weekly.remove(&day_of_week).is_some())
    }

    async fn put_override(&self, day: DailyOverride) -> Result<(), StoreError> {
        let _guard = self.persist(&Event::OverrideSet { day: day.clone() }).await?;
        self.overrides.insert(day.date, day);
        Ok(())
    }

    async fn clear_override(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let _order = self.schedule_lock.lock().await;
        if !self.overrides.contains_key(&date) {
            return Ok(false);
        }
        let _gate = self.write_gate.read().await;
        wal_append(&self.wal_tx, &Event::OverrideCleared { date }).await?;
        Ok(self.overrides.remove(&date).is_some())
    }

    async fn put_settings(&self, settings: Settings) -> Result<(), StoreError> {
        let _guard = self.persist(&Event::SettingsUpdated { settings }).await?;
        *self.settings.write().await = settings;
        Ok(())
    }
}

struct ScheduleGuard<'a> {
    _order: MutexGuard<'a, ()>,
    _gate: OwnedRwLockReadGuard<()>,
}

/// Holds the date's ledger exclusively until `insert` finishes or the
/// transaction is dropped.
struct WalBookingTxn {
    date: NaiveDate,
    ledger: OwnedRwLockWriteGuard<DayLedger>,
    _gate: OwnedRwLockReadGuard<()>,
    wal_tx: mpsc::Sender<WalCommand>,
    booking_dates: Arc<DashMap<Ulid, NaiveDate>>,
}

#[async_trait]
impl BookingTxn for WalBookingTxn {
    fn live_overlapping(&self, span: &Span) -> Vec<Booking> {
        self.ledger.live_overlapping(span).cloned().collect()
    }

    async fn insert(self: Box<Self>, booking: Booking) -> Result<Booking, StoreError> {
        let mut txn = self;
        debug_assert_eq!(booking.date, txn.date, "booking inserted under another date's lock");
        if let Some(existing) = txn.ledger.live_overlapping(&booking.span).next() {
            return Err(StoreError::Overlap(existing.id));
        }
        if txn.ledger.len() >= MAX_BOOKINGS_PER_DAY {
            return Err(StoreError::LimitExceeded("too many bookings on date"));
        }

        wal_append(&txn.wal_tx, &Event::BookingCreated { booking: booking.clone() }).await?;
        txn.booking_dates.insert(booking.id, booking.date);
        txn.ledger.insert(booking.clone());
        Ok(booking)
    }
}
