//! Shared test doubles for units of work, time and log capture.

use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use serde_json::Value;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::{Error, UnitOfWork, UnitOfWorkFactory};

/// Transaction protocol call observed by a [`RecordingUnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Begin,
    Save,
    Commit,
    Rollback,
}

/// Shared, ordered log of calls across every unit a factory created.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.lock().expect("journal lock").push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().expect("journal lock").clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }
}

/// Which protocol steps should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub save: bool,
    pub commit: bool,
    pub rollback: bool,
}

/// Unit of work that records protocol calls instead of touching storage.
#[derive(Debug)]
pub struct RecordingUnitOfWork {
    journal: Journal,
    failures: Failures,
    open: AtomicBool,
}

impl RecordingUnitOfWork {
    pub fn new(journal: Journal, failures: Failures) -> Self {
        Self {
            journal,
            failures,
            open: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl UnitOfWork for RecordingUnitOfWork {
    async fn begin(&self) -> Result<(), Error> {
        if !self.open.swap(true, Ordering::SeqCst) {
            self.journal.record(Call::Begin);
        }
        Ok(())
    }

    async fn save_changes(&self) -> Result<u64, Error> {
        self.journal.record(Call::Save);
        if self.failures.save {
            return Err(Error::database("save_changes", "simulated save failure"));
        }
        Ok(1)
    }

    async fn commit(&self) -> Result<(), Error> {
        if !self.open.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.journal.record(Call::Commit);
        if self.failures.commit {
            return Err(Error::database("commit", "simulated commit failure"));
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), Error> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.journal.record(Call::Rollback);
        if self.failures.rollback {
            return Err(Error::database("rollback", "simulated rollback failure"));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Factory producing [`RecordingUnitOfWork`] instances over one journal.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    journal: Journal,
    failures: Failures,
    created: Arc<AtomicUsize>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: Failures) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl UnitOfWorkFactory for RecordingFactory {
    fn create(&self) -> Arc<dyn UnitOfWork> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(RecordingUnitOfWork::new(self.journal.clone(), self.failures))
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl FixtureClock {
    pub fn at(utc_now: DateTime<Utc>) -> Self {
        Self { utc_now }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

/// Instant used by fixtures: 2024-05-01T12:30:00.250Z.
pub fn fixture_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:30:00.250Z")
        .expect("valid fixture timestamp")
        .with_timezone(&Utc)
}

pub fn fixture_clock() -> Arc<FixtureClock> {
    Arc::new(FixtureClock::at(fixture_timestamp()))
}

/// In-memory sink for JSON-formatted tracing output.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Every event written so far, one JSON object per line.
    pub fn events(&self) -> Vec<Value> {
        let bytes = self.0.lock().expect("log buffer lock").clone();
        String::from_utf8(bytes)
            .expect("utf-8 log output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json log line"))
            .collect()
    }

    /// Events whose message is `message`.
    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["fields"]["message"] == message)
            .collect()
    }
}

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.0))
    }
}

/// Route this thread's tracing events into a fresh [`LogBuffer`] until the
/// guard drops. Pair with a current-thread runtime so awaits stay covered.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::TRACE)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
