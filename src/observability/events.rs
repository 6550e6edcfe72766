//! Structured event stream.
//!
//! Discrete, typed events emitted during an attempt. Events are serialized
//! as newline-delimited JSON (JSONL) with a monotonically increasing
//! sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::phase::PhaseId;
use crate::verdict::{EndCause, Overall};

/// A discrete event emitted during an attempt.
///
/// Tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Workers were spawned.
    AttemptStarted {
        /// When the attempt started.
        timestamp: DateTime<Utc>,
        /// Attempt identifier.
        attempt: Uuid,
        /// Strike budget.
        strikes: u32,
        /// Countdown length in seconds.
        countdown_secs: u64,
    },

    /// A puzzle phase solved.
    PhaseSolved {
        /// When the phase settled.
        timestamp: DateTime<Utc>,
        /// Attempt identifier.
        attempt: Uuid,
        /// Which phase.
        phase: PhaseId,
    },

    /// A phase failed. For the countdown this means time ran out.
    PhaseFailed {
        /// When the phase settled.
        timestamp: DateTime<Utc>,
        /// Attempt identifier.
        attempt: Uuid,
        /// Which phase.
        phase: PhaseId,
        /// Strikes left after this failure was charged.
        strikes_remaining: u32,
    },

    /// The countdown was paused or resumed.
    PauseChanged {
        /// When the flag changed.
        timestamp: DateTime<Utc>,
        /// Attempt identifier.
        attempt: Uuid,
        /// New value of the flag.
        paused: bool,
    },

    /// The verdict left `Pending`.
    AttemptFinished {
        /// When the attempt ended.
        timestamp: DateTime<Utc>,
        /// Attempt identifier.
        attempt: Uuid,
        /// Final outcome.
        overall: Overall,
        /// Why it ended.
        cause: Option<EndCause>,
        /// Strikes left at the end.
        strikes_remaining: u32,
        /// Wall time since start in milliseconds.
        elapsed_ms: u64,
    },
}

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; events must never stop an
/// attempt.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-02-04T10:15:30Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_envelope_shape() {
        let writer = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(writer.clone()));
        let attempt = Uuid::nil();
        emitter.emit(Event::PhaseFailed {
            timestamp: timestamp(),
            attempt,
            phase: PhaseId::WirePair,
            strikes_remaining: 2,
        });

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "PhaseFailed");
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["phase"], "wire_pair");
        assert_eq!(lines[0]["strikes_remaining"], 2);
        assert_eq!(lines[0]["timestamp"], "2025-02-04T10:15:30Z");
    }

    #[test]
    fn test_sequence_increments() {
        let writer = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(writer.clone()));
        for paused in [true, false, true] {
            emitter.emit(Event::PauseChanged {
                timestamp: timestamp(),
                attempt: Uuid::nil(),
                paused,
            });
        }
        let sequences: Vec<_> = writer.lines().iter().map(|l| l["sequence"].clone()).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(emitter.event_count(), 3);
    }

    #[test]
    fn test_finished_serializes_enums_snake_case() {
        let writer = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(writer.clone()));
        emitter.emit(Event::AttemptFinished {
            timestamp: timestamp(),
            attempt: Uuid::nil(),
            overall: Overall::Exploded,
            cause: Some(EndCause::StrikesExhausted),
            strikes_remaining: 0,
            elapsed_ms: 1500,
        });
        let line = &writer.lines()[0];
        assert_eq!(line["overall"], "exploded");
        assert_eq!(line["cause"], "strikes_exhausted");
        assert_eq!(line["elapsed_ms"], 1500);
    }

    #[test]
    fn test_noop_counts_but_discards() {
        let emitter = EventEmitter::noop();
        emitter.emit(Event::PauseChanged {
            timestamp: timestamp(),
            attempt: Uuid::nil(),
            paused: true,
        });
        assert_eq!(emitter.event_count(), 1);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let emitter = EventEmitter::from_file(&path).unwrap();
        emitter.emit(Event::PhaseSolved {
            timestamp: timestamp(),
            attempt: Uuid::nil(),
            phase: PhaseId::ToggleBank,
        });
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"phase\":\"toggle_bank\""));
    }
}
