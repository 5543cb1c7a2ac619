//! Debounced background lookups driven by callsign input.
//!
//! The coordinator owns at most one lookup task at a time. Every input change
//! aborts the previous task and, if the input qualifies, schedules a new one
//! after a quiet period. Results come back over a channel tagged with a
//! ticket and the callsign that triggered them; [`LookupCoordinator::accept`]
//! drops anything that no longer matches the current input.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::directory::{Directory, DirectoryRecord};
use crate::validate::validate_callsign;

/// Quiet period before a lookup starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Shortest input that triggers a lookup.
pub const MIN_LOOKUP_CHARS: usize = 3;

/// Settings controlling when lookups run.
#[derive(Debug, Clone)]
pub struct LookupSettings {
    /// Whether input changes trigger lookups at all.
    pub enabled: bool,

    pub debounce: Duration,

    pub min_chars: usize,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
            min_chars: MIN_LOOKUP_CHARS,
        }
    }
}

/// Result of a background lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupEvent {
    Completed {
        ticket: u64,
        callsign: String,
        record: DirectoryRecord,
    },
    Failed {
        ticket: u64,
        callsign: String,
        reason: String,
    },
}

impl LookupEvent {
    pub fn ticket(&self) -> u64 {
        match self {
            LookupEvent::Completed { ticket, .. } | LookupEvent::Failed { ticket, .. } => *ticket,
        }
    }

    pub fn callsign(&self) -> &str {
        match self {
            LookupEvent::Completed { callsign, .. } | LookupEvent::Failed { callsign, .. } => {
                callsign
            }
        }
    }
}

/// An accepted (non-stale) lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found {
        callsign: String,
        record: DirectoryRecord,
    },
    Failed {
        callsign: String,
        reason: String,
    },
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    callsign: String,
    handle: JoinHandle<()>,
}

/// Schedules, cancels, and correlates directory lookups.
pub struct LookupCoordinator<D: Directory> {
    directory: Arc<D>,
    settings: LookupSettings,
    events: mpsc::Sender<LookupEvent>,
    next_ticket: u64,
    current: Option<InFlight>,
}

impl<D: Directory> LookupCoordinator<D> {
    /// Create a coordinator and the receiver its results arrive on.
    pub fn new(
        directory: Arc<D>,
        settings: LookupSettings,
    ) -> (Self, mpsc::Receiver<LookupEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let coordinator = Self {
            directory,
            settings,
            events: tx,
            next_ticket: 1,
            current: None,
        };
        (coordinator, rx)
    }

    pub fn settings(&self) -> &LookupSettings {
        &self.settings
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    /// Callsign of the lookup currently scheduled or running, if any.
    pub fn pending(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.callsign.as_str())
    }

    /// Whether `text` qualifies for a lookup under the current settings.
    ///
    /// Only well-formed callsigns qualify, so nothing is scheduled for input
    /// that would be skipped anyway.
    pub fn should_lookup(&self, text: &str) -> bool {
        self.settings.enabled
            && text.trim().chars().count() >= self.settings.min_chars
            && validate_callsign(text)
            && self.directory.is_configured()
    }

    /// React to a change of the callsign input.
    ///
    /// Any earlier lookup is aborted. Returns `true` if a new lookup was
    /// scheduled.
    pub fn input_changed(&mut self, text: &str) -> bool {
        self.cancel();

        if !self.should_lookup(text) {
            return false;
        }

        let callsign = text.trim().to_uppercase();
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let directory = Arc::clone(&self.directory);
        let events = self.events.clone();
        let debounce = self.settings.debounce;
        let task_callsign = callsign.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            info!("Looking up {}", task_callsign);
            let event = match directory.lookup(&task_callsign).await {
                Ok(record) => LookupEvent::Completed {
                    ticket,
                    callsign: task_callsign,
                    record,
                },
                Err(e) => LookupEvent::Failed {
                    ticket,
                    callsign: task_callsign,
                    reason: e.to_string(),
                },
            };
            let _ = events.send(event).await;
        });

        debug!("Scheduled lookup #{} for {}", ticket, callsign);
        self.current = Some(InFlight {
            ticket,
            callsign,
            handle,
        });
        true
    }

    /// Abort the current lookup, if any.
    ///
    /// Abortion is best-effort: a result already queued on the channel is
    /// still delivered, and [`accept`](Self::accept) will discard it.
    pub fn cancel(&mut self) {
        if let Some(current) = self.current.take() {
            debug!("Cancelling lookup #{} for {}", current.ticket, current.callsign);
            current.handle.abort();
        }
    }

    /// Filter a result against the current input.
    ///
    /// Returns `None` for results belonging to a superseded or cancelled
    /// lookup.
    pub fn accept(&mut self, event: LookupEvent) -> Option<LookupOutcome> {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|c| c.ticket == event.ticket() && c.callsign == event.callsign());

        if !is_current {
            debug!(
                "Discarding stale lookup #{} for {}",
                event.ticket(),
                event.callsign()
            );
            return None;
        }

        self.current = None;
        Some(match event {
            LookupEvent::Completed {
                callsign, record, ..
            } => LookupOutcome::Found { callsign, record },
            LookupEvent::Failed {
                callsign, reason, ..
            } => LookupOutcome::Failed { callsign, reason },
        })
    }
}

impl<D: Directory> Drop for LookupCoordinator<D> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::directory::LookupError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory directory with a per-callsign response delay.
    pub struct FakeDirectory {
        pub configured: bool,
        pub delays: HashMap<String, Duration>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeDirectory {
        pub fn new() -> Self {
            Self {
                configured: true,
                delays: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_delay(mut self, callsign: &str, delay: Duration) -> Self {
            self.delays.insert(callsign.to_string(), delay);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Directory for FakeDirectory {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn lookup(&self, callsign: &str) -> Result<DirectoryRecord, LookupError> {
            self.calls.lock().unwrap().push(callsign.to_string());
            if let Some(delay) = self.delays.get(callsign) {
                tokio::time::sleep(*delay).await;
            }
            if callsign.starts_with("XX") {
                return Err(LookupError::NotFound(format!("Not found: {}", callsign)));
            }
            let mut record = DirectoryRecord::new();
            record.insert("call", callsign);
            Ok(record)
        }
    }
}
