//! Interactive logging session.
//!
//! A [`Session`] holds the operator's draft contact, gates logging on field
//! validation, and runs the validate, encode, transmit sequence. It also
//! keeps the station panel in step with background directory lookups.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adif::encode_record;
use crate::config::Config;
use crate::directory::{Directory, DirectoryRecord};
use crate::lookup::{LookupCoordinator, LookupEvent, LookupOutcome};
use crate::qso::{Band, Mode, QsoEntry, ValidationError};
use crate::transmit::{TransmitError, Transmitter};
use crate::validate::{validate_callsign, validate_frequency, validate_report};

/// Errors that stop a contact from being logged.
#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to send record: {0}")]
    Transmit(#[from] TransmitError),
}

/// The editable draft of a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QsoForm {
    pub call: String,
    pub band: Band,
    pub frequency: String,
    pub mode: Mode,
    pub rst_sent: String,
    pub rst_recv: String,
}

impl QsoForm {
    /// An empty form with the given default reports.
    pub fn new(rst_sent: impl Into<String>, rst_recv: impl Into<String>) -> Self {
        Self {
            call: String::new(),
            band: Band::default(),
            frequency: String::new(),
            mode: Mode::default(),
            rst_sent: rst_sent.into(),
            rst_recv: rst_recv.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.default_rst_sent, &config.default_rst_recv)
    }

    pub fn call_valid(&self) -> bool {
        validate_callsign(&self.call)
    }

    pub fn frequency_valid(&self) -> bool {
        validate_frequency(&self.frequency)
    }

    /// Whether every field is valid, i.e. whether logging is enabled.
    pub fn can_log(&self) -> bool {
        self.call_valid()
            && self.frequency_valid()
            && validate_report(&self.rst_sent)
            && validate_report(&self.rst_recv)
    }

    /// Take an immutable snapshot of the form for logging at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<QsoEntry, ValidationError> {
        QsoEntry::new(
            &self.call,
            self.band,
            &self.frequency,
            self.mode,
            &self.rst_sent,
            &self.rst_recv,
            now,
        )
    }
}

/// Directory information shown next to the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationPanel {
    pub record: Option<DirectoryRecord>,

    /// One-line lookup status, empty when idle.
    pub status: String,
}

impl StationPanel {
    pub fn clear(&mut self) {
        self.record = None;
        self.status.clear();
    }
}

/// A contact that was handed to the logging program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedQso {
    pub entry: QsoEntry,

    /// The ADIF record as sent.
    pub record: String,
}

/// One operator's logging session.
pub struct Session<D: Directory> {
    form: QsoForm,
    default_rst_sent: String,
    default_rst_recv: String,
    auto_clear: bool,
    lookups: LookupCoordinator<D>,
    transmitter: Transmitter,
    station: StationPanel,
    history: Vec<LoggedQso>,
}

impl<D: Directory> Session<D> {
    /// Start a session; lookup results arrive on the returned receiver and
    /// should be fed back through [`handle_lookup_event`](Self::handle_lookup_event).
    pub fn new(
        config: &Config,
        directory: Arc<D>,
        transmitter: Transmitter,
    ) -> (Self, mpsc::Receiver<LookupEvent>) {
        let (lookups, events) = LookupCoordinator::new(directory, config.lookup_settings());
        let session = Self {
            form: QsoForm::from_config(config),
            default_rst_sent: config.default_rst_sent.clone(),
            default_rst_recv: config.default_rst_recv.clone(),
            auto_clear: config.auto_clear_call,
            lookups,
            transmitter,
            station: StationPanel::default(),
            history: Vec::new(),
        };
        (session, events)
    }

    pub fn form(&self) -> &QsoForm {
        &self.form
    }

    pub fn station(&self) -> &StationPanel {
        &self.station
    }

    /// Contacts logged so far, oldest first.
    pub fn history(&self) -> &[LoggedQso] {
        &self.history
    }

    pub fn can_log(&self) -> bool {
        self.form.can_log()
    }

    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    pub fn set_auto_clear(&mut self, enabled: bool) {
        self.auto_clear = enabled;
    }

    pub fn auto_lookup(&self) -> bool {
        self.lookups.settings().enabled
    }

    pub fn set_auto_lookup(&mut self, enabled: bool) {
        self.lookups.set_enabled(enabled);
    }

    /// Update the callsign, clearing stale station details and scheduling
    /// a lookup for the new text.
    pub fn set_call(&mut self, text: &str) {
        self.form.call = text.to_string();
        self.station.clear();
        if self.lookups.input_changed(text) {
            self.station.status = format!("Looking up {}...", text.trim().to_uppercase());
        }
    }

    pub fn set_frequency(&mut self, text: &str) {
        self.form.frequency = text.to_string();
    }

    pub fn set_band(&mut self, band: Band) {
        self.form.band = band;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.form.mode = mode;
    }

    pub fn set_rst_sent(&mut self, text: &str) {
        self.form.rst_sent = text.to_string();
    }

    pub fn set_rst_recv(&mut self, text: &str) {
        self.form.rst_recv = text.to_string();
    }

    /// Reset every field to its default and drop any station details.
    pub fn clear_all(&mut self) {
        self.form = QsoForm::new(&self.default_rst_sent, &self.default_rst_recv);
        self.lookups.cancel();
        self.station.clear();
    }

    /// Apply a lookup result. Returns `true` if the station panel changed.
    pub fn handle_lookup_event(&mut self, event: LookupEvent, now: DateTime<Utc>) -> bool {
        match self.lookups.accept(event) {
            Some(LookupOutcome::Found { callsign, record }) => {
                debug!("Station details for {}: {} fields", callsign, record.len());
                self.station.record = Some(record);
                self.station.status = format!("Last lookup: {}", now.format("%H:%M:%S"));
                true
            }
            Some(LookupOutcome::Failed { callsign, reason }) => {
                debug!("Lookup for {} failed: {}", callsign, reason);
                self.station.record = None;
                self.station.status = format!("Lookup error: {}", reason);
                true
            }
            None => false,
        }
    }

    /// Log the current draft: snapshot, encode, and transmit it.
    ///
    /// Nothing is recorded if validation or sending fails.
    pub async fn log_qso(&mut self, now: DateTime<Utc>) -> Result<LoggedQso, LogError> {
        let entry = self.form.snapshot(now)?;
        let record = encode_record(&entry);

        if let Err(e) = self.transmitter.send(&record).await {
            warn!("Failed to log QSO with {}: {}", entry.call(), e);
            return Err(e.into());
        }

        info!("QSO logged: {}", entry);
        let logged = LoggedQso { entry, record };
        self.history.push(logged.clone());

        if self.auto_clear {
            self.form.call.clear();
            self.lookups.cancel();
            self.station.clear();
        }

        Ok(logged)
    }

    /// Fold the session's current defaults and toggles into `base`.
    pub fn to_config(&self, base: &Config) -> Config {
        Config {
            default_rst_sent: self.form.rst_sent.clone(),
            default_rst_recv: self.form.rst_recv.clone(),
            auto_clear_call: self.auto_clear,
            auto_lookup: self.auto_lookup(),
            ..base.clone()
        }
    }
}
