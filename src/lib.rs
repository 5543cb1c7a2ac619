//! qso-relay - log amateur radio contacts to a logging program over UDP.
//!
//! This crate provides:
//! - Validation of callsign, frequency, and signal report input
//! - ADIF record encoding, plus a nom-based record parser
//! - A UDP transmitter for handing records to Log4OM or similar loggers
//! - A QRZ.com XML directory client with debounced, cancellable lookups
//! - A logging session tying the pieces together
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use qso_relay::{adif::encode_record, qso::{Band, Mode, QsoEntry}};
//!
//! let entry = QsoEntry::new("W1AW", Band::B20m, "14.074", Mode::Ft8, "59", "59", Utc::now())
//!     .expect("valid entry");
//! let record = encode_record(&entry);
//! assert!(record.starts_with("<CALL:4>W1AW"));
//! assert!(record.ends_with("<EOR>"));
//! ```

pub mod adif;
pub mod config;
pub mod directory;
pub mod lookup;
pub mod qso;
pub mod session;
pub mod transmit;
pub mod validate;

pub use adif::{AdifError, AdifField, decode_entry, encode_record, parse_record};
pub use config::{Config, WindowGeometry};
pub use directory::{
    Directory, DirectoryClient, DirectoryConfig, DirectoryRecord, LookupError, LookupState,
};
pub use lookup::{LookupCoordinator, LookupEvent, LookupOutcome, LookupSettings};
pub use qso::{Band, Mode, QsoEntry, ValidationError};
pub use session::{LogError, LoggedQso, QsoForm, Session, StationPanel};
pub use transmit::{TransmitError, Transmitter};
pub use validate::{validate_callsign, validate_frequency, validate_report};
