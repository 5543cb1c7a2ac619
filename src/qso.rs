//! Data structures representing a logged contact.
//!
//! A [`QsoEntry`] is an immutable snapshot of the operator's input, taken at
//! the moment of logging. It is only ever built through [`QsoEntry::new`],
//! which enforces the field validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::validate::{validate_callsign, validate_frequency, validate_report};

/// Which form field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid callsign: {0:?}")]
    Callsign(String),

    #[error("Invalid frequency: {0:?}")]
    Frequency(String),

    #[error("Invalid sent report: {0:?}")]
    RstSent(String),

    #[error("Invalid received report: {0:?}")]
    RstRecv(String),
}

/// Error returned when a band or mode label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {label}")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

/// Amateur radio band, identified by its wavelength label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Band {
    B2200m,
    B630m,
    B160m,
    B80m,
    B60m,
    B40m,
    B30m,
    #[default]
    B20m,
    B17m,
    B15m,
    B12m,
    B10m,
    B6m,
    B4m,
    B2m,
    B1_25m,
    B70cm,
}

impl Band {
    /// Every band, lowest frequency first.
    pub const ALL: [Band; 17] = [
        Band::B2200m,
        Band::B630m,
        Band::B160m,
        Band::B80m,
        Band::B60m,
        Band::B40m,
        Band::B30m,
        Band::B20m,
        Band::B17m,
        Band::B15m,
        Band::B12m,
        Band::B10m,
        Band::B6m,
        Band::B4m,
        Band::B2m,
        Band::B1_25m,
        Band::B70cm,
    ];

    /// The ADIF band label, e.g. `"20m"`.
    pub fn label(self) -> &'static str {
        match self {
            Band::B2200m => "2200m",
            Band::B630m => "630m",
            Band::B160m => "160m",
            Band::B80m => "80m",
            Band::B60m => "60m",
            Band::B40m => "40m",
            Band::B30m => "30m",
            Band::B20m => "20m",
            Band::B17m => "17m",
            Band::B15m => "15m",
            Band::B12m => "12m",
            Band::B10m => "10m",
            Band::B6m => "6m",
            Band::B4m => "4m",
            Band::B2m => "2m",
            Band::B1_25m => "1.25m",
            Band::B70cm => "70cm",
        }
    }

    /// Returns the band containing a frequency given in MHz.
    ///
    /// Returns `None` if the frequency falls outside every band edge.
    pub fn for_frequency_mhz(mhz: f64) -> Option<Band> {
        let khz = (mhz * 1000.0).round();
        if !khz.is_finite() || khz < 0.0 {
            return None;
        }
        match khz as u64 {
            135..=138 => Some(Band::B2200m),
            472..=479 => Some(Band::B630m),
            1800..=2000 => Some(Band::B160m),
            3500..=4000 => Some(Band::B80m),
            5330..=5410 => Some(Band::B60m),
            7000..=7300 => Some(Band::B40m),
            10100..=10150 => Some(Band::B30m),
            14000..=14350 => Some(Band::B20m),
            18068..=18168 => Some(Band::B17m),
            21000..=21450 => Some(Band::B15m),
            24890..=24990 => Some(Band::B12m),
            28000..=29700 => Some(Band::B10m),
            50000..=54000 => Some(Band::B6m),
            70000..=71000 => Some(Band::B4m),
            144000..=148000 => Some(Band::B2m),
            222000..=225000 => Some(Band::B1_25m),
            420000..=450000 => Some(Band::B70cm),
            _ => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Band {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Band::ALL
            .into_iter()
            .find(|band| band.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel {
                kind: "band",
                label: s.to_string(),
            })
    }
}

impl TryFrom<String> for Band {
    type Error = UnknownLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Band> for String {
    fn from(band: Band) -> Self {
        band.label().to_string()
    }
}

/// Transmission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Ssb,
    Cw,
    #[default]
    Ft8,
    Ft4,
    Rtty,
    Psk31,
    Jt65,
    Jt9,
    Mfsk,
    Olivia,
    Contestia,
    Am,
    Fm,
    Digital,
}

impl Mode {
    pub const ALL: [Mode; 14] = [
        Mode::Ssb,
        Mode::Cw,
        Mode::Ft8,
        Mode::Ft4,
        Mode::Rtty,
        Mode::Psk31,
        Mode::Jt65,
        Mode::Jt9,
        Mode::Mfsk,
        Mode::Olivia,
        Mode::Contestia,
        Mode::Am,
        Mode::Fm,
        Mode::Digital,
    ];

    /// The ADIF mode label, e.g. `"FT8"`.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Ssb => "SSB",
            Mode::Cw => "CW",
            Mode::Ft8 => "FT8",
            Mode::Ft4 => "FT4",
            Mode::Rtty => "RTTY",
            Mode::Psk31 => "PSK31",
            Mode::Jt65 => "JT65",
            Mode::Jt9 => "JT9",
            Mode::Mfsk => "MFSK",
            Mode::Olivia => "OLIVIA",
            Mode::Contestia => "CONTESTIA",
            Mode::Am => "AM",
            Mode::Fm => "FM",
            Mode::Digital => "DIGITAL",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel {
                kind: "mode",
                label: s.to_string(),
            })
    }
}

/// A validated contact, ready to be encoded and transmitted.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use qso_relay::qso::{Band, Mode, QsoEntry};
///
/// let entry = QsoEntry::new("w1aw", Band::B20m, "14.074", Mode::Ft8, "59", "57", Utc::now())
///     .expect("valid entry");
/// assert_eq!(entry.call(), "W1AW");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QsoEntry {
    call: String,
    band: Band,
    frequency: String,
    mode: Mode,
    rst_sent: String,
    rst_recv: String,
    timestamp: DateTime<Utc>,
}

impl QsoEntry {
    /// Build an entry, rejecting it if any field fails validation.
    ///
    /// The callsign is normalized to trimmed upper case and the frequency is
    /// trimmed but otherwise kept as typed.
    pub fn new(
        call: &str,
        band: Band,
        frequency: &str,
        mode: Mode,
        rst_sent: &str,
        rst_recv: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !validate_callsign(call) {
            return Err(ValidationError::Callsign(call.to_string()));
        }
        if !validate_frequency(frequency) {
            return Err(ValidationError::Frequency(frequency.to_string()));
        }
        if !validate_report(rst_sent) {
            return Err(ValidationError::RstSent(rst_sent.to_string()));
        }
        if !validate_report(rst_recv) {
            return Err(ValidationError::RstRecv(rst_recv.to_string()));
        }

        Ok(Self {
            call: call.trim().to_uppercase(),
            band,
            frequency: frequency.trim().to_string(),
            mode,
            rst_sent: rst_sent.to_string(),
            rst_recv: rst_recv.to_string(),
            timestamp,
        })
    }

    pub fn call(&self) -> &str {
        &self.call
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Frequency in MHz, as entered.
    pub fn frequency(&self) -> &str {
        &self.frequency
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn rst_sent(&self) -> &str {
        &self.rst_sent
    }

    pub fn rst_recv(&self) -> &str {
        &self.rst_recv
    }

    /// UTC time the contact was logged.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for QsoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} MHz {} {}/{} {}",
            self.call,
            self.band,
            self.frequency,
            self.mode,
            self.rst_sent,
            self.rst_recv,
            self.timestamp.format("%Y-%m-%d %H:%MZ")
        )
    }
}
