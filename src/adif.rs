//! ADIF record encoding and parsing.
//!
//! Records are written in the tagged text form understood by Log4OM and
//! most other loggers:
//!
//! ```text
//! <CALL:4>W1AW<QSO_DATE:8>20240309<TIME_ON:6>120000<BAND:3>20m<FREQ:6>14.074<MODE:3>FT8<RST_SENT:2>59<RST_RCVD:2>59<EOR>
//! ```
//!
//! Each field is `<NAME:LENGTH>VALUE` where `LENGTH` is the byte length of
//! `VALUE`. The parser uses `nom` over bytes so that lengths are honoured
//! even for non-ASCII values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::Write;
use nom::{
    IResult, Parser,
    bytes::complete::{tag_no_case, take, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map_res, opt, value},
    error::ErrorKind,
    multi::many_till,
    sequence::{delimited, preceded},
};
use thiserror::Error;

use crate::qso::{Band, Mode, QsoEntry, ValidationError};

/// End-of-record marker.
pub const EOR: &str = "<EOR>";

/// Errors that can occur while parsing or decoding a record.
#[derive(Debug, Error)]
pub enum AdifError {
    #[error("Invalid record format at byte {offset}")]
    InvalidFormat { offset: usize },

    #[error("Field value runs past end of input at byte {offset}")]
    Truncated { offset: usize },

    #[error("Record is not terminated by <EOR>")]
    MissingEndOfRecord,

    #[error("Unexpected data after <EOR>")]
    TrailingData,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A single `<NAME:LENGTH>VALUE` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdifField {
    /// Field name, upper-cased.
    pub name: String,

    /// Optional data type indicator (the `T` in `<NAME:LEN:T>`).
    pub data_type: Option<char>,

    pub value: String,
}

/// Encode a contact as a single ADIF record terminated by `<EOR>`.
pub fn encode_record(entry: &QsoEntry) -> String {
    let timestamp = entry.timestamp();
    let date = timestamp.format("%Y%m%d").to_string();
    let time = timestamp.format("%H%M%S").to_string();

    let fields = [
        ("CALL", entry.call()),
        ("QSO_DATE", date.as_str()),
        ("TIME_ON", time.as_str()),
        ("BAND", entry.band().label()),
        ("FREQ", entry.frequency()),
        ("MODE", entry.mode().label()),
        ("RST_SENT", entry.rst_sent()),
        ("RST_RCVD", entry.rst_recv()),
    ];

    let mut output = String::with_capacity(128);
    for (name, value) in fields {
        // Writing into a String cannot fail.
        let _ = write!(output, "<{}:{}>{}", name, value.len(), value);
    }
    output.push_str(EOR);
    output
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parse a decimal field length.
fn parse_length(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(digit1, |digits: &[u8]| {
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or("invalid length")
    })
    .parse(input)
}

/// Parse a field header such as `<CALL:4>` or `<FREQ:6:N>`.
fn parse_header(input: &[u8]) -> IResult<&[u8], (&[u8], usize, Option<u8>)> {
    delimited(
        char('<'),
        (
            take_while1(is_name_byte),
            preceded(char(':'), parse_length),
            opt(preceded(
                char(':'),
                map_res(take(1usize), |t: &[u8]| {
                    if t[0].is_ascii_alphabetic() {
                        Ok(t[0])
                    } else {
                        Err("invalid type indicator")
                    }
                }),
            )),
        ),
        char('>'),
    )
    .parse(input)
}

/// Parse one field, skipping any whitespace in front of it.
fn parse_field(input: &[u8]) -> IResult<&[u8], AdifField> {
    let (input, _) = multispace0(input)?;
    let (input, (name, len, data_type)) = parse_header(input)?;
    let (input, data) = map_res(take(len), std::str::from_utf8).parse(input)?;

    Ok((
        input,
        AdifField {
            name: String::from_utf8_lossy(name).to_ascii_uppercase(),
            data_type: data_type.map(|t| t.to_ascii_uppercase() as char),
            value: data.to_string(),
        },
    ))
}

fn parse_end_of_record(input: &[u8]) -> IResult<&[u8], ()> {
    value((), (multispace0, tag_no_case(EOR))).parse(input)
}

/// Parse a single ADIF record into its fields, in order.
///
/// Tag names are case-insensitive, whitespace between fields is ignored,
/// and the record must end with `<EOR>`.
///
/// # Example
///
/// ```
/// use qso_relay::adif::parse_record;
///
/// let fields = parse_record("<CALL:4>W1AW<BAND:3>20m<EOR>").unwrap();
/// assert_eq!(fields[0].name, "CALL");
/// assert_eq!(fields[1].value, "20m");
/// ```
pub fn parse_record(input: &str) -> Result<Vec<AdifField>, AdifError> {
    let bytes = input.as_bytes();

    match many_till(parse_field, parse_end_of_record).parse(bytes) {
        Ok((rest, (fields, ()))) => {
            if rest.iter().all(u8::is_ascii_whitespace) {
                Ok(fields)
            } else {
                Err(AdifError::TrailingData)
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            if e.input.iter().all(u8::is_ascii_whitespace) {
                return Err(AdifError::MissingEndOfRecord);
            }
            let offset = bytes.len() - e.input.len();
            if e.code == ErrorKind::Eof {
                Err(AdifError::Truncated { offset })
            } else {
                Err(AdifError::InvalidFormat { offset })
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(AdifError::MissingEndOfRecord),
    }
}

fn find_field<'a>(fields: &'a [AdifField], name: &'static str) -> Result<&'a str, AdifError> {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.value.as_str())
        .ok_or(AdifError::MissingField(name))
}

fn parse_time_on(value: &str) -> Option<NaiveTime> {
    match value.len() {
        6 => NaiveTime::parse_from_str(value, "%H%M%S").ok(),
        4 => NaiveTime::parse_from_str(value, "%H%M").ok(),
        _ => None,
    }
}

/// Decode a record produced by [`encode_record`] back into a contact.
///
/// The decoded entry goes through the same validation as a freshly entered
/// one.
pub fn decode_entry(input: &str) -> Result<QsoEntry, AdifError> {
    let fields = parse_record(input)?;

    let date_str = find_field(&fields, "QSO_DATE")?;
    let date = NaiveDate::parse_from_str(date_str, "%Y%m%d").map_err(|_| {
        AdifError::InvalidValue {
            field: "QSO_DATE",
            value: date_str.to_string(),
        }
    })?;

    let time_str = find_field(&fields, "TIME_ON")?;
    let time = parse_time_on(time_str).ok_or_else(|| AdifError::InvalidValue {
        field: "TIME_ON",
        value: time_str.to_string(),
    })?;

    let band_str = find_field(&fields, "BAND")?;
    let band: Band = band_str.parse().map_err(|_| AdifError::InvalidValue {
        field: "BAND",
        value: band_str.to_string(),
    })?;

    let mode_str = find_field(&fields, "MODE")?;
    let mode: Mode = mode_str.parse().map_err(|_| AdifError::InvalidValue {
        field: "MODE",
        value: mode_str.to_string(),
    })?;

    let entry = QsoEntry::new(
        find_field(&fields, "CALL")?,
        band,
        find_field(&fields, "FREQ")?,
        mode,
        find_field(&fields, "RST_SENT")?,
        find_field(&fields, "RST_RCVD")?,
        NaiveDateTime::new(date, time).and_utc(),
    )?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn sample_entry() -> QsoEntry {
        QsoEntry::new(
            "W1AW",
            Band::B20m,
            "14.074",
            Mode::Ft8,
            "59",
            "57",
            Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 9).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_record() {
        assert_eq!(
            encode_record(&sample_entry()),
            "<CALL:4>W1AW<QSO_DATE:8>20240309<TIME_ON:6>070509<BAND:3>20m\
             <FREQ:6>14.074<MODE:3>FT8<RST_SENT:2>59<RST_RCVD:2>57<EOR>"
        );
    }

    #[test]
    fn test_encode_long_labels() {
        let entry = QsoEntry::new(
            "2E0ABC",
            Band::B1_25m,
            "223.5",
            Mode::Contestia,
            "55",
            "44",
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap(),
        )
        .unwrap();
        let record = encode_record(&entry);
        assert!(record.contains("<BAND:5>1.25m"));
        assert!(record.contains("<MODE:9>CONTESTIA"));
        assert!(record.contains("<QSO_DATE:8>20231231<TIME_ON:6>235959"));
        assert!(record.ends_with("<EOR>"));
    }

    #[test]
    fn test_parse_encoded_record() {
        let fields = parse_record(&encode_record(&sample_entry())).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "CALL", "QSO_DATE", "TIME_ON", "BAND", "FREQ", "MODE", "RST_SENT", "RST_RCVD"
            ]
        );
        assert_eq!(fields[4].value, "14.074");
    }

    #[test]
    fn test_parse_tolerates_case_whitespace_and_types() {
        let record = "<call:4>W1AW\n<freq:6:N>14.074 \r\n <Mode:2>CW\n<eor>\n";
        let fields = parse_record(record).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "CALL");
        assert_eq!(fields[1].data_type, Some('N'));
        assert_eq!(fields[1].value, "14.074");
        assert_eq!(fields[2].value, "CW");
    }

    #[test]
    fn test_parse_counts_bytes() {
        let fields = parse_record("<NAME:5>Jos\u{e9}<EOR>").unwrap();
        assert_eq!(fields[0].value, "José");
    }

    #[test]
    fn test_parse_empty_record() {
        assert!(parse_record("<EOR>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_record("<CALL:4>W1AW"),
            Err(AdifError::MissingEndOfRecord)
        ));
        assert!(matches!(
            parse_record("<CALL:10>W1AW<EOR>"),
            Err(AdifError::Truncated { offset: 9 })
        ));
        assert!(matches!(
            parse_record("<CALL:x>W1AW<EOR>"),
            Err(AdifError::InvalidFormat { .. })
        ));
        assert!(matches!(
            parse_record("<CALL:4>W1AW<EOR>junk"),
            Err(AdifError::TrailingData)
        ));
    }

    #[test]
    fn test_decode_entry() {
        let entry = sample_entry();
        let decoded = decode_entry(&encode_record(&entry)).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_short_time_on() {
        let decoded = decode_entry(
            "<CALL:4>W1AW<QSO_DATE:8>20240309<TIME_ON:4>1230<BAND:3>40m\
             <FREQ:5>7.030<MODE:2>CW<RST_SENT:2>59<RST_RCVD:2>59<EOR>",
        )
        .unwrap();
        assert_eq!(decoded.timestamp().format("%H%M%S").to_string(), "123000");
        assert_eq!(decoded.band(), Band::B40m);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_entry("<CALL:4>W1AW<EOR>"),
            Err(AdifError::MissingField("QSO_DATE"))
        ));
        assert!(matches!(
            decode_entry(
                "<CALL:4>W1AW<QSO_DATE:8>20240309<TIME_ON:6>120000<BAND:3>11m\
                 <FREQ:6>27.185<MODE:2>AM<RST_SENT:2>59<RST_RCVD:2>59<EOR>"
            ),
            Err(AdifError::InvalidValue { field: "BAND", .. })
        ));
        assert!(matches!(
            decode_entry(
                "<CALL:5>HELLO<QSO_DATE:8>20240309<TIME_ON:6>120000<BAND:3>20m\
                 <FREQ:6>14.074<MODE:3>FT8<RST_SENT:2>59<RST_RCVD:2>59<EOR>"
            ),
            Err(AdifError::Validation(ValidationError::Callsign(_)))
        ));
    }

    fn arb_entry() -> impl Strategy<Value = QsoEntry> {
        (
            "[A-Z0-9]{1,3}[0-9][A-Z0-9]{0,3}[A-Z]",
            0..Band::ALL.len(),
            1u32..=300_000u32,
            0..Mode::ALL.len(),
            11u32..=59,
            11u32..=59,
            0i64..4_102_444_800,
        )
            .prop_map(|(call, band, khz, mode, sent, rcvd, secs)| {
                QsoEntry::new(
                    &call,
                    Band::ALL[band],
                    &format!("{}", khz as f64 / 1000.0 + 0.1),
                    Mode::ALL[mode],
                    &sent.to_string(),
                    &rcvd.to_string(),
                    DateTime::from_timestamp(secs, 0).unwrap(),
                )
                .unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_lengths_match_values(entry in arb_entry()) {
            let record = encode_record(&entry);
            prop_assert!(record.ends_with(EOR));
            for field in parse_record(&record).unwrap() {
                let header = format!("<{}:{}>{}", field.name, field.value.len(), field.value);
                prop_assert!(record.contains(&header));
            }
        }

        #[test]
        fn prop_decode_recovers_entry(entry in arb_entry()) {
            prop_assert_eq!(decode_entry(&encode_record(&entry)).unwrap(), entry);
        }
    }
}
