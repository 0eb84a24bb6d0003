//! Wire protocol of the marking printer
//!
//! ASCII, `\r`-terminated lines, single device address `0`. Commands start
//! with `^0` followed by `?` (query), `!` (action) or `=` (set). Responses
//! to queries echo the command after `=`, e.g. `^0=RS2\t6\t0\t0\t80`.
//!
//! Everything here is pure: no I/O, deterministic.

use crate::error::ProtocolError;

/// Device address prefix carried by every protocol line
pub const ADDRESS_PREFIX: &str = "^0";

/// The low 25 bits of the raw error word are the error code,
/// the bits above carry status flags.
pub const ERROR_MASK: i64 = 0x1FF_FFFF;

/// Separator between mail records sent in one write
pub const RECORD_SEPARATOR: &str = "\r";

/// Fixed device commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    QueryStatus,
    QueryMailing,
    StartPrint,
    StopPrint,
    OpenNozzle,
    ResetCounters,
    FlushFifo,
    ShowDisplay,
    HideDisplay,
    CloseError,
}

impl Command {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QueryStatus => "^0?RS",
            Self::QueryMailing => "^0?SM",
            Self::StartPrint => "^0!GO",
            Self::StopPrint => "^0!ST",
            Self::OpenNozzle => "^0!NO",
            Self::ResetCounters => "^0=CC0\t0\t0",
            Self::FlushFifo => "^0!FF",
            Self::ShowDisplay => "^0!W1",
            Self::HideDisplay => "^0!W0",
            Self::CloseError => "^0!EQ",
        }
    }

    /// Queries are answered by a status line, actions by an acknowledgement
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::QueryStatus | Self::QueryMailing)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a mail record injecting `code` at counter position `counter`
pub fn mail_record(counter: i64, code: &str) -> String {
    format!("{}=MR{}\t{}", ADDRESS_PREFIX, counter, code)
}

/// Join several mail records into one write
pub fn join_records(records: &[String]) -> String {
    records.join(RECORD_SEPARATOR)
}

/// Device state constants
///
/// Firmware revisions disagree on the numeric values, so they are
/// configurable; `Default` matches the common firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConstants {
    pub nozzle_opened: i64,
    pub nozzle_closed: i64,
    pub nozzle_opening: i64,
    pub nozzle_closing: i64,
    pub machine_started: i64,
}

impl Default for DeviceConstants {
    fn default() -> Self {
        Self {
            nozzle_opened: 1,
            nozzle_closed: 2,
            nozzle_opening: 3,
            nozzle_closing: 4,
            machine_started: 6,
        }
    }
}

/// Parsed `=RS` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrinterStatus {
    pub nozzle_state: i64,
    pub machine_state: i64,
    /// Raw error word masked with [`ERROR_MASK`]
    pub error_state: i64,
    pub head_cover: i64,
    pub act_speed: i64,
}

/// Parsed `=SM` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailingStatus {
    pub fifo_depth: i64,
    pub fifo_entries: i64,
    pub last_started_print_no: i64,
    pub stop_at_no: i64,
    pub last_started_print_no_was_finished: i64,
}

fn number(field: &'static str, value: &str) -> Result<i64, ProtocolError> {
    value.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Split a response into its whitespace separated fields and strip the
/// echoed `marker` (`=RS`, `=SM`) from the head token.
fn fields<'a>(
    line: &'a str,
    marker: &'static str,
    names: &[&'static str],
) -> Result<Vec<&'a str>, ProtocolError> {
    let mut tokens = line.split_whitespace();
    let head = tokens.next().unwrap_or_default();
    let first = head
        .find(marker)
        .map(|pos| &head[pos + marker.len()..])
        .ok_or_else(|| ProtocolError::MissingField {
            field: names[0],
            line: line.to_string(),
        })?;

    let mut out = Vec::with_capacity(names.len());
    out.push(first);
    for &name in &names[1..] {
        let token = tokens.next().ok_or_else(|| ProtocolError::MissingField {
            field: name,
            line: line.to_string(),
        })?;
        out.push(token);
    }
    Ok(out)
}

/// Parse a printer status line: `<prefix>=RS<nozzle> machine error cover speed`
pub fn parse_printer_status(line: &str) -> Result<PrinterStatus, ProtocolError> {
    const NAMES: [&str; 5] = [
        "nozzle_state",
        "machine_state",
        "error_state",
        "head_cover",
        "act_speed",
    ];
    let f = fields(line, "=RS", &NAMES)?;
    let raw_error = number(NAMES[2], f[2])?;
    Ok(PrinterStatus {
        nozzle_state: number(NAMES[0], f[0])?,
        machine_state: number(NAMES[1], f[1])?,
        error_state: raw_error & ERROR_MASK,
        head_cover: number(NAMES[3], f[3])?,
        act_speed: number(NAMES[4], f[4])?,
    })
}

/// Parse a mailing status line: `<prefix>=SM<depth> entries last stop finished`
pub fn parse_mailing_status(line: &str) -> Result<MailingStatus, ProtocolError> {
    const NAMES: [&str; 5] = [
        "fifo_depth",
        "fifo_entries",
        "last_started_print_no",
        "stop_at_no",
        "last_started_print_no_was_finished",
    ];
    let f = fields(line, "=SM", &NAMES)?;
    Ok(MailingStatus {
        fifo_depth: number(NAMES[0], f[0])?,
        fifo_entries: number(NAMES[1], f[1])?,
        last_started_print_no: number(NAMES[2], f[2])?,
        stop_at_no: number(NAMES[3], f[3])?,
        last_started_print_no_was_finished: number(NAMES[4], f[4])?,
    })
}

/// An inbound line, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    PrinterStatus(PrinterStatus),
    MailingStatus(MailingStatus),
    /// Any other `^0` line (command acknowledgement)
    Ack(String),
    /// Free text from the device: display or alarm message
    Message(String),
    Empty,
}

/// Dispatch a line to the matching parser
pub fn classify(line: &str) -> Result<Response, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Response::Empty);
    }
    if !trimmed.starts_with(ADDRESS_PREFIX) {
        return Ok(Response::Message(trimmed.to_string()));
    }
    let head = trimmed.split_whitespace().next().unwrap_or_default();
    if head.contains("=RS") {
        parse_printer_status(trimmed).map(Response::PrinterStatus)
    } else if head.contains("=SM") {
        parse_mailing_status(trimmed).map(Response::MailingStatus)
    } else {
        Ok(Response::Ack(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_printer_status() {
        let status = parse_printer_status("^0=RS200\t6\t0\t0\t80\t0").unwrap();
        assert_eq!(
            status,
            PrinterStatus {
                nozzle_state: 200,
                machine_state: 6,
                error_state: 0,
                head_cover: 0,
                act_speed: 80,
            }
        );
    }

    #[test]
    fn test_parse_mailing_status() {
        let status = parse_mailing_status("^0=SM256\t0\t3\t0\t1").unwrap();
        assert_eq!(
            status,
            MailingStatus {
                fifo_depth: 256,
                fifo_entries: 0,
                last_started_print_no: 3,
                stop_at_no: 0,
                last_started_print_no_was_finished: 1,
            }
        );
    }

    #[test]
    fn test_error_mask() {
        let status = parse_printer_status("^0=RS1 6 33554431 0 0").unwrap();
        assert_eq!(status.error_state, 33554431 & 33554431);

        // 0x2000005: status flag in bit 25, error code 5
        let status = parse_printer_status("^0=RS1 6 33554437 0 0").unwrap();
        assert_eq!(status.error_state, 5);

        // flags in the upper bits only
        let status = parse_printer_status("^0=RS1 6 4261412864 0 0").unwrap();
        assert_eq!(status.error_state, 0);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_printer_status("^0=RS1\t6\t0"),
            Err(ProtocolError::MissingField {
                field: "head_cover",
                line: "^0=RS1\t6\t0".to_string(),
            })
        );
        assert!(matches!(
            parse_mailing_status("^0=SMxx\t0\t0\t0\t0"),
            Err(ProtocolError::InvalidNumber {
                field: "fifo_depth",
                ..
            })
        ));
        assert!(parse_printer_status("^0=SM1 2 3 4 5").is_err());
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(Command::QueryStatus.as_str(), "^0?RS");
        assert_eq!(Command::QueryMailing.as_str(), "^0?SM");
        assert_eq!(Command::StartPrint.as_str(), "^0!GO");
        assert_eq!(Command::StopPrint.as_str(), "^0!ST");
        assert_eq!(Command::OpenNozzle.as_str(), "^0!NO");
        assert_eq!(Command::ResetCounters.as_str(), "^0=CC0\t0\t0");
        assert_eq!(Command::FlushFifo.as_str(), "^0!FF");
        assert_eq!(Command::ShowDisplay.as_str(), "^0!W1");
        assert_eq!(Command::HideDisplay.as_str(), "^0!W0");
        assert_eq!(Command::CloseError.as_str(), "^0!EQ");
        assert!(Command::QueryMailing.is_query());
        assert!(!Command::CloseError.is_query());
    }

    #[test]
    fn test_mail_records() {
        assert_eq!(mail_record(12, "ABC123"), "^0=MR12\tABC123");
        let joined = join_records(&[mail_record(1, "A"), mail_record(2, "B")]);
        assert_eq!(joined, "^0=MR1\tA\r^0=MR2\tB");
        assert_eq!(join_records(&[]), "");
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("^0=RS1\t6\t0\t0\t80"),
            Ok(Response::PrinterStatus(_))
        ));
        assert!(matches!(
            classify("^0=SM256\t0\t3\t0\t1"),
            Ok(Response::MailingStatus(_))
        ));
        assert_eq!(classify("^0!GO"), Ok(Response::Ack("^0!GO".to_string())));
        assert_eq!(classify("  \r"), Ok(Response::Empty));
        assert_eq!(
            classify("INK LOW"),
            Ok(Response::Message("INK LOW".to_string()))
        );
    }
}
