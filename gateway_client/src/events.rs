use log::*;
use serde::Deserialize;
use serde_json::Value;

use crate::TxnStatusResponse;

/// Card details attached to an approval signal.
///
/// Stream approvals carry the full set; poll snapshots sometimes carry only a subset, so every field is optional and
/// the lifecycle coordinator decides whether enough data is present to finalize.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalData {
    pub uti: Option<String>,
    /// Card BIN (first six digits).
    pub bank_id_no: Option<String>,
    /// Last four digits of the card number.
    pub card_no_4digit: Option<String>,
    pub auth_code: Option<String>,
    pub cardholder_receipt: Option<String>,
    /// The amount the terminal approved, in minor units. Compared against the amount recorded at initiation.
    pub amttxn: Option<i64>,
}

impl ApprovalData {
    /// Extract whatever approval detail is present in a poll snapshot's raw payload.
    pub fn from_status_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }
}

/// A gateway push event, parsed once at the stream boundary.
///
/// Each SSE line from the gateway is a JSON object with a `status_code` field. The codes are the terminal vendor's
/// sub-protocol: `connected` when the stream attaches, `206` while the cardholder interacts with the terminal,
/// `200A` for approval, `200N` for decline/cancellation, and `000` when the terminal resets the session.
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    Connected,
    InProgress,
    Approved(ApprovalData),
    Declined,
    /// Only ever produced from a poll snapshot; the stream protocol folds cancellation into `200N`.
    Cancelled,
    Reset,
    Unknown(String),
}

impl TerminalEvent {
    /// Parse one raw stream line. Lines may arrive SSE-framed (`data: {...}`) or as bare JSON.
    pub fn parse(line: &str) -> Self {
        let payload = line.trim().strip_prefix("data:").unwrap_or(line).trim();
        let Ok(value) = serde_json::from_str::<Value>(payload) else {
            trace!("🖥️ Unparseable gateway event line: {line}");
            return TerminalEvent::Unknown(line.to_string());
        };
        match value["status_code"].as_str() {
            Some("connected") => TerminalEvent::Connected,
            Some("206") => TerminalEvent::InProgress,
            Some("200A") => {
                let data = serde_json::from_value::<ApprovalData>(value).unwrap_or_default();
                TerminalEvent::Approved(data)
            },
            Some("200N") => TerminalEvent::Declined,
            Some("000") => TerminalEvent::Reset,
            other => {
                trace!("🖥️ Gateway event with unrecognised status_code {other:?}");
                TerminalEvent::Unknown(line.to_string())
            },
        }
    }

    /// Translate a poll snapshot into the same tagged event type the stream produces, so the coordinator has a
    /// single transition path.
    pub fn from_status(status: &TxnStatusResponse) -> Self {
        if status.trans_approved {
            let mut data = ApprovalData::from_status_payload(&status.data);
            if data.amttxn.is_none() {
                data.amttxn = status.data["amttxn"].as_i64();
            }
            TerminalEvent::Approved(data)
        } else if status.trans_cancelled {
            TerminalEvent::Cancelled
        } else {
            TerminalEvent::InProgress
        }
    }
}

#[cfg(test)]
mod test {
    use super::TerminalEvent;

    #[test]
    fn parses_approval_with_card_data() {
        let line = r#"data: {"status_code": "200A", "uti": "abc-123", "bank_id_no": "412345", "card_no_4digit": "1111", "auth_code": "AUTH01", "amttxn": 1050}"#;
        match TerminalEvent::parse(line) {
            TerminalEvent::Approved(data) => {
                assert_eq!(data.uti.as_deref(), Some("abc-123"));
                assert_eq!(data.bank_id_no.as_deref(), Some("412345"));
                assert_eq!(data.card_no_4digit.as_deref(), Some("1111"));
                assert_eq!(data.auth_code.as_deref(), Some("AUTH01"));
                assert_eq!(data.amttxn, Some(1050));
            },
            other => panic!("Expected an approval, got {other:?}"),
        }
    }

    #[test]
    fn parses_lifecycle_codes() {
        assert!(matches!(TerminalEvent::parse(r#"{"status_code": "connected"}"#), TerminalEvent::Connected));
        assert!(matches!(TerminalEvent::parse(r#"{"status_code": "206"}"#), TerminalEvent::InProgress));
        assert!(matches!(TerminalEvent::parse(r#"{"status_code": "200N"}"#), TerminalEvent::Declined));
        assert!(matches!(TerminalEvent::parse(r#"{"status_code": "000"}"#), TerminalEvent::Reset));
    }

    #[test]
    fn unknown_lines_are_preserved_verbatim() {
        match TerminalEvent::parse("heartbeat") {
            TerminalEvent::Unknown(line) => assert_eq!(line, "heartbeat"),
            other => panic!("Expected Unknown, got {other:?}"),
        }
        assert!(matches!(TerminalEvent::parse(r#"{"status_code": "999"}"#), TerminalEvent::Unknown(_)));
    }
}
