//! Failure classification
//!
//! Maps what happened at the transport boundary to exactly one
//! `Failure`. A delivered status-carrying response always classifies by
//! its status range; transport errors classify by whether anything was
//! received at all. Classification never panics and never produces more
//! than one failure per attempt.

use crate::outcome::{Failure, FailureKind};
use crate::transport::TransportError;

/// Classify a delivered response by status code.
///
/// Returns `None` for statuses below 400 (not a failure).
pub fn classify_reply(status: u16, error_body: &str) -> Option<Failure> {
    let kind = match status {
        400..=499 => FailureKind::Client,
        500..=599 => FailureKind::Server,
        _ => return None,
    };

    Some(Failure {
        kind,
        status: Some(status),
        error_body: error_body.to_string(),
        detail: format!("{} status {}", kind, status),
    })
}

/// Classify a failure where no response was delivered
pub fn classify_transport_error(error: &TransportError) -> Failure {
    let kind = if error.is_connection_level() {
        FailureKind::Connection
    } else {
        FailureKind::Generic
    };

    Failure {
        kind,
        status: None,
        error_body: String::new(),
        detail: error.to_string(),
    }
}

/// Classify a response body that did not decode into the expected shape
pub fn classify_decode_failure(error: &serde_json::Error) -> Failure {
    Failure {
        kind: FailureKind::Generic,
        status: None,
        error_body: String::new(),
        detail: format!("response body did not decode: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400)]
    #[case(404)]
    #[case(418)]
    #[case(499)]
    fn test_4xx_classifies_as_client(#[case] status: u16) {
        let failure = classify_reply(status, "bad request").unwrap();
        assert_eq!(failure.kind, FailureKind::Client);
        assert_eq!(failure.status, Some(status));
        assert_eq!(failure.error_body, "bad request");
    }

    #[rstest]
    #[case(500)]
    #[case(503)]
    #[case(599)]
    fn test_5xx_classifies_as_server(#[case] status: u16) {
        let failure = classify_reply(status, "overloaded").unwrap();
        assert_eq!(failure.kind, FailureKind::Server);
        assert_eq!(failure.status, Some(status));
        assert_eq!(failure.error_body, "overloaded");
    }

    #[rstest]
    #[case(200)]
    #[case(204)]
    #[case(301)]
    #[case(399)]
    fn test_sub_400_is_not_a_failure(#[case] status: u16) {
        assert!(
            classify_reply(status, "").is_none(),
            "status {} must not classify as a failure",
            status
        );
    }

    #[test]
    fn test_connection_error_classifies_as_connection() {
        let failure =
            classify_transport_error(&TransportError::Connection("refused".to_string()));
        assert_eq!(failure.kind, FailureKind::Connection);
        assert_eq!(failure.status, None);
    }

    #[test]
    fn test_timeout_classifies_as_connection() {
        let failure = classify_transport_error(&TransportError::Timeout("60s".to_string()));
        assert_eq!(failure.kind, FailureKind::Connection);
    }

    #[test]
    fn test_other_transport_errors_classify_as_generic() {
        let failure = classify_transport_error(&TransportError::Other("boom".to_string()));
        assert_eq!(failure.kind, FailureKind::Generic);

        let failure =
            classify_transport_error(&TransportError::InvalidRequest("bad header".to_string()));
        assert_eq!(failure.kind, FailureKind::Generic);
    }

    #[test]
    fn test_decode_failure_classifies_as_generic_without_status() {
        let err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let failure = classify_decode_failure(&err);
        assert_eq!(failure.kind, FailureKind::Generic);
        assert_eq!(failure.status, None);
        assert!(failure.detail.contains("did not decode"));
    }
}
