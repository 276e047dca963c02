use snafu::Snafu;

/// User-facing failure classification.
///
/// Every `BackendError` collapses to one of these so views can pick a toast
/// title and recovery affordance without matching on transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthFlowFailed,
    MessageSubmitFailed,
    FeedSubscriptionLost,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("{provider} sign-in was rejected on `{stage}`: {reason}"))]
    AuthFlowRejected {
        stage: &'static str,
        provider: &'static str,
        reason: String,
    },
    #[snafu(display("loopback redirect listener failed on `{stage}`: {source}"))]
    AuthRedirectListener {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to open the system browser on `{stage}`: {source}"))]
    OpenBrowser {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("token exchange failed on `{stage}`: {source}"))]
    AuthExchange {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("identity service returned status {status} on `{stage}`: {body}"))]
    AuthExchangeStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode identity response on `{stage}`: {source}"))]
    AuthResponseDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("message append request failed on `{stage}`: {source}"))]
    SubmitRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("document store returned status {status} on `{stage}`: {body}"))]
    SubmitStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode stored document on `{stage}`: {source}"))]
    SubmitResponseDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("feed connection failed on `{stage}`: {source}"))]
    FeedConnect {
        stage: &'static str,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("feed protocol violation on `{stage}`: {details}"))]
    FeedProtocol {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to decode feed frame on `{stage}`: {source}"))]
    FeedFrameDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthFlowRejected { .. }
            | Self::AuthRedirectListener { .. }
            | Self::OpenBrowser { .. }
            | Self::AuthExchange { .. }
            | Self::AuthExchangeStatus { .. }
            | Self::AuthResponseDecode { .. } => FailureKind::AuthFlowFailed,
            Self::SubmitRequest { .. }
            | Self::SubmitStatus { .. }
            | Self::SubmitResponseDecode { .. } => FailureKind::MessageSubmitFailed,
            Self::FeedConnect { .. }
            | Self::FeedProtocol { .. }
            | Self::FeedFrameDecode { .. } => FailureKind::FeedSubscriptionLost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_auth_variant_maps_to_auth_flow_failed() {
        let error = BackendError::AuthFlowRejected {
            stage: "verify-state",
            provider: "google.com",
            reason: "state mismatch".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::AuthFlowFailed);
    }

    #[test]
    fn submit_and_feed_variants_map_to_their_kinds() {
        let submit = BackendError::SubmitStatus {
            stage: "append-document",
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(submit.kind(), FailureKind::MessageSubmitFailed);

        let feed = BackendError::FeedProtocol {
            stage: "listen-loop",
            details: "unexpected binary frame".to_string(),
        };
        assert_eq!(feed.kind(), FailureKind::FeedSubscriptionLost);
    }
}
