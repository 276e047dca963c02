//! Serde shapes for the managed backend's JSON surfaces.
//!
//! The backend speaks camelCase; everything here stays private to the crate
//! and is mapped into domain types at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{BackendResult, FeedFrameDecodeSnafu};
use crate::types::{MessageId, MessageRecord, UserId};

/// Stored document as returned by the append endpoint and the listen channel.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireDocument {
    pub id: String,
    pub text: String,
    pub uid: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl WireDocument {
    pub fn into_record(self) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(self.id),
            text: self.text,
            author_uid: UserId::new(self.uid),
            author_photo_url: self.photo_url,
            created_at: self.created_at,
        }
    }
}

/// Append request body; `id` and `createdAt` are assigned server-side.
#[derive(Debug, Serialize)]
pub(crate) struct AppendDocumentBody<'a> {
    pub text: &'a str,
    pub uid: &'a str,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<&'a str>,
}

/// First frame sent on the listen channel to open the live query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscribeFrame<'a> {
    pub collection: &'a str,
    pub order_by: &'a str,
    pub direction: &'a str,
    pub limit: usize,
}

/// Server-to-client frames on the listen channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum ListenFrame {
    Snapshot { documents: Vec<WireDocument> },
    Change { document: WireDocument },
    Ping,
}

pub(crate) fn decode_listen_frame(raw: &str) -> BackendResult<ListenFrame> {
    serde_json::from_str(raw).context(FeedFrameDecodeSnafu {
        stage: "decode-listen-frame",
    })
}

/// Token-exchange request posted after the loopback redirect delivers a code.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenExchangeBody<'a> {
    pub code: &'a str,
    pub state: &'a str,
    pub redirect_uri: &'a str,
    pub api_key: &'a str,
    pub project_id: &'a str,
}

/// Successful token-exchange response from the identity service.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub uid: String,
    #[serde(rename = "idToken")]
    pub id_token: String,
    #[serde(default, rename = "photoUrl")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_frame_decodes_documents_in_order() {
        let raw = r#"{
            "type": "snapshot",
            "documents": [
                {"id": "m1", "text": "hi", "uid": "u1", "createdAt": "2024-05-01T12:00:00Z"},
                {"id": "m2", "text": "hello", "uid": "u2", "photoURL": "https://img.example/u2.png",
                 "createdAt": "2024-05-01T12:00:05Z"}
            ]
        }"#;

        let frame = decode_listen_frame(raw).unwrap();
        let ListenFrame::Snapshot { documents } = frame else {
            panic!("expected snapshot frame");
        };
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id, "m1");
        assert_eq!(documents[0].photo_url, None);
        assert_eq!(
            documents[1].photo_url.as_deref(),
            Some("https://img.example/u2.png")
        );
    }

    #[test]
    fn change_frame_decodes_into_a_record() {
        let raw = r#"{"type": "change", "document":
            {"id": "m3", "text": "hey", "uid": "u1", "createdAt": "2024-05-01T12:01:00Z"}}"#;

        let ListenFrame::Change { document } = decode_listen_frame(raw).unwrap() else {
            panic!("expected change frame");
        };
        let record = document.into_record();
        assert_eq!(record.id, MessageId::new("m3"));
        assert_eq!(record.author_uid, UserId::new("u1"));
        assert_eq!(record.text, "hey");
    }

    #[test]
    fn ping_frame_decodes() {
        assert!(matches!(
            decode_listen_frame(r#"{"type": "ping"}"#).unwrap(),
            ListenFrame::Ping
        ));
    }

    #[test]
    fn malformed_frame_is_an_error_not_a_panic() {
        let error = decode_listen_frame(r#"{"type": "snapshot"}"#).unwrap_err();
        assert!(error.to_string().contains("decode-listen-frame"));

        assert!(decode_listen_frame("not json").is_err());
        assert!(decode_listen_frame(r#"{"type": "unknown"}"#).is_err());
    }

    #[test]
    fn append_body_omits_absent_photo_url() {
        let body = AppendDocumentBody {
            text: "hello",
            uid: "u1",
            photo_url: None,
        };
        let encoded = serde_json::to_string(&body).unwrap();
        assert_eq!(encoded, r#"{"text":"hello","uid":"u1"}"#);

        let with_photo = AppendDocumentBody {
            text: "hello",
            uid: "u1",
            photo_url: Some("https://img.example/u1.png"),
        };
        let encoded = serde_json::to_string(&with_photo).unwrap();
        assert!(encoded.contains(r#""photoURL":"https://img.example/u1.png""#));
    }

    #[test]
    fn subscribe_frame_uses_camel_case_keys() {
        let frame = SubscribeFrame {
            collection: "messages",
            order_by: "createdAt",
            direction: "asc",
            limit: 100,
        };
        let encoded = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            encoded,
            r#"{"collection":"messages","orderBy":"createdAt","direction":"asc","limit":100}"#
        );
    }

    #[test]
    fn token_response_tolerates_missing_optionals() {
        let raw = r#"{"uid": "u9", "idToken": "tok"}"#;
        let response: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.uid, "u9");
        assert_eq!(response.id_token, "tok");
        assert_eq!(response.photo_url, None);
        assert_eq!(response.provider, None);
    }
}
