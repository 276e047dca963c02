use futures::{SinkExt, StreamExt};
use snafu::{ResultExt, ensure};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::ChatBackend;
use crate::config::BackendSettings;
use crate::error::{
    BackendError, BackendResult, FeedConnectSnafu, FeedFrameDecodeSnafu, FeedProtocolSnafu,
    SubmitRequestSnafu, SubmitResponseDecodeSnafu, SubmitStatusSnafu,
};
use crate::feed::{BoxFuture, FeedEvent, FeedHandle, FeedWorker, make_feed_stream};
use crate::types::{FeedQuery, MessageRecord, NewMessage, Session};
use crate::wire::{AppendDocumentBody, ListenFrame, SubscribeFrame, WireDocument, decode_listen_frame};

/// Feed ordering key; the store indexes the collection on this field.
const ORDER_BY_FIELD: &str = "createdAt";
const ORDER_DIRECTION: &str = "asc";

type ListenChannel = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Chat store adapter speaking the managed backend's document API: a
/// WebSocket listen channel for the live query and HTTPS for appends.
pub struct RemoteChatBackend {
    settings: BackendSettings,
    http: reqwest::Client,
}

impl RemoteChatBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    async fn open_listen_channel(
        settings: &BackendSettings,
        id_token: &str,
        query: FeedQuery,
    ) -> BackendResult<ListenChannel> {
        let url = listen_url(settings);
        let mut request = url.as_str().into_client_request().context(FeedConnectSnafu {
            stage: "build-listen-request",
        })?;

        let bearer = HeaderValue::from_str(&format!("Bearer {id_token}")).map_err(|error| {
            BackendError::FeedProtocol {
                stage: "build-auth-header",
                details: error.to_string(),
            }
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (mut channel, _response) =
            connect_async(request).await.context(FeedConnectSnafu {
                stage: "connect-listen-channel",
            })?;

        let subscribe = SubscribeFrame {
            collection: &settings.collection,
            order_by: ORDER_BY_FIELD,
            direction: ORDER_DIRECTION,
            limit: query.limit,
        };
        let frame = serde_json::to_string(&subscribe).context(FeedFrameDecodeSnafu {
            stage: "encode-subscribe-frame",
        })?;
        channel
            .send(WsMessage::Text(frame))
            .await
            .context(FeedConnectSnafu {
                stage: "send-subscribe-frame",
            })?;

        Ok(channel)
    }

    async fn run_listen_worker(
        settings: BackendSettings,
        id_token: String,
        query: FeedQuery,
        event_tx: mpsc::UnboundedSender<FeedEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut channel = match Self::open_listen_channel(&settings, &id_token, query).await {
            Ok(channel) => channel,
            Err(error) => {
                tracing::warn!(error = %error, "failed to open feed subscription");
                let _ = event_tx.send(FeedEvent::Lost(error.to_string()));
                return;
            }
        };

        tracing::debug!(collection = %settings.collection, limit = query.limit, "feed subscription open");

        let mut cancelled = false;
        let mut lost_reason = None;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    cancelled = true;
                    // Consumer dropped the stream; close the channel promptly.
                    let _ = channel.close(None).await;
                    break;
                }
                next_frame = channel.next() => {
                    match next_frame {
                        Some(Ok(WsMessage::Text(raw))) => {
                            if !Self::forward_frame(&raw, &event_tx) {
                                return;
                            }
                        }
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                        Some(Ok(WsMessage::Close(_))) => {
                            lost_reason = Some("subscription closed by the server".to_string());
                            break;
                        }
                        Some(Ok(other)) => {
                            tracing::warn!(frame = ?other, "ignoring unexpected feed frame kind");
                        }
                        Some(Err(source)) => {
                            lost_reason = Some(source.to_string());
                            break;
                        }
                        None => {
                            lost_reason = Some("feed connection ended".to_string());
                            break;
                        }
                    }
                }
            }
        }

        if !cancelled && let Some(reason) = lost_reason {
            tracing::warn!(reason = %reason, "feed subscription lost");
            let _ = event_tx.send(FeedEvent::Lost(reason));
        }
    }

    /// Maps one text frame into feed events. Returns false when the consumer
    /// is gone and the worker should stop.
    fn forward_frame(raw: &str, event_tx: &mpsc::UnboundedSender<FeedEvent>) -> bool {
        match decode_listen_frame(raw) {
            Ok(ListenFrame::Snapshot { documents }) => {
                let records = documents
                    .into_iter()
                    .map(WireDocument::into_record)
                    .collect::<Vec<_>>();
                event_tx.send(FeedEvent::Snapshot(records)).is_ok()
            }
            Ok(ListenFrame::Change { document }) => event_tx
                .send(FeedEvent::Upserted(document.into_record()))
                .is_ok(),
            Ok(ListenFrame::Ping) => true,
            Err(error) => {
                // Tolerate a bad frame rather than dropping the subscription.
                tracing::warn!(error = %error, "skipping malformed feed frame");
                true
            }
        }
    }

    async fn run_append(
        settings: BackendSettings,
        http: reqwest::Client,
        id_token: String,
        new_message: NewMessage,
    ) -> BackendResult<MessageRecord> {
        let body = AppendDocumentBody {
            text: &new_message.text,
            uid: new_message.author_uid.as_str(),
            photo_url: new_message.author_photo_url.as_deref(),
        };

        let response = http
            .post(append_url(&settings))
            .bearer_auth(&id_token)
            .json(&body)
            .send()
            .await
            .context(SubmitRequestSnafu {
                stage: "send-append-request",
            })?;

        let status = response.status();
        let payload = response.text().await.context(SubmitRequestSnafu {
            stage: "read-append-response",
        })?;

        if !status.is_success() {
            return SubmitStatusSnafu {
                stage: "append-http-status",
                status: status.as_u16(),
                body: payload,
            }
            .fail();
        }

        let document: WireDocument =
            serde_json::from_str(&payload).context(SubmitResponseDecodeSnafu {
                stage: "parse-append-response",
            })?;

        Ok(document.into_record())
    }
}

impl ChatBackend for RemoteChatBackend {
    fn subscribe_messages(
        &self,
        session: &Session,
        query: FeedQuery,
    ) -> BackendResult<FeedHandle> {
        ensure!(
            !self.settings.project_id.is_empty(),
            FeedProtocolSnafu {
                stage: "check-project",
                details: "backend project id is not configured".to_string(),
            }
        );

        let (event_tx, stream, cancel_rx) = make_feed_stream();
        let worker: FeedWorker = Box::pin(Self::run_listen_worker(
            self.settings.clone(),
            session.id_token.clone(),
            query,
            event_tx,
            cancel_rx,
        ));

        Ok(FeedHandle { stream, worker })
    }

    fn append_message(
        &self,
        session: &Session,
        new_message: NewMessage,
    ) -> BoxFuture<'static, BackendResult<MessageRecord>> {
        let settings = self.settings.clone();
        let http = self.http.clone();
        let id_token = session.id_token.clone();
        Box::pin(Self::run_append(settings, http, id_token, new_message))
    }
}

fn listen_url(settings: &BackendSettings) -> String {
    format!(
        "{}/v1/projects/{}/listen",
        settings.listen_endpoint, settings.project_id
    )
}

fn append_url(settings: &BackendSettings) -> String {
    format!(
        "{}/v1/projects/{}/collections/{}/documents",
        settings.database_endpoint, settings.project_id, settings.collection
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BackendSettings {
        BackendSettings {
            project_id: "ember-demo".to_string(),
            api_key: "key".to_string(),
            ..BackendSettings::default()
        }
        .normalized()
    }

    #[test]
    fn listen_url_targets_the_project() {
        assert_eq!(
            listen_url(&settings()),
            "wss://db.emberlink.app/v1/projects/ember-demo/listen"
        );
    }

    #[test]
    fn append_url_targets_the_collection() {
        assert_eq!(
            append_url(&settings()),
            "https://db.emberlink.app/v1/projects/ember-demo/collections/messages/documents"
        );
    }

    #[test]
    fn subscribe_requires_a_project_id() {
        let backend = RemoteChatBackend::new(BackendSettings::default());
        let session = Session {
            uid: crate::types::UserId::new("u1"),
            id_token: "tok".to_string(),
            photo_url: None,
            provider: crate::types::IdentityProvider::Google,
        };

        let error = backend
            .subscribe_messages(&session, FeedQuery::default())
            .unwrap_err();
        assert!(error.to_string().contains("project id is not configured"));
    }
}
