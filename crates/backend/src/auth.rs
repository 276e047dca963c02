use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;

use snafu::{ResultExt, ensure};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::IdentityClient;
use crate::config::BackendSettings;
use crate::error::{
    AuthExchangeSnafu, AuthExchangeStatusSnafu, AuthFlowRejectedSnafu, AuthRedirectListenerSnafu,
    AuthResponseDecodeSnafu, BackendError, BackendResult, OpenBrowserSnafu,
};
use crate::feed::BoxFuture;
use crate::types::{IdentityProvider, Session, UserId};
use crate::wire::{TokenExchangeBody, TokenResponse};

/// How long a sign-in flow waits for the provider redirect before giving up.
/// The original popup flow could hang forever; a bounded wait keeps the
/// sign-in buttons recoverable.
const AUTH_FLOW_TIMEOUT: Duration = Duration::from_secs(180);

const CALLBACK_PATH: &str = "/callback";

const CALLBACK_DONE_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
<html><body><p>Signed in. You can return to Emberchat.</p></body></html>";

const NOT_FOUND_PAGE: &str =
    "HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

/// Identity client speaking the managed backend's brokered OAuth surface:
/// authorize in the system browser, code via loopback redirect, token
/// exchange over HTTPS.
pub struct HttpIdentityClient {
    settings: BackendSettings,
    http: reqwest::Client,
}

struct CallbackParams {
    code: String,
    state: String,
}

impl HttpIdentityClient {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    async fn run_sign_in(
        settings: BackendSettings,
        http: reqwest::Client,
        provider: IdentityProvider,
    ) -> BackendResult<Session> {
        let state_nonce = uuid::Uuid::new_v4().simple().to_string();

        // Bind before opening the browser so the redirect cannot race the
        // listener.
        let listener = TcpListener::bind(("127.0.0.1", settings.redirect_port))
            .await
            .context(AuthRedirectListenerSnafu {
                stage: "bind-redirect-listener",
            })?;

        let authorize_url = authorize_url(&settings, provider, &state_nonce);
        open_in_browser(&authorize_url).context(OpenBrowserSnafu {
            stage: "launch-authorize-url",
        })?;

        tracing::info!(provider = %provider.label(), "waiting for identity provider redirect");

        let callback = tokio::time::timeout(AUTH_FLOW_TIMEOUT, accept_callback(listener, provider))
            .await
            .map_err(|_| BackendError::AuthFlowRejected {
                stage: "await-redirect",
                provider: provider.id(),
                reason: "timed out waiting for the identity provider redirect".to_string(),
            })??;

        ensure!(
            callback.state == state_nonce,
            AuthFlowRejectedSnafu {
                stage: "verify-state",
                provider: provider.id(),
                reason: "state nonce mismatch in redirect".to_string(),
            }
        );

        let redirect_uri = settings.redirect_uri();
        let body = TokenExchangeBody {
            code: &callback.code,
            state: &callback.state,
            redirect_uri: &redirect_uri,
            api_key: &settings.api_key,
            project_id: &settings.project_id,
        };

        let response = http
            .post(format!("{}/token", settings.auth_endpoint))
            .json(&body)
            .send()
            .await
            .context(AuthExchangeSnafu {
                stage: "send-token-request",
            })?;

        let status = response.status();
        let payload = response.text().await.context(AuthExchangeSnafu {
            stage: "read-token-response",
        })?;

        if !status.is_success() {
            return AuthExchangeStatusSnafu {
                stage: "token-http-status",
                status: status.as_u16(),
                body: payload,
            }
            .fail();
        }

        let token: TokenResponse =
            serde_json::from_str(&payload).context(AuthResponseDecodeSnafu {
                stage: "parse-token-response",
            })?;

        let resolved_provider = token
            .provider
            .as_deref()
            .and_then(IdentityProvider::from_id)
            .unwrap_or(provider);

        tracing::info!(provider = %resolved_provider.label(), uid = %token.uid, "sign-in completed");

        Ok(Session {
            uid: UserId::new(token.uid),
            id_token: token.id_token,
            photo_url: token.photo_url,
            provider: resolved_provider,
        })
    }

    async fn run_sign_out(
        settings: BackendSettings,
        http: reqwest::Client,
        id_token: String,
    ) -> BackendResult<()> {
        let response = http
            .post(format!("{}/revoke", settings.auth_endpoint))
            .bearer_auth(&id_token)
            .send()
            .await
            .context(AuthExchangeSnafu {
                stage: "send-revoke-request",
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return AuthExchangeStatusSnafu {
                stage: "revoke-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(())
    }
}

impl IdentityClient for HttpIdentityClient {
    fn sign_in(&self, provider: IdentityProvider) -> BoxFuture<'static, BackendResult<Session>> {
        let settings = self.settings.clone();
        let http = self.http.clone();
        Box::pin(Self::run_sign_in(settings, http, provider))
    }

    fn sign_out(&self, session: &Session) -> BoxFuture<'static, BackendResult<()>> {
        let settings = self.settings.clone();
        let http = self.http.clone();
        let id_token = session.id_token.clone();
        Box::pin(Self::run_sign_out(settings, http, id_token))
    }
}

fn authorize_url(
    settings: &BackendSettings,
    provider: IdentityProvider,
    state_nonce: &str,
) -> String {
    format!(
        "{}/authorize?provider={}&redirect_uri={}&state={}&apiKey={}",
        settings.auth_endpoint,
        provider.id(),
        urlencoding::encode(&settings.redirect_uri()),
        state_nonce,
        urlencoding::encode(&settings.api_key),
    )
}

/// Accepts loopback connections until the provider redirect arrives.
///
/// Browsers also probe for things like `/favicon.ico`; anything that is not
/// the callback path gets a 404 and the wait continues.
async fn accept_callback(
    listener: TcpListener,
    provider: IdentityProvider,
) -> BackendResult<CallbackParams> {
    loop {
        let (mut socket, _remote) =
            listener.accept().await.context(AuthRedirectListenerSnafu {
                stage: "accept-redirect",
            })?;

        let Some(path) = read_request_path(&mut socket).await? else {
            continue;
        };

        let Some(query) = path.strip_prefix(CALLBACK_PATH) else {
            let _ = socket.write_all(NOT_FOUND_PAGE.as_bytes()).await;
            continue;
        };

        let params = parse_query(query.strip_prefix('?').unwrap_or(""));

        // Tell the browser tab we are done before surfacing any outcome.
        let _ = socket.write_all(CALLBACK_DONE_PAGE.as_bytes()).await;
        let _ = socket.shutdown().await;

        if let Some(reason) = params.get("error") {
            return AuthFlowRejectedSnafu {
                stage: "provider-callback",
                provider: provider.id(),
                reason: reason.clone(),
            }
            .fail();
        }

        match (params.get("code"), params.get("state")) {
            (Some(code), Some(state)) => {
                return Ok(CallbackParams {
                    code: code.clone(),
                    state: state.clone(),
                });
            }
            _ => {
                return AuthFlowRejectedSnafu {
                    stage: "parse-callback",
                    provider: provider.id(),
                    reason: "redirect did not carry code and state".to_string(),
                }
                .fail();
            }
        }
    }
}

/// Reads one HTTP request head and returns its path, or `None` for requests
/// too mangled to carry one.
async fn read_request_path(socket: &mut TcpStream) -> BackendResult<Option<String>> {
    let mut buffer = vec![0u8; 4096];
    let read = socket
        .read(&mut buffer)
        .await
        .context(AuthRedirectListenerSnafu {
            stage: "read-redirect",
        })?;

    let head = String::from_utf8_lossy(&buffer[..read]);
    let path = head
        .lines()
        .next()
        .and_then(|request_line| request_line.split_whitespace().nth(1))
        .map(str::to_string);

    Ok(path)
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn open_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = Command::new("open");
        command.arg(url);
        command
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    };

    command.spawn().map(|_child| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BackendSettings {
        BackendSettings {
            project_id: "ember-demo".to_string(),
            api_key: "key with spaces".to_string(),
            ..BackendSettings::default()
        }
        .normalized()
    }

    #[test]
    fn authorize_url_carries_provider_state_and_encoded_redirect() {
        let url = authorize_url(&settings(), IdentityProvider::Google, "nonce-123");

        assert!(url.starts_with("https://auth.emberlink.app/authorize?"));
        assert!(url.contains("provider=google.com"));
        assert!(url.contains("state=nonce-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8417%2Fcallback"));
        // The api key is percent-encoded, never embedded raw.
        assert!(url.contains("apiKey=key%20with%20spaces"));
        assert!(!url.contains("key with spaces"));
    }

    #[test]
    fn github_flow_uses_its_own_provider_id() {
        let url = authorize_url(&settings(), IdentityProvider::Github, "n");
        assert!(url.contains("provider=github.com"));
    }

    #[test]
    fn parse_query_decodes_components() {
        let params = parse_query("code=abc%2F123&state=xyz&empty=");
        assert_eq!(params.get("code").map(String::as_str), Some("abc/123"));
        assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
        assert_eq!(params.get("empty").map(String::as_str), Some(""));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn parse_query_tolerates_junk() {
        assert!(parse_query("").is_empty());
        let params = parse_query("&&flag&code=1");
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
        assert_eq!(params.get("code").map(String::as_str), Some("1"));
    }
}
