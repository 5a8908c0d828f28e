use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::TokenSource;
use crate::error::{CivicError, Result};
use crate::store::{set_at, update_at, DataStore, Subscription};

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// REST client for the hosted realtime database.
pub struct FirebaseClient {
    http: Client,
    database_url: Url,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl FirebaseClient {
    pub fn new(database_url: &str, tokens: Option<Arc<dyn TokenSource>>) -> Result<Self> {
        let trimmed = database_url.trim_end_matches('/');
        let database_url = Url::parse(&format!("{trimmed}/"))
            .map_err(|_| CivicError::InvalidUrl(database_url.to_string()))?;
        Ok(Self {
            http: Client::new(),
            database_url,
            tokens,
        })
    }

    /// `https://<db>/<path>.json`, without credentials.
    pub fn node_url(&self, path: &str) -> Result<Url> {
        let path = path.trim_matches('/');
        self.database_url
            .join(&format!("{path}.json"))
            .map_err(|_| CivicError::InvalidUrl(path.to_string()))
    }

    /// [`node_url`](Self::node_url) with the current id token attached.
    async fn signed_url(&self, path: &str) -> Result<Url> {
        let url = self.node_url(path)?;
        match &self.tokens {
            Some(tokens) => Ok(with_token(url, &tokens.id_token().await?)),
            None => Ok(url),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, path = url.path(), "database request");
        self.http.request(method, url)
    }

    async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.signed_url(path).await?;
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn query_indexed(&self, path: &str, child: &str, value: &str) -> Result<Value> {
        let mut url = self.signed_url(path).await?;
        url.query_pairs_mut()
            .append_pair("orderBy", &Value::from(child).to_string())
            .append_pair("equalTo", &Value::from(value).to_string());
        let response = check(self.request(Method::GET, url).send().await?).await?;
        Ok(response.json().await?)
    }
}

fn with_token(mut url: Url, token: &str) -> Url {
    url.query_pairs_mut().append_pair("auth", token);
    url
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read response body>".to_string());
    Err(CivicError::Api {
        status,
        message: api_message(&body),
    })
}

/// The database wraps failures as `{"error": "..."}`.
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl DataStore for FirebaseClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.send_json(Method::GET, path, None)
            .await
            .map_err(|e| CivicError::read(path, e))
    }

    async fn query_equal(&self, path: &str, child: &str, value: &str) -> Result<Value> {
        match self.query_indexed(path, child, value).await {
            Ok(v) if v.is_null() => Ok(Value::Object(Map::new())),
            Ok(v) => Ok(v),
            // Unindexed children are rejected with 400; filter client side.
            Err(CivicError::Api { status, message }) if status == StatusCode::BAD_REQUEST.as_u16() => {
                tracing::warn!(path, child, "index query rejected ({message}), filtering locally");
                let all = self.get(path).await?;
                let matches: Map<String, Value> = all
                    .as_object()
                    .map(|children| {
                        children
                            .iter()
                            .filter(|(_, v)| v.get(child).and_then(Value::as_str) == Some(value))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Value::Object(matches))
            }
            Err(e) => Err(CivicError::read(path, e)),
        }
    }

    async fn update(&self, path: &str, fields: Value) -> Result<()> {
        self.send_json(Method::PATCH, path, Some(&fields))
            .await
            .map(|_| ())
            .map_err(|e| CivicError::write(path, e))
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.send_json(Method::PUT, path, Some(&value))
            .await
            .map(|_| ())
            .map_err(|e| CivicError::write(path, e))
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let url = self.node_url(path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stream = EventStream {
            http: self.http.clone(),
            url,
            tokens: self.tokens.clone(),
            path: path.to_string(),
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(stream.run());
        Ok(Subscription::new(path, rx, cancel))
    }
}

/// Background task feeding one [`Subscription`] from the server-sent
/// event stream.
struct EventStream {
    http: Client,
    url: Url,
    tokens: Option<Arc<dyn TokenSource>>,
    path: String,
    tx: mpsc::UnboundedSender<Result<Value>>,
    cancel: CancellationToken,
}

enum StreamEnd {
    Cancelled,
    Closed,
    Dropped,
    /// The server rejected the id token mid-stream.
    Revoked,
}

impl EventStream {
    async fn run(self) {
        let mut delay = Duration::from_secs(1);
        loop {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return,
                outcome = self.listen() => outcome,
            };
            match outcome {
                Ok(StreamEnd::Cancelled) | Ok(StreamEnd::Closed) => return,
                Ok(StreamEnd::Dropped) => {
                    tracing::warn!(path = %self.path, "event stream ended, reconnecting");
                    delay = Duration::from_secs(1);
                }
                Ok(StreamEnd::Revoked) => {
                    let refreshed = tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        refreshed = self.refresh() => refreshed,
                    };
                    match refreshed {
                        Ok(()) => {
                            tracing::info!(path = %self.path, "id token refreshed, resubscribing");
                        }
                        Err(e) => {
                            tracing::error!(path = %self.path, "token refresh failed: {e}");
                            let _ = self.tx.send(Err(CivicError::NotSignedIn));
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(path = %self.path, "event stream failed: {e}");
                    if self.tx.send(Err(CivicError::read(&self.path, e))).is_err() {
                        return;
                    }
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn refresh(&self) -> Result<()> {
        match &self.tokens {
            Some(tokens) => tokens.refresh().await.map(|_| ()),
            None => Err(CivicError::NotSignedIn),
        }
    }

    async fn listen(&self) -> Result<StreamEnd> {
        let url = match &self.tokens {
            Some(tokens) => with_token(self.url.clone(), &tokens.id_token().await?),
            None => self.url.clone(),
        };
        let response = self
            .http
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let mut body = check(response).await?.bytes_stream();
        let mut parser = SseParser::default();
        let mut mirror = Value::Null;

        while let Some(chunk) = body.next().await {
            for event in parser.push(&chunk?) {
                match apply_event(&mut mirror, &event) {
                    EventEffect::Changed => {
                        if self.tx.send(Ok(mirror.clone())).is_err() {
                            return Ok(StreamEnd::Cancelled);
                        }
                    }
                    EventEffect::Ignored => {}
                    EventEffect::Revoked => {
                        tracing::warn!(path = %self.path, "id token revoked by server");
                        return Ok(StreamEnd::Revoked);
                    }
                    EventEffect::Closed(reason) => {
                        tracing::warn!(path = %self.path, "server closed subscription: {reason}");
                        let _ = self
                            .tx
                            .send(Err(CivicError::SubscriptionClosed(self.path.clone())));
                        return Ok(StreamEnd::Closed);
                    }
                }
            }
        }
        Ok(StreamEnd::Dropped)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// multi-byte characters.
#[derive(Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.current.name.is_empty() || self.has_data {
                    events.push(std::mem::take(&mut self.current));
                }
                self.has_data = false;
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => self.current.name = value.to_string(),
                "data" => {
                    if self.has_data {
                        self.current.data.push('\n');
                    }
                    self.current.data.push_str(value);
                    self.has_data = true;
                }
                _ => {}
            }
        }
        events
    }
}

#[derive(Debug, PartialEq)]
pub enum EventEffect {
    Changed,
    Ignored,
    /// The id token expired or was revoked; a new token may resume.
    Revoked,
    Closed(String),
}

/// Fold one stream event into the local mirror of the subscribed value.
pub fn apply_event(mirror: &mut Value, event: &SseEvent) -> EventEffect {
    match event.name.as_str() {
        "put" | "patch" => {
            let Ok(payload) = serde_json::from_str::<Value>(&event.data) else {
                tracing::warn!("unparsable {} payload", event.name);
                return EventEffect::Ignored;
            };
            let path = payload.get("path").and_then(Value::as_str).unwrap_or("/");
            let data = payload.get("data").cloned().unwrap_or(Value::Null);
            if event.name == "put" {
                set_at(mirror, path, data);
            } else {
                update_at(mirror, path, data);
            }
            EventEffect::Changed
        }
        "auth_revoked" => EventEffect::Revoked,
        "cancel" => EventEffect::Closed(event.data.clone()),
        _ => EventEffect::Ignored,
    }
}
