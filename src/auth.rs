use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};

use crate::error::{CivicError, Result};
use crate::types::AuthUser;

const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";

/// Refresh this long before the id token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub user: AuthUser,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    pub fn load(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable session: {e}");
                None
            }
        }
    }

    /// Write the session readable by the owner only; it holds a refresh
    /// token.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    SignedOut,
    SignedIn(AuthUser),
}

/// Resolves once the state turns to signed out. Never resolves if the
/// sender is gone.
pub async fn signed_out(rx: &mut watch::Receiver<AuthState>) {
    if rx.wait_for(|s| *s == AuthState::SignedOut).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Supplies id tokens to the database client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A valid id token, refreshed when close to expiry.
    async fn id_token(&self) -> Result<String>;

    /// A new id token after the server rejected the current one.
    async fn refresh(&self) -> Result<String>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Email/password sign-in against the hosted identity service, with the
/// session persisted between invocations.
pub struct Auth {
    http: Client,
    api_key: String,
    session_path: PathBuf,
    session: Option<Session>,
    state: watch::Sender<AuthState>,
}

impl Auth {
    pub fn new(api_key: String, session_path: PathBuf) -> Self {
        let session = Session::load(&session_path);
        let initial = session
            .as_ref()
            .map(|s| AuthState::SignedIn(s.user.clone()))
            .unwrap_or(AuthState::SignedOut);
        let (state, _) = watch::channel(initial);
        Self {
            http: Client::new(),
            api_key,
            session_path,
            session,
            state,
        }
    }

    /// Receives every sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthUser> {
        let url = format!("{IDENTITY_ENDPOINT}/accounts:signInWithPassword");
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let response: SignInResponse = self.post(&url, &body).await?;

        let profile = self.lookup(&response.id_token).await.unwrap_or_else(|e| {
            tracing::warn!("profile lookup failed, using sign-in fields: {e}");
            None
        });
        let (display_name, photo_url) = match profile {
            Some(p) => (p.display_name.or(response.display_name), p.photo_url),
            None => (response.display_name, None),
        };

        let user = AuthUser::new(response.local_id, response.email, display_name, photo_url);
        let session = Session {
            user: user.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry_from(&response.expires_in),
        };
        self.install(session)?;
        tracing::info!(user = %user.email, "signed in");
        Ok(user)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        if self.session_path.exists() {
            std::fs::remove_file(&self.session_path)?;
        }
        self.session = None;
        self.state.send_replace(AuthState::SignedOut);
        tracing::info!("signed out");
        Ok(())
    }

    /// A valid id token, refreshing the stored one when it is about to
    /// expire.
    pub async fn id_token(&mut self) -> Result<String> {
        let session = self.session.clone().ok_or(CivicError::NotSignedIn)?;
        if !session.needs_refresh(Utc::now()) {
            return Ok(session.id_token);
        }
        self.refresh().await
    }

    /// Exchange the refresh token for a new id token. A refresh token the
    /// identity service rejects ends the session.
    pub async fn refresh(&mut self) -> Result<String> {
        let session = self.session.clone().ok_or(CivicError::NotSignedIn)?;
        tracing::debug!("refreshing id token");
        let url = format!("{TOKEN_ENDPOINT}?key={}", self.api_key);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await?;
        let refreshed: RefreshResponse = match parse_identity_response(response).await {
            Ok(refreshed) => refreshed,
            Err(e @ CivicError::Auth(_)) => {
                tracing::warn!("refresh rejected, signing out: {e}");
                self.sign_out()?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let session = Session {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expiry_from(&refreshed.expires_in),
            ..session
        };
        let token = session.id_token.clone();
        self.install(session)?;
        Ok(token)
    }

    fn install(&mut self, session: Session) -> Result<()> {
        session.save(&self.session_path)?;
        self.state.send_replace(AuthState::SignedIn(session.user.clone()));
        self.session = Some(session);
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> Result<Option<LookupUser>> {
        let url = format!("{IDENTITY_ENDPOINT}/accounts:lookup");
        let response: LookupResponse = self.post(&url, &json!({ "idToken": id_token })).await?;
        Ok(response.users.into_iter().next())
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T> {
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;
        parse_identity_response(response).await
    }
}

/// [`Auth`] shared between the database client and its subscriptions.
#[derive(Clone)]
pub struct SharedAuth(Arc<Mutex<Auth>>);

impl SharedAuth {
    pub fn new(auth: Auth) -> Self {
        Self(Arc::new(Mutex::new(auth)))
    }
}

#[async_trait]
impl TokenSource for SharedAuth {
    async fn id_token(&self) -> Result<String> {
        self.0.lock().await.id_token().await
    }

    async fn refresh(&self) -> Result<String> {
        self.0.lock().await.refresh().await
    }
}

async fn parse_identity_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if response.status().is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CivicError::Auth(identity_error(&body)))
}

/// Turn `{"error": {"message": "INVALID_PASSWORD"}}` into readable text.
fn identity_error(body: &str) -> String {
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from));
    match code.as_deref() {
        Some("EMAIL_NOT_FOUND") | Some("INVALID_PASSWORD") | Some("INVALID_LOGIN_CREDENTIALS") => {
            "invalid email or password".to_string()
        }
        Some("USER_DISABLED") => "this account has been disabled".to_string(),
        Some(code) if code.starts_with("TOO_MANY_ATTEMPTS") => {
            "too many attempts, try again later".to_string()
        }
        Some("TOKEN_EXPIRED") | Some("INVALID_REFRESH_TOKEN") => {
            "session expired, run 'civic login' again".to_string()
        }
        Some(code) => code.to_lowercase().replace('_', " "),
        None => body.to_string(),
    }
}

fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}
