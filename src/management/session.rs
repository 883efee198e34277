//! Cookie-identified sessions.
//!
//! The `session` cookie carries only a random session id and an
//! HMAC-SHA256 signature over it. Session values stay on the server, so
//! removing a value takes effect immediately, even if the client replays an
//! old cookie.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::utils::TokenGenerator;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_MAX_AGE_SECS: u64 = 86400 * 7;
const SESSION_ID_LENGTH: usize = 48;

/// Sessions kept at most; the one closest to expiry is evicted first.
pub const MAX_SESSIONS: usize = 10_000;

/// Session key under which the pending OAuth state is kept.
pub const STATE_KEY: &str = "state";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session key is unusable")]
    Key,
    #[error("session cookie is not a valid header value")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

/// Values of one browser session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    id: Option<String>,
    values: BTreeMap<String, String>,
}

impl Session {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

struct StoredSession {
    values: BTreeMap<String, String>,
    expires_at: Instant,
    /// Save order; the lowest value expires first.
    seq: u64,
}

/// Issues session cookies and keeps the values behind them.
pub struct SessionManager {
    secret: Vec<u8>,
    ids: Arc<TokenGenerator>,
    max_age: Duration,
    limit: usize,
    next_seq: AtomicU64,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl SessionManager {
    pub fn new(secret: impl AsRef<[u8]>, ids: Arc<TokenGenerator>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ids,
            max_age: Duration::from_secs(SESSION_MAX_AGE_SECS),
            limit: MAX_SESSIONS,
            next_seq: AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides [`MAX_SESSIONS`].
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Resolves the session named by the request's cookie.
    ///
    /// A missing, forged or expired cookie yields a fresh, empty session.
    pub async fn load(&self, headers: &HeaderMap) -> Session {
        let Some(id) = find_cookie(headers, SESSION_COOKIE).and_then(|raw| self.verify(raw))
        else {
            return Session::default();
        };

        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(stored) if stored.expires_at > Instant::now() => Session {
                id: Some(id),
                values: stored.values.clone(),
            },
            _ => Session::default(),
        }
    }

    /// Stores `session` and returns the `Set-Cookie` header naming it.
    ///
    /// A session without an id gets a new one. Expired sessions are dropped
    /// on the way, and a new session beyond the limit evicts the one closest
    /// to expiry.
    pub async fn save(&self, session: &mut Session) -> Result<HeaderValue, SessionError> {
        let id = match &session.id {
            Some(id) => id.clone(),
            None => {
                let id = self.ids.generate(SESSION_ID_LENGTH);
                session.id = Some(id.clone());
                id
            }
        };

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, stored| stored.expires_at > now);
        if !sessions.contains_key(&id) {
            while sessions.len() >= self.limit {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, stored)| stored.seq)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                tracing::debug!("session limit reached, evicting oldest session");
                sessions.remove(&oldest);
            }
        }
        sessions.insert(
            id.clone(),
            StoredSession {
                values: session.values.clone(),
                expires_at: now + self.max_age,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        drop(sessions);

        let value = format!(
            "{SESSION_COOKIE}={}; Path=/; Max-Age={SESSION_MAX_AGE_SECS}; HttpOnly; SameSite=Lax",
            self.sign(&id)?
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    fn sign(&self, id: &str) -> Result<String, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| SessionError::Key)?;
        mac.update(id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{id}.{signature}"))
    }

    fn verify(&self, raw: &str) -> Option<String> {
        let (id, signature) = raw.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(id.as_bytes());
        match mac.verify_slice(&signature) {
            Ok(()) => Some(id.to_string()),
            Err(_) => {
                tracing::warn!("discarding session cookie with bad signature");
                None
            }
        }
    }
}

fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
