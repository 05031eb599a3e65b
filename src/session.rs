//! Server-side visitor sessions.
//!
//! The browser only holds an opaque id in the `gallery_session` cookie; the
//! access level and pending flash messages stay in memory on the server.
//! Sessions are materialized on first write and dropped again as soon as
//! they hold neither an access level nor a pending flash, so a client that
//! only ever sees one-shot messages (a rejected password) leaves nothing
//! behind. Sessions untouched for longer than the idle timeout are forgotten.

use crate::access::AccessLevel;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const COOKIE_NAME: &str = "gallery_session";

/// Opaque per-visitor session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Find our cookie in a `Cookie` header value (`a=1; gallery_session=…`).
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == COOKIE_NAME)
            .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
            .map(Self)
    }

    /// `Set-Cookie` value that hands this id to the browser.
    pub fn set_cookie(&self) -> String {
        format!("{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    /// CSS class used by the templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// A one-shot status message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Everything the server remembers about one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access: Option<AccessLevel>,
    pub flashes: Vec<Flash>,
}

impl Session {
    /// Nothing worth keeping: not logged in and no message pending.
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.flashes.is_empty()
    }
}

/// Idle time after which a session is forgotten.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: Instant,
}

/// In-memory session table.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Snapshot of a session; unknown or expired ids read as an empty session.
    pub fn get(&self, id: SessionId) -> Session {
        match self.live().get_mut(&id) {
            Some(entry) => {
                entry.touched = Instant::now();
                entry.session.clone()
            }
            None => Session::default(),
        }
    }

    /// Apply `f` to the session, creating it if needed and dropping it if
    /// `f` leaves it empty.
    pub fn update<T>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut sessions = self.live();
        let entry = sessions.entry(id).or_insert_with(|| Entry {
            session: Session::default(),
            touched: Instant::now(),
        });
        entry.touched = Instant::now();
        let value = f(&mut entry.session);
        if entry.session.is_empty() {
            sessions.remove(&id);
        }
        value
    }

    pub fn set_access(&self, id: SessionId, level: AccessLevel) {
        self.update(id, |s| s.access = Some(level));
    }

    /// Forget the access level. Pending flashes survive.
    pub fn clear_access(&self, id: SessionId) {
        self.update(id, |s| s.access = None);
    }

    pub fn flash(&self, id: SessionId, flash: Flash) {
        self.update(id, |s| s.flashes.push(flash));
    }

    pub fn flash_all(&self, id: SessionId, flashes: impl IntoIterator<Item = Flash>) {
        self.update(id, |s| s.flashes.extend(flashes));
    }

    /// Remove and return the pending flashes, oldest first.
    pub fn take_flashes(&self, id: SessionId) -> Vec<Flash> {
        self.update(id, |s| std::mem::take(&mut s.flashes))
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the table after dropping sessions idle past the timeout.
    fn live(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let timeout = self.idle_timeout;
        sessions.retain(|_, entry| entry.touched.elapsed() < timeout);
        sessions
    }
}
