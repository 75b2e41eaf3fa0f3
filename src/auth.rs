use std::collections::HashMap;
use std::{fmt, str::FromStr};

use log::{debug, trace, warn};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::identity::{Identity, IdentityId};

/// Opaque token handed to the client in the `sessionid` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    pub fn credentials(self) -> Option<(String, String)> {
        Some((self.username?, self.password?))
    }
}

/// Identities logged in since the process started. Nothing here outlives
/// the process.
#[derive(Default)]
pub struct Sessions(RwLock<Directory>);

#[derive(Default)]
struct Directory {
    by_id: HashMap<IdentityId, Identity>,
    by_username: HashMap<String, IdentityId>,
    tokens: HashMap<SessionId, IdentityId>,
}

impl Sessions {
    /// First write wins: when either the id or the username is already
    /// saved, nothing changes.
    pub async fn save(&self, identity: Identity) {
        let mut dir = self.0.write().await;
        save(&mut dir, identity);
    }

    pub async fn get_by_id(&self, id: &IdentityId) -> Option<Identity> {
        self.0.read().await.by_id.get(id).cloned()
    }

    /// Saves `identity` and issues a fresh session for it. `None` when the
    /// username already belongs to a different saved identity.
    pub async fn begin(&self, identity: Identity) -> Option<SessionId> {
        let key = identity.key();

        let mut dir = self.0.write().await;
        save(&mut dir, identity);
        if !dir.by_id.contains_key(&key) {
            warn!("no session for {key}: username taken by another identity");
            return None;
        }

        let session_id = SessionId::new();
        dir.tokens.insert(session_id, key);

        debug!("session {session_id} begun for {key}");
        Some(session_id)
    }

    pub async fn resolve(&self, session_id: &SessionId) -> Option<Identity> {
        let key = self.0.read().await.tokens.get(session_id).copied();
        let identity = match key {
            Some(key) => self.get_by_id(&key).await,
            None => None,
        };

        trace!("session {session_id} resolved: {}", identity.is_some());
        identity
    }

    pub async fn end(&self, session_id: &SessionId) -> bool {
        self.0.write().await.tokens.remove(session_id).is_some()
    }
}

fn save(dir: &mut Directory, identity: Identity) {
    let key = identity.key();

    if dir.by_id.contains_key(&key) || dir.by_username.contains_key(&identity.username) {
        trace!("{key} ({}) already saved", identity.username);
        return;
    }

    dir.by_username.insert(identity.username.clone(), key);
    dir.by_id.insert(key, identity);
}
