use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use tokio::sync::watch;
use uuid::Uuid;

mod client;
pub use client::ApiClient;

/// A live session: the raw credential plus the identity decoded from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

// Observable credential holder. `watch` keeps only the newest value, so
// subscribers may skip intermediate states but always settle on the
// latest write.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    // The payload is decoded locally without signature verification;
    // clients never hold the server secret. Undecodable values are
    // discarded.
    pub fn restore(stored: Option<&str>) -> Self {
        let store = Self::new();
        if let Some(token) = stored {
            store.set_credential(token);
        }
        store
    }

    pub fn set_credential(&self, token: &str) {
        self.tx.send_replace(decode_session(token));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct LocalClaims {
    sub: Uuid,
    email: String,
}

fn decode_session(token: &str) -> Option<Session> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return None,
    };
    let bytes = Base64UrlUnpadded::decode_vec(payload).ok()?;
    let claims: LocalClaims = serde_json::from_slice(&bytes).ok()?;
    Some(Session {
        token: token.to_string(),
        user_id: claims.sub,
        email: claims.email,
    })
}
