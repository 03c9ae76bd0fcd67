//! The credential store: one persisted record per session type.
//!
//! Each [`SessionType`] owns three keys and nothing else:
//!
//! ```text
//! customer.token        customer.issued_at        customer.user
//! restaurant.token      restaurant.issued_at      restaurant.user
//! admin.token           admin.issued_at           admin.user
//! ```
//!
//! There are no cross-type keys, so clearing one session can never touch
//! another.

use chrono::{DateTime, Utc};
use orderpass_protocol::{Codec, JsonCodec, SessionType, UserRecord};
use tracing::{debug, warn};

use crate::{KeyValueStorage, StorageError};

const TOKEN: &str = "token";
const ISSUED_AT: &str = "issued_at";
const USER: &str = "user";

/// A persisted credential for one session type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    /// Last user record seen for this token. Missing or unreadable cached
    /// users don't invalidate the record; hydration fetches a fresh one.
    pub cached_user: Option<UserRecord>,
}

/// Reads and writes [`CredentialRecord`]s in a [`KeyValueStorage`].
#[derive(Debug)]
pub struct CredentialStore<S> {
    storage: S,
    codec: JsonCodec,
}

impl<S: KeyValueStorage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            codec: JsonCodec,
        }
    }

    /// The underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Replaces the record for `kind`.
    ///
    /// All values are encoded before anything is written. If a write then
    /// fails part-way the whole group is cleared, so a reader never sees a
    /// new token paired with an old issue time.
    pub fn save(
        &self,
        kind: SessionType,
        record: &CredentialRecord,
    ) -> Result<(), StorageError> {
        let user = match &record.cached_user {
            Some(user) => Some(self.encode_user(user)?),
            None => None,
        };
        let issued_at = record.issued_at.to_rfc3339();

        let written = (|| {
            self.storage.set(&key(kind, TOKEN), &record.token)?;
            self.storage.set(&key(kind, ISSUED_AT), &issued_at)?;
            match &user {
                Some(json) => self.storage.set(&key(kind, USER), json),
                None => self.storage.remove(&key(kind, USER)),
            }
        })();

        if let Err(e) = written {
            warn!(session = %kind, error = %e, "failed to save credential, clearing");
            self.clear(kind);
            return Err(e);
        }
        Ok(())
    }

    /// Swaps in a renewed token and issue time, keeping the cached user.
    pub fn replace_token(
        &self,
        kind: SessionType,
        token: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let written = self
            .storage
            .set(&key(kind, TOKEN), token)
            .and_then(|()| self.storage.set(&key(kind, ISSUED_AT), &issued_at.to_rfc3339()));

        if let Err(e) = written {
            warn!(session = %kind, error = %e, "failed to store renewed token, clearing");
            self.clear(kind);
            return Err(e);
        }
        Ok(())
    }

    /// Refreshes only the cached user.
    pub fn cache_user(
        &self,
        kind: SessionType,
        user: &UserRecord,
    ) -> Result<(), StorageError> {
        let json = self.encode_user(user)?;
        self.storage.set(&key(kind, USER), &json)
    }

    /// Reads the record for `kind`.
    ///
    /// Returns `None` when there is no token, when the issue time is
    /// missing or unparsable, or when the storage itself fails.
    pub fn read(&self, kind: SessionType) -> Option<CredentialRecord> {
        let token = match self.storage.get(&key(kind, TOKEN)) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(e) => {
                warn!(session = %kind, error = %e, "credential read failed, treating as absent");
                return None;
            }
        };

        let issued_at = match self.storage.get(&key(kind, ISSUED_AT)) {
            Ok(Some(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    debug!(session = %kind, error = %e, "unparsable issue time, treating as absent");
                    return None;
                }
            },
            Ok(None) => {
                debug!(session = %kind, "token without issue time, treating as absent");
                return None;
            }
            Err(e) => {
                warn!(session = %kind, error = %e, "credential read failed, treating as absent");
                return None;
            }
        };

        let cached_user = match self.storage.get(&key(kind, USER)) {
            Ok(Some(raw)) => match self.codec.decode::<UserRecord>(raw.as_bytes()) {
                Ok(user) => Some(user),
                Err(e) => {
                    debug!(session = %kind, error = %e, "ignoring unreadable cached user");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(session = %kind, error = %e, "ignoring unreadable cached user");
                None
            }
        };

        Some(CredentialRecord {
            token,
            issued_at,
            cached_user,
        })
    }

    /// Removes every key for `kind`. Idempotent; failures are logged.
    pub fn clear(&self, kind: SessionType) {
        for field in [TOKEN, ISSUED_AT, USER] {
            if let Err(e) = self.storage.remove(&key(kind, field)) {
                warn!(session = %kind, field, error = %e, "failed to remove credential key");
            }
        }
    }

    /// Which session type, if any, currently stores exactly `token`.
    pub fn find_by_token(&self, token: &str) -> Option<SessionType> {
        SessionType::ALL.into_iter().find(|kind| {
            self.read(*kind)
                .is_some_and(|record| record.token == token)
        })
    }

    fn encode_user(&self, user: &UserRecord) -> Result<String, StorageError> {
        let bytes = self.codec.encode(user)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn key(kind: SessionType, field: &str) -> String {
    format!("{}.{field}", kind.as_str())
}
