//! Distributed session coordinator.
//!
//! Tracks live connections per identity across gateway instances through
//! the shared store, so a logical identity has at most one current
//! connection. A newly registered session marks stale duplicates with a
//! short-lived termination pointer; the old connection discovers the
//! pointer, closes itself with reason "superseded", and the pointer is
//! consumed on read. Reconnects within the grace window that present the
//! same credential are treated as the same logical connection and left
//! alone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keys;
use crate::domain::{MemberId, SessionId};
use crate::error::GatewayError;
use crate::store::SharedStore;

/// One live connection's registration, stored under `session:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Logical identity that owns this session.
    pub identity: MemberId,
    /// The session id.
    pub session_id: SessionId,
    /// Opaque credential reference from the handshake; sessions sharing
    /// it belong to the same login.
    pub credential_ref: String,
    /// Credential expiry, epoch milliseconds.
    pub expiry_time_ms: i64,
}

/// Session coordinator over the shared store.
#[derive(Debug, Clone)]
pub struct SessionService {
    store: Arc<dyn SharedStore>,
    session_ttl: Duration,
    grace: Duration,
    terminate_ttl: Duration,
}

impl SessionService {
    /// Creates a session service.
    #[must_use]
    pub fn new(
        store: Arc<dyn SharedStore>,
        session_ttl: Duration,
        grace: Duration,
        terminate_ttl: Duration,
    ) -> Self {
        Self {
            store,
            session_ttl,
            grace,
            terminate_ttl,
        }
    }

    /// Registers a session and resolves duplicate logins.
    ///
    /// Every other live session of the same identity is inspected: one
    /// that shares the credential and is either reconnect-style or still
    /// inside the grace window is left alone; anything else gets a
    /// termination pointer to the new session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn register(
        &self,
        identity: &MemberId,
        session_id: &SessionId,
        credential_ref: &str,
        expiry_time: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let now_ms = Utc::now().timestamp_millis();
        let index_key = keys::session_index(identity);
        let existing = self.store.hash_entries(&index_key).await?;
        let new_is_reconnect = session_id.is_reconnect_style();

        if !existing.is_empty() {
            tracing::debug!(
                identity = %identity,
                sessions = existing.len(),
                "existing sessions found during registration"
            );
        }

        for (old_id, last_active) in existing {
            if old_id == session_id.as_str() {
                continue;
            }
            let old_session = SessionId::from(old_id);
            let Some(raw) = self.store.get(&keys::session(&old_session)).await? else {
                continue;
            };
            let Ok(old_record) = serde_json::from_str::<SessionRecord>(&raw) else {
                continue;
            };

            if old_record.credential_ref == credential_ref {
                let age_ms = now_ms.saturating_sub(last_active.parse::<i64>().unwrap_or(0));
                let within_grace = age_ms < self.grace.as_millis() as i64;
                if new_is_reconnect || old_session.is_reconnect_style() || within_grace {
                    tracing::debug!(
                        identity = %identity,
                        old_session = %old_session,
                        "same-credential reconnect; not terminating"
                    );
                    continue;
                }
            }

            tracing::debug!(
                identity = %identity,
                old_session = %old_session,
                new_session = %session_id,
                "duplicate login; marking old session for termination"
            );
            self.store
                .put(
                    &keys::session_terminate(&old_session),
                    session_id.as_str(),
                    Some(self.terminate_ttl),
                )
                .await?;
        }

        let record = SessionRecord {
            identity: identity.clone(),
            session_id: session_id.clone(),
            credential_ref: credential_ref.to_string(),
            expiry_time_ms: expiry_time.timestamp_millis(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| GatewayError::Internal(format!("session encode failed: {e}")))?;
        self.store
            .put(&keys::session(session_id), &json, Some(self.session_ttl))
            .await?;
        self.store
            .hash_set(
                &index_key,
                session_id.as_str(),
                &now_ms.to_string(),
                Some(self.session_ttl),
            )
            .await?;

        tracing::debug!(identity = %identity, session = %session_id, "session registered");
        Ok(())
    }

    /// Returns `true` if the session exists, belongs to `identity`, and
    /// its credential has not expired.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn is_valid(
        &self,
        identity: &MemberId,
        session_id: &SessionId,
    ) -> Result<bool, GatewayError> {
        let Some(raw) = self.store.get(&keys::session(session_id)).await? else {
            return Ok(false);
        };
        let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) else {
            return Ok(false);
        };
        Ok(record.identity == *identity && Utc::now().timestamp_millis() < record.expiry_time_ms)
    }

    /// Extends the session's TTL and bumps its last-active timestamp.
    /// Returns `false` when the record or the index entry is gone.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn refresh(
        &self,
        identity: &MemberId,
        session_id: &SessionId,
    ) -> Result<bool, GatewayError> {
        let session_key = keys::session(session_id);
        if self.store.get(&session_key).await?.is_none() {
            tracing::debug!(identity = %identity, session = %session_id, "refresh failed: no record");
            return Ok(false);
        }
        self.store.expire(&session_key, self.session_ttl).await?;

        let index_key = keys::session_index(identity);
        if self
            .store
            .hash_get(&index_key, session_id.as_str())
            .await?
            .is_none()
        {
            tracing::debug!(identity = %identity, session = %session_id, "refresh failed: not indexed");
            return Ok(false);
        }
        self.store
            .hash_set(
                &index_key,
                session_id.as_str(),
                &Utc::now().timestamp_millis().to_string(),
                Some(self.session_ttl),
            )
            .await?;
        Ok(true)
    }

    /// Consumes a pending termination pointer, returning the superseding
    /// session id so the caller can close this connection with reason
    /// "superseded". The pointer is deleted on read.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn termination_signal(
        &self,
        identity: &MemberId,
        session_id: &SessionId,
    ) -> Result<Option<SessionId>, GatewayError> {
        let terminate_key = keys::session_terminate(session_id);
        let Some(superseded_by) = self.store.get(&terminate_key).await? else {
            return Ok(None);
        };
        self.store.remove(&terminate_key).await?;
        tracing::debug!(
            identity = %identity,
            session = %session_id,
            superseded_by = %superseded_by,
            "termination signal consumed"
        );
        Ok(Some(SessionId::from(superseded_by)))
    }

    /// Marks every other session of `identity` for termination, keeping
    /// `keep`. Reconnect-style sessions and sessions inside the grace
    /// window are spared. Returns how many sessions were marked.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn mark_others_for_termination(
        &self,
        identity: &MemberId,
        keep: &SessionId,
    ) -> Result<usize, GatewayError> {
        let now_ms = Utc::now().timestamp_millis();
        let entries = self
            .store
            .hash_entries(&keys::session_index(identity))
            .await?;
        let mut marked = 0;

        for (old_id, last_active) in entries {
            if old_id == keep.as_str() {
                continue;
            }
            let old_session = SessionId::from(old_id);
            if old_session.is_reconnect_style() {
                continue;
            }
            if self
                .store
                .get(&keys::session(&old_session))
                .await?
                .is_none()
            {
                continue;
            }
            let age_ms = now_ms.saturating_sub(last_active.parse::<i64>().unwrap_or(0));
            if age_ms < self.grace.as_millis() as i64 {
                continue;
            }
            self.store
                .put(
                    &keys::session_terminate(&old_session),
                    keep.as_str(),
                    Some(self.terminate_ttl),
                )
                .await?;
            marked += 1;
        }

        tracing::debug!(identity = %identity, keep = %keep, marked, "marked sessions for termination");
        Ok(marked)
    }

    /// Sweeps all identities for sessions whose credential expired before
    /// `now`, invoking `on_expired` for each before deleting it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn remove_expired(
        &self,
        now: DateTime<Utc>,
        on_expired: &mut (dyn FnMut(&MemberId, &SessionRecord) + Send),
    ) -> Result<usize, GatewayError> {
        let now_ms = now.timestamp_millis();
        let index_keys = self
            .store
            .keys_with_prefix(keys::SESSION_INDEX_PREFIX)
            .await?;
        let mut removed = 0;

        for index_key in index_keys {
            let Some(identity) = index_key.strip_prefix(keys::SESSION_INDEX_PREFIX) else {
                continue;
            };
            let identity = MemberId::from(identity);
            for (session_id, _) in self.store.hash_entries(&index_key).await? {
                let session_id = SessionId::from(session_id);
                let Some(raw) = self.store.get(&keys::session(&session_id)).await? else {
                    continue;
                };
                let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) else {
                    continue;
                };
                if record.expiry_time_ms < now_ms {
                    tracing::debug!(identity = %identity, session = %session_id, "expired session swept");
                    on_expired(&identity, &record);
                    self.remove(&identity, &session_id).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Deletes a session record and its index entry; the index bucket
    /// disappears with its last entry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn remove(
        &self,
        identity: &MemberId,
        session_id: &SessionId,
    ) -> Result<(), GatewayError> {
        self.store.remove(&keys::session(session_id)).await?;
        self.store
            .hash_remove(&keys::session_index(identity), session_id.as_str())
            .await?;
        tracing::debug!(identity = %identity, session = %session_id, "session removed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(store: &Arc<MemoryStore>) -> SessionService {
        SessionService::new(
            Arc::clone(store) as Arc<dyn SharedStore>,
            Duration::from_secs(3600),
            Duration::from_secs(10),
            Duration::from_secs(10),
        )
    }

    fn far_expiry() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(1)
    }

    /// Backdates a session's last-active stamp so tests can cross the
    /// grace window without sleeping.
    async fn backdate(store: &MemoryStore, identity: &MemberId, session: &SessionId, ms: i64) {
        let stamp = (Utc::now().timestamp_millis() - ms).to_string();
        let result = store
            .hash_set(
                &keys::session_index(identity),
                session.as_str(),
                &stamp,
                None,
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn register_then_is_valid() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let sid = SessionId::from("ws-1");

        let result = svc.register(&alice, &sid, "cred-a", far_expiry()).await;
        assert!(result.is_ok());
        assert_eq!(svc.is_valid(&alice, &sid).await.ok(), Some(true));

        // Wrong identity or unknown session is invalid.
        assert_eq!(
            svc.is_valid(&MemberId::from("bob"), &sid).await.ok(),
            Some(false)
        );
        assert_eq!(
            svc.is_valid(&alice, &SessionId::from("ws-404")).await.ok(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn expired_credential_is_invalid() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let sid = SessionId::from("ws-1");

        let past = Utc::now() - chrono::Duration::seconds(5);
        let result = svc.register(&alice, &sid, "cred-a", past).await;
        assert!(result.is_ok());
        assert_eq!(svc.is_valid(&alice, &sid).await.ok(), Some(false));
    }

    #[tokio::test]
    async fn stale_duplicate_login_is_marked_for_termination() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let a = SessionId::from("ws-a");
        let b = SessionId::from("ws-b");

        let result = svc.register(&alice, &a, "cred-1", far_expiry()).await;
        assert!(result.is_ok());
        // Session A last seen 15 s ago, outside the 10 s grace window.
        backdate(&store, &alice, &a, 15_000).await;

        let result = svc.register(&alice, &b, "cred-2", far_expiry()).await;
        assert!(result.is_ok());

        let signal = svc.termination_signal(&alice, &a).await.ok().flatten();
        assert_eq!(signal, Some(b));

        // Delete-on-read: second poll sees nothing.
        let again = svc.termination_signal(&alice, &a).await.ok().flatten();
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn same_credential_reconnect_inside_grace_is_spared() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let a = SessionId::from("ws-a");
        let b = SessionId::from("ws-b");

        let result = svc.register(&alice, &a, "cred-1", far_expiry()).await;
        assert!(result.is_ok());
        // 5 s old: inside the grace window.
        backdate(&store, &alice, &a, 5_000).await;

        let result = svc.register(&alice, &b, "cred-1", far_expiry()).await;
        assert!(result.is_ok());

        let signal = svc.termination_signal(&alice, &a).await.ok().flatten();
        assert_eq!(signal, None);
    }

    #[tokio::test]
    async fn reconnect_style_session_is_spared_with_same_credential() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let a = SessionId::from("token-a");
        let b = SessionId::from("ws-b");

        let result = svc.register(&alice, &a, "cred-1", far_expiry()).await;
        assert!(result.is_ok());
        backdate(&store, &alice, &a, 60_000).await;

        let result = svc.register(&alice, &b, "cred-1", far_expiry()).await;
        assert!(result.is_ok());
        let signal = svc.termination_signal(&alice, &a).await.ok().flatten();
        assert_eq!(signal, None);
    }

    #[tokio::test]
    async fn refresh_extends_known_sessions_only() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let sid = SessionId::from("ws-1");

        assert_eq!(svc.refresh(&alice, &sid).await.ok(), Some(false));

        let result = svc.register(&alice, &sid, "cred-a", far_expiry()).await;
        assert!(result.is_ok());
        assert_eq!(svc.refresh(&alice, &sid).await.ok(), Some(true));
    }

    #[tokio::test]
    async fn mark_others_spares_recent_and_reconnect_style() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let keep = SessionId::from("ws-keep");
        let stale = SessionId::from("ws-stale");
        let fresh = SessionId::from("ws-fresh");
        let token = SessionId::from("token-x");

        for (sid, cred) in [(&keep, "c1"), (&stale, "c2"), (&fresh, "c3"), (&token, "c4")] {
            let result = svc.register(&alice, sid, cred, far_expiry()).await;
            assert!(result.is_ok());
        }
        backdate(&store, &alice, &stale, 30_000).await;
        backdate(&store, &alice, &token, 30_000).await;
        // `fresh` stays inside the grace window.
        backdate(&store, &alice, &fresh, 2_000).await;
        // Clear pointers possibly produced by the registrations above.
        for sid in [&keep, &stale, &fresh, &token] {
            let _ = store.remove(&keys::session_terminate(sid)).await;
        }

        let marked = svc.mark_others_for_termination(&alice, &keep).await.ok();
        assert_eq!(marked, Some(1));
        let signal = svc.termination_signal(&alice, &stale).await.ok().flatten();
        assert_eq!(signal, Some(keep));
        assert_eq!(
            svc.termination_signal(&alice, &fresh).await.ok().flatten(),
            None
        );
        assert_eq!(
            svc.termination_signal(&alice, &token).await.ok().flatten(),
            None
        );
    }

    #[tokio::test]
    async fn sweep_removes_expired_sessions_with_callback() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let live = SessionId::from("ws-live");
        let dead = SessionId::from("ws-dead");

        let result = svc.register(&alice, &live, "c1", far_expiry()).await;
        assert!(result.is_ok());
        let result = svc
            .register(&alice, &dead, "c2", Utc::now() - chrono::Duration::minutes(1))
            .await;
        assert!(result.is_ok());

        let mut seen = Vec::new();
        let removed = svc
            .remove_expired(Utc::now(), &mut |identity, record| {
                seen.push((identity.clone(), record.session_id.clone()));
            })
            .await
            .ok();
        assert_eq!(removed, Some(1));
        assert_eq!(seen, vec![(alice.clone(), dead.clone())]);

        assert_eq!(svc.is_valid(&alice, &dead).await.ok(), Some(false));
        assert_eq!(svc.is_valid(&alice, &live).await.ok(), Some(true));
    }

    #[tokio::test]
    async fn remove_drops_empty_index_bucket() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let alice = MemberId::from("alice");
        let sid = SessionId::from("ws-1");

        let result = svc.register(&alice, &sid, "cred", far_expiry()).await;
        assert!(result.is_ok());
        let result = svc.remove(&alice, &sid).await;
        assert!(result.is_ok());

        let buckets = store.keys_with_prefix(keys::SESSION_INDEX_PREFIX).await.ok();
        assert!(buckets.is_some_and(|b| b.is_empty()));
    }
}
