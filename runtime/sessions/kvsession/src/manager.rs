use std::collections::HashSet;
use std::sync::Arc;

use biscotti::RequestCookies;
use errors::{DestroyError, MissingInfoError, SessionInfoError};
use tracing_log_error::log_error;

use crate::codec::{JsonCodec, SessionCodec, decode_info, decode_state};
use crate::interface::errors::{OpenError, SaveError};
use crate::interface::CookieSink;
use crate::session_::{USER_ID_KEY, render_user_id};
use crate::store::errors::BackendError;
use crate::{ClientInfo, Session, SessionConfig, SessionId, SessionInterface, SessionStore};

#[derive(Debug, Clone)]
/// The entry point of the session subsystem.
///
/// It owns the configuration, the storage backend handle and the codec,
/// and shares them with the [`SessionInterface`] used to open and save sessions
/// on every request.
/// On top of that, it exposes administrative operations that bypass the
/// request flow: listing a user's sessions, inspecting the client that created a
/// session, destroying sessions.
///
/// Build it once, at startup, and clone it wherever it's needed: clones share
/// the same backend.
pub struct SessionManager {
    interface: SessionInterface,
}

impl SessionManager {
    /// Create a new manager using the default [`JsonCodec`].
    pub fn new(store: SessionStore, config: SessionConfig) -> Self {
        Self::with_codec(store, config, JsonCodec)
    }

    /// Create a new manager using a custom codec to encode session payloads.
    pub fn with_codec<Codec>(store: SessionStore, config: SessionConfig, codec: Codec) -> Self
    where
        Codec: SessionCodec + 'static,
    {
        Self {
            interface: SessionInterface::new(store, Arc::new(codec), config),
        }
    }

    /// The interface used to open and save sessions.
    pub fn interface(&self) -> &SessionInterface {
        &self.interface
    }

    /// Shorthand for [`SessionInterface::open`].
    pub async fn open(&self, incoming_id: Option<&str>) -> Result<Session, OpenError> {
        self.interface.open(incoming_id).await
    }

    /// Shorthand for [`SessionInterface::open_from_cookies`].
    pub async fn open_from_cookies(
        &self,
        cookies: &RequestCookies<'_>,
    ) -> Result<Session, OpenError> {
        self.interface.open_from_cookies(cookies).await
    }

    /// Shorthand for [`SessionInterface::save`].
    pub async fn save(
        &self,
        session: Session,
        client: &ClientInfo,
        cookies: &mut dyn CookieSink,
    ) -> Result<(), SaveError> {
        self.interface.save(session, client, cookies).await
    }

    /// The sessions a user logged into.
    ///
    /// The index is a hint: a listed session may have expired in the meantime.
    /// A user without sessions yields an empty set.
    #[tracing::instrument(name = "List user sessions", level = tracing::Level::DEBUG, skip_all)]
    pub async fn get_user_sessions(
        &self,
        user_id: &str,
    ) -> Result<HashSet<SessionId>, BackendError> {
        let members = self
            .interface
            .store()
            .set_members(&self.interface.keys().user(user_id))
            .await?;
        Ok(members
            .iter()
            .filter_map(|member| SessionId::parse(member))
            .collect())
    }

    /// The fingerprint of the client that first saved the given session.
    ///
    /// It fails if no fingerprint was recorded for this session id.
    #[tracing::instrument(name = "Get session info", level = tracing::Level::DEBUG, skip_all)]
    pub async fn get_session_info(&self, id: &SessionId) -> Result<ClientInfo, SessionInfoError> {
        let Some(bytes) = self
            .interface
            .store()
            .get(&self.interface.keys().info(id))
            .await?
        else {
            return Err(MissingInfoError { id: id.to_owned() }.into());
        };
        Ok(decode_info(self.interface.codec(), &bytes)?)
    }

    /// Destroy a session, regardless of the request flow.
    ///
    /// The session is removed from the index of the user it belongs to, then
    /// its record is deleted. Destroying a session that doesn't exist is a no-op.
    ///
    /// If the stored record can't be decoded, the owner is unknown: the failure is logged,
    /// the index is left untouched and the record is deleted anyway.
    #[tracing::instrument(name = "Destroy session", level = tracing::Level::INFO, skip_all)]
    pub async fn destroy_session(&self, id: &SessionId) -> Result<(), DestroyError> {
        let store = self.interface.store();
        let keys = self.interface.keys();
        let session_key = keys.session(id);
        let Some(bytes) = store.get(&session_key).await? else {
            tracing::trace!(session.id = %id, "There is no session to destroy");
            return Ok(());
        };
        match decode_state(self.interface.codec(), &bytes) {
            Ok(state) => {
                if let Some(user_id) = state.get(USER_ID_KEY).map(render_user_id) {
                    store.set_remove(&keys.user(&user_id), id.as_str()).await?;
                }
            }
            Err(e) => {
                log_error!(
                    e,
                    level: tracing::Level::WARN,
                    session.id = %id,
                    "The session record is corrupted, its user index entry (if any) won't be removed"
                );
            }
        }
        store.delete(&session_key).await?;
        Ok(())
    }

    /// Destroy every session listed in the user's index, then drop the index itself.
    ///
    /// It returns the number of sessions that were listed.
    #[tracing::instrument(name = "Destroy user sessions", level = tracing::Level::INFO, skip_all)]
    pub async fn destroy_user_sessions(&self, user_id: &str) -> Result<usize, DestroyError> {
        let ids = self.get_user_sessions(user_id).await?;
        for id in &ids {
            self.destroy_session(id).await?;
        }
        self.interface
            .store()
            .delete(&self.interface.keys().user(user_id))
            .await?;
        tracing::info!(
            session.user_id = %user_id,
            count = ids.len(),
            "Destroyed all user sessions"
        );
        Ok(ids.len())
    }

    /// Remove index entries that point at sessions which no longer exist
    /// (e.g. they expired).
    ///
    /// It returns the number of entries that were removed.
    #[tracing::instrument(name = "Prune user sessions", level = tracing::Level::DEBUG, skip_all)]
    pub async fn prune_user_sessions(&self, user_id: &str) -> Result<usize, BackendError> {
        let store = self.interface.store();
        let keys = self.interface.keys();
        let index_key = keys.user(user_id);
        let mut pruned = 0;
        for id in self.get_user_sessions(user_id).await? {
            if store.get(&keys.session(&id)).await?.is_none() {
                store.set_remove(&index_key, id.as_str()).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

/// Errors returned by [`SessionManager`]'s administrative operations.
pub mod errors {
    use crate::codec::errors::DecodeError;
    use crate::store::errors::BackendError;
    use crate::SessionId;

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`SessionManager::get_session_info`][super::SessionManager::get_session_info].
    pub enum SessionInfoError {
        #[error("Failed to load the client fingerprint")]
        Backend(#[from] BackendError),
        #[error("Failed to decode the client fingerprint")]
        Decode(#[from] DecodeError),
        #[error(transparent)]
        Missing(#[from] MissingInfoError),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("There is no client fingerprint for session `{id}`")]
    /// No client fingerprint was recorded for the given session id.
    pub struct MissingInfoError {
        pub id: SessionId,
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`SessionManager::destroy_session`][super::SessionManager::destroy_session].
    pub enum DestroyError {
        #[error("Failed to destroy the session")]
        Backend(#[from] BackendError),
    }
}
