use std::sync::Arc;

use biscotti::time::SignedDuration;
use biscotti::{RemovalCookie, RequestCookies, ResponseCookie, ResponseCookies};
use errors::{OpenError, SaveError};

use crate::codec::{SessionCodec, decode_state, encode_info, encode_state};
use crate::keys::KeySpace;
use crate::session_::UserTransition;
use crate::{ClientInfo, Session, SessionConfig, SessionId, SessionStore};

/// Where the session cookie ends up.
///
/// [`SessionInterface::save`] calls at most one of the two methods, at most once.
pub trait CookieSink {
    /// Attach the session cookie to the outgoing response.
    fn set_cookie(&mut self, cookie: ResponseCookie<'static>);
    /// Instruct the client to drop the session cookie.
    fn remove_cookie(&mut self, cookie: RemovalCookie<'static>);
}

impl CookieSink for ResponseCookies<'static> {
    fn set_cookie(&mut self, cookie: ResponseCookie<'static>) {
        self.insert(cookie);
    }

    fn remove_cookie(&mut self, cookie: RemovalCookie<'static>) {
        self.insert(cookie);
    }
}

#[derive(Debug, Clone)]
/// Loads sessions at the beginning of a request and persists them at the end.
///
/// A single instance is meant to be shared by all request handlers: there is no
/// per-request state and no locking. Two concurrent requests for the same session
/// race on a last-write-wins basis.
pub struct SessionInterface {
    store: SessionStore,
    codec: Arc<dyn SessionCodec>,
    config: Arc<SessionConfig>,
    keys: KeySpace,
}

impl SessionInterface {
    /// Create a new interface on top of the given store and codec.
    pub fn new(store: SessionStore, codec: Arc<dyn SessionCodec>, config: SessionConfig) -> Self {
        let keys = KeySpace::new(config.prefix.clone());
        Self {
            store,
            codec,
            config: Arc::new(config),
            keys,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn codec(&self) -> &dyn SessionCodec {
        self.codec.as_ref()
    }

    /// Load the session attached to the incoming request.
    ///
    /// - No identifier: a new, empty session with a freshly minted identifier.
    /// - Identifier with a stored record: the stored session.
    /// - Identifier without a stored record (e.g. it expired): a new, empty session
    ///   that **keeps** the identifier presented by the client.
    ///
    /// A stored record that can't be decoded is an error, not an empty session.
    #[tracing::instrument(name = "Open session", level = tracing::Level::DEBUG, skip_all)]
    pub async fn open(&self, incoming_id: Option<&str>) -> Result<Session, OpenError> {
        let Some(id) = incoming_id.and_then(SessionId::parse) else {
            let id = SessionId::random();
            tracing::trace!(session.id = %id, "No session cookie, minted a new session id");
            return Ok(Session::new(id));
        };
        let Some(bytes) = self.store.get(&self.keys.session(&id)).await? else {
            tracing::debug!(
                session.id = %id,
                "No stored record for the session, starting afresh with the same id"
            );
            return Ok(Session::new(id));
        };
        let state = decode_state(self.codec.as_ref(), &bytes)?;
        Ok(Session::loaded(id, state))
    }

    /// Load the session using the identifier carried by the configured session cookie.
    pub async fn open_from_cookies(
        &self,
        cookies: &RequestCookies<'_>,
    ) -> Result<Session, OpenError> {
        let incoming = cookies.get(&self.config.cookie.name).map(|c| c.value().to_owned());
        self.open(incoming.as_deref()).await
    }

    /// How long the session record should be kept by the store.
    ///
    /// It only governs the store record: the cookie expiration is computed
    /// separately and may differ.
    pub fn compute_store_ttl(&self, session: &Session) -> std::time::Duration {
        if session.is_permanent() {
            self.config.state.permanent_ttl
        } else {
            self.config.state.ttl
        }
    }

    /// Persist the session and emit the session cookie, if needed.
    ///
    /// In order:
    ///
    /// 1. The client fingerprint is recorded, unless one already exists for this session id.
    /// 2. The user-session index is updated if a user logged in or out.
    /// 3. An empty session is deleted from the store. If it was emptied during this
    ///    request, the client is asked to drop the cookie.
    /// 4. A non-empty session is written to the store, with a TTL
    ///    from [`compute_store_ttl`](Self::compute_store_ttl), and the cookie is set.
    ///
    /// These steps are separate store calls, not a transaction: a failure midway
    /// can leave the user-session index out of sync with the session records.
    #[tracing::instrument(name = "Save session", level = tracing::Level::DEBUG, skip_all)]
    pub async fn save(
        &self,
        session: Session,
        client: &ClientInfo,
        cookies: &mut dyn CookieSink,
    ) -> Result<(), SaveError> {
        let id = session.id().clone();

        let info_key = self.keys.info(&id);
        if self.store.get(&info_key).await?.is_none() {
            let info = encode_info(self.codec.as_ref(), client)?;
            match self.config.state.info_ttl {
                Some(ttl) => self.store.set_with_ttl(&info_key, &info, ttl).await?,
                None => self.store.set(&info_key, &info).await?,
            }
        }

        match session.transition() {
            UserTransition::Login { user_id } => {
                tracing::debug!(session.id = %id, session.user_id = %user_id, "User logged in");
                self.store.set_add(&self.keys.user(user_id), id.as_str()).await?;
            }
            UserTransition::Logout { user_id } => {
                tracing::debug!(session.id = %id, session.user_id = %user_id, "User logged out");
                self.store
                    .set_remove(&self.keys.user(user_id), id.as_str())
                    .await?;
            }
            UserTransition::None => {}
        }

        let session_key = self.keys.session(&id);
        if session.is_empty() {
            self.store.delete(&session_key).await?;
            if session.is_modified() {
                tracing::trace!(session.id = %id, "Session was emptied, removing the cookie");
                cookies.remove_cookie(self.removal_cookie());
            }
            return Ok(());
        }

        let ttl = self.compute_store_ttl(&session);
        let cookie = self.session_cookie(&session);
        let state = encode_state(self.codec.as_ref(), session.into_state())?;
        self.store.set_with_ttl(&session_key, &state, ttl).await?;
        cookies.set_cookie(cookie);
        Ok(())
    }

    fn session_cookie(&self, session: &Session) -> ResponseCookie<'static> {
        let cookie_config = &self.config.cookie;
        let mut cookie = ResponseCookie::new(cookie_config.name.clone(), session.id().to_string())
            .set_http_only(true);
        if let Some(domain) = cookie_config.domain.as_deref() {
            cookie = cookie.set_domain(domain.to_owned());
        }
        if let Some(path) = cookie_config.path.as_deref() {
            cookie = cookie.set_path(path.to_owned());
        }
        if let Some(same_site) = cookie_config.same_site {
            cookie = cookie.set_same_site(same_site);
        }
        if cookie_config.secure {
            cookie = cookie.set_secure(true);
        }
        // Non-permanent sessions get a cookie that expires with the browser session.
        if session.is_permanent() {
            let max_age: SignedDuration = self
                .config
                .state
                .permanent_ttl
                .try_into()
                .unwrap_or(SignedDuration::MAX);
            cookie = cookie.set_max_age(max_age);
        }
        cookie
    }

    fn removal_cookie(&self) -> RemovalCookie<'static> {
        let cookie_config = &self.config.cookie;
        let mut cookie = RemovalCookie::new(cookie_config.name.clone());
        if let Some(domain) = cookie_config.domain.as_deref() {
            cookie = cookie.set_domain(domain.to_owned());
        }
        if let Some(path) = cookie_config.path.as_deref() {
            cookie = cookie.set_path(path.to_owned());
        }
        cookie
    }
}

/// Errors that can occur when opening or saving a session.
pub mod errors {
    use crate::codec::errors::{DecodeError, EncodeError};
    use crate::store::errors::BackendError;

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`SessionInterface::open`][super::SessionInterface::open].
    pub enum OpenError {
        #[error("Failed to load the session record")]
        Backend(#[from] BackendError),
        #[error("Failed to decode the session record")]
        Decode(#[from] DecodeError),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`SessionInterface::save`][super::SessionInterface::save].
    pub enum SaveError {
        #[error("Failed to sync the session with the storage backend")]
        Backend(#[from] BackendError),
        #[error("Failed to encode the session")]
        Encode(#[from] EncodeError),
    }
}
