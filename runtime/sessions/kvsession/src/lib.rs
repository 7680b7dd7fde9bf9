/*!
Server-side HTTP sessions, backed by a key-value cache with time-to-live semantics.

# Why server-side sessions?

Cookie-encoded sessions ship the whole session state to the client on every response.
That state is visible to (and can be replayed by) the client, it is bounded by cookie
size limits, and it can't be revoked by the server.

With server-side sessions, the cookie only carries an opaque **session id**.
The session state lives in a **storage backend** (e.g. Redis), keyed by that id,
and expires on its own thanks to the backend's TTL support.

# Anatomy

- [`Session`] is the in-memory representation of the session state for the current request.
  It tracks whether it has been modified and whether a user logged in or out.
- [`SessionStore`] wraps the [storage backend](store::SessionStorageBackend): a handful of
  key-value and set primitives.
- [`SessionCodec`] turns session payloads into bytes, and back.
- [`SessionInterface`] opens a session at the beginning of a request and saves it at the end,
  emitting the session cookie when needed.
- [`SessionManager`] ties everything together and exposes administrative operations:
  listing the sessions of a user, inspecting the client that created a session,
  destroying sessions.

# Storage layout

All keys share a configurable prefix (`session:` by default):

- `{prefix}{sid}`: the encoded session state, with a TTL;
- `{prefix}{sid}:info`: the client fingerprint, written once;
- `{prefix}user:{user_id}`: the set of session ids a user is logged into.

# Consistency

Every request opens and saves its session independently, without locks:
concurrent requests on the same session race on a last-write-wins basis.
Saving a session takes several store calls, which are not executed as a transaction:
treat the user-session index as a hint, not as a source of truth.
*/
mod codec;
pub mod config;
mod id;
mod info;
mod interface;
mod keys;
mod manager;
mod session_;
mod store_;

pub use codec::{JsonCodec, SessionCodec, SessionState};
pub use id::SessionId;
pub use info::ClientInfo;
pub use interface::{CookieSink, SessionInterface};
pub use keys::KeySpace;
pub use manager::SessionManager;
pub use session_::{PERMANENT_KEY, Session, USER_ID_KEY, UserTransition};
pub use store_::SessionStore;

pub mod store {
    //! Types and traits related to [`SessionStore`][super::SessionStore].
    pub use crate::store_::errors;
    pub use crate::store_::SessionStorageBackend;
}

pub mod errors {
    //! Errors returned by the session subsystem.
    pub use crate::codec::errors::{DecodeError, EncodeError};
    pub use crate::interface::errors::{OpenError, SaveError};
    pub use crate::manager::errors::{DestroyError, MissingInfoError, SessionInfoError};
    pub use crate::session_::errors::{
        MissingKeyError, ValueDeserializationError, ValueSerializationError,
    };
    pub use crate::store_::errors::BackendError;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure how sessions are managed.
pub struct SessionConfig {
    /// The prefix shared by all the keys written to the storage backend.
    ///
    /// By default, it's set to `session:`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    /// Configure the session cookie.
    pub cookie: crate::config::SessionCookieConfig,
    #[serde(default)]
    /// Configure how long session records are kept.
    pub state: crate::config::SessionStateConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            cookie: Default::default(),
            state: Default::default(),
        }
    }
}

fn default_prefix() -> String {
    "session:".to_string()
}
