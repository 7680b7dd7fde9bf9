use errors::{MissingKeyError, ValueDeserializationError, ValueSerializationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec::SessionState;
use crate::SessionId;

/// The key that identifies the user a session belongs to.
///
/// Writing it is a login, removing it is a logout: both transitions are
/// reflected in the user-session index when the session is saved.
pub const USER_ID_KEY: &str = "user_id";

/// The key used to persist the [permanence flag](Session::set_permanent)
/// alongside the other session values.
pub const PERMANENT_KEY: &str = "_permanent";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// The most recent change to the user associated with a session.
pub enum UserTransition {
    /// [`USER_ID_KEY`] hasn't been written or removed.
    #[default]
    None,
    /// [`USER_ID_KEY`] was set to `user_id`.
    Login { user_id: String },
    /// [`USER_ID_KEY`] was removed. It held `user_id` right before removal.
    Logout { user_id: String },
}

#[derive(Debug, Clone)]
/// The current HTTP session.
///
/// A key-value container with some extra bookkeeping: it tracks
/// whether it has been modified and whether a user logged in or out.
/// It performs no I/O: load it with [`SessionInterface::open`] and persist it
/// with [`SessionInterface::save`].
///
/// [`SessionInterface::open`]: crate::SessionInterface::open
/// [`SessionInterface::save`]: crate::SessionInterface::save
pub struct Session {
    id: SessionId,
    state: SessionState,
    is_new: bool,
    modified: bool,
    transition: UserTransition,
}

impl Session {
    /// A brand-new, empty session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::new(),
            is_new: true,
            modified: false,
            transition: UserTransition::None,
        }
    }

    /// A session whose state was retrieved from the store.
    pub(crate) fn loaded(id: SessionId, state: SessionState) -> Self {
        Self {
            id,
            state,
            is_new: false,
            modified: false,
            transition: UserTransition::None,
        }
    }

    /// The identifier of this session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// `true` if there was no stored record for this session when it was opened.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// `true` if the session state has been changed since it was opened.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// `true` if the session should use the long-lived expiration policy.
    pub fn is_permanent(&self) -> bool {
        matches!(self.state.get(PERMANENT_KEY), Some(Value::Bool(true)))
    }

    /// Opt this session in (or out) of the long-lived expiration policy.
    ///
    /// The flag is persisted with the rest of the session state, under [`PERMANENT_KEY`].
    pub fn set_permanent(&mut self, permanent: bool) {
        if permanent {
            self.insert_raw(PERMANENT_KEY, Value::Bool(true));
        } else if self.state.remove(PERMANENT_KEY).is_some() {
            self.modified = true;
        }
    }

    /// The latest login/logout transition recorded on this session.
    pub fn transition(&self) -> &UserTransition {
        &self.transition
    }

    /// The user id captured by the latest login/logout transition, if any.
    pub fn user_id(&self) -> Option<&str> {
        match &self.transition {
            UserTransition::None => None,
            UserTransition::Login { user_id } | UserTransition::Logout { user_id } => {
                Some(user_id)
            }
        }
    }

    /// Get the value associated with `key`, deserialized as `T`.
    ///
    /// If the value is not found, `None` is returned.
    /// If the value cannot be deserialized into the expected type, an error is returned.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ValueDeserializationError> {
        self.get_raw(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(|e| ValueDeserializationError {
                key: key.to_owned(),
                source: e,
            })
    }

    /// Get the raw JSON value associated with `key`.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Set a value for the given key.
    ///
    /// If the key already exists, the old raw value is returned.
    /// If the value cannot be serialized, an error is returned and the session is left untouched.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, ValueSerializationError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ValueSerializationError {
            key: key.clone(),
            source: e,
        })?;
        Ok(self.insert_raw(key, value))
    }

    /// Set a raw JSON value for the given key.
    ///
    /// If the key already exists, the old value is returned.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if key == USER_ID_KEY {
            self.transition = UserTransition::Login {
                user_id: render_user_id(&value),
            };
        }
        self.modified = true;
        self.state.insert(key, value)
    }

    /// Remove the value associated with `key` and return it.
    ///
    /// It fails if the key doesn't exist.
    /// Use [`remove_or`](Self::remove_or) if a missing key is expected.
    pub fn remove(&mut self, key: &str) -> Result<Value, MissingKeyError> {
        self.take(key).ok_or_else(|| MissingKeyError {
            key: key.to_owned(),
        })
    }

    /// Remove the value associated with `key` and return it, or return `default`
    /// if the key doesn't exist.
    ///
    /// The session is only marked as modified if a value was actually removed.
    pub fn remove_or(&mut self, key: &str, default: Value) -> Value {
        self.take(key).unwrap_or(default)
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        let value = self.state.remove(key)?;
        if key == USER_ID_KEY {
            self.transition = UserTransition::Logout {
                user_id: render_user_id(&value),
            };
        }
        self.modified = true;
        Some(value)
    }

    /// Remove all key-value pairs.
    ///
    /// If [`USER_ID_KEY`] was set, this counts as a logout.
    pub fn clear(&mut self) {
        if self.state.is_empty() {
            return;
        }
        if let Some(value) = self.state.get(USER_ID_KEY) {
            self.transition = UserTransition::Logout {
                user_id: render_user_id(value),
            };
        }
        self.state.clear();
        self.modified = true;
    }

    /// `true` if there is a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// `true` if there are no key-value pairs in the session.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// The number of key-value pairs in the session.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// The keys currently set on the session.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.state.keys().map(String::as_str)
    }

    pub(crate) fn into_state(self) -> SessionState {
        self.state
    }
}

/// User ids are used as part of storage keys: strings are used verbatim,
/// everything else is rendered as JSON.
pub(crate) fn render_user_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Errors that can occur when manipulating the session state.
pub mod errors {
    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("There is no value associated with `{key}` in the session")]
    /// The error returned by [`Session::remove`][super::Session::remove].
    pub struct MissingKeyError {
        /// The key that was not found.
        pub key: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to deserialize the value associated with `{key}`")]
    /// The error returned by [`Session::get`][super::Session::get].
    pub struct ValueDeserializationError {
        /// The key of the value that we failed to deserialize.
        pub key: String,
        #[source]
        /// The underlying deserialization error.
        pub source: serde_json::Error,
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to serialize the value associated with `{key}`")]
    /// The error returned by [`Session::insert`][super::Session::insert].
    pub struct ValueSerializationError {
        /// The key of the value that we failed to serialize.
        pub key: String,
        #[source]
        /// The underlying serialization error.
        pub source: serde_json::Error,
    }
}
