use crate::SessionId;

/// Computes the storage keys used by the session subsystem.
///
/// All keys share the same configurable prefix:
///
/// - `{prefix}{sid}` holds the encoded session state;
/// - `{prefix}{sid}:info` holds the encoded client fingerprint;
/// - `{prefix}user:{user_id}` holds the set of session ids owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The key of the session state record.
    pub fn session(&self, id: &SessionId) -> String {
        format!("{}{}", self.prefix, id.as_str())
    }

    /// The key of the client fingerprint record.
    pub fn info(&self, id: &SessionId) -> String {
        format!("{}{}:info", self.prefix, id.as_str())
    }

    /// The key of the user-session index.
    pub fn user(&self, user_id: &str) -> String {
        format!("{}user:{}", self.prefix, user_id)
    }
}
