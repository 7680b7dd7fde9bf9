use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
/// The identifier for a session.
///
/// # Format stability
///
/// From an API perspective, a session id is an opaque string.
/// Freshly minted identifiers are random UUIDs (v4), but identifiers presented by
/// the client are reused verbatim if their record has expired.
/// Do **not** depend on the specifics of the underlying representation.
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random identifier using the random number generator
    /// provided by the underlying operating system.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an identifier presented by the client.
    ///
    /// Returns `None` if the value is empty.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_owned()))
        }
    }

    /// The identifier, as it appears in the session cookie and in storage keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
