#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure how long session records are kept in the storage backend.
pub struct SessionStateConfig {
    /// The time-to-live of the session record for non-permanent sessions.
    ///
    /// # Default
    ///
    /// The default value is 24 hours.
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub ttl: std::time::Duration,
    /// The time-to-live of the session record for
    /// [permanent sessions](crate::Session::set_permanent).
    ///
    /// It is also used as the `Max-Age` of the session cookie for permanent sessions.
    ///
    /// # Default
    ///
    /// The default value is 31 days.
    #[serde(with = "humantime_serde", default = "default_permanent_ttl")]
    pub permanent_ttl: std::time::Duration,
    /// The time-to-live of the client fingerprint record.
    ///
    /// # Default
    ///
    /// By default, the record never expires: it outlives the session record
    /// unless it is removed out of band.
    #[serde(with = "humantime_serde", default)]
    pub info_ttl: Option<std::time::Duration>,
}

impl Default for SessionStateConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            permanent_ttl: default_permanent_ttl(),
            info_ttl: None,
        }
    }
}

fn default_ttl() -> std::time::Duration {
    std::time::Duration::from_secs(60 * 60 * 24)
}

fn default_permanent_ttl() -> std::time::Duration {
    std::time::Duration::from_secs(60 * 60 * 24 * 31)
}
