use std::path::PathBuf;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::de::DeserializeOwned;

static PREFIX: &str = "SM_";
static PROFILE_ENV_VAR: &str = "SM_PROFILE";

#[derive(Clone, Debug, Default)]
/// A utility to load hierarchical configuration for the session subsystem
/// (or for the whole application embedding it).
///
/// # Example
///
/// ```rust,no_run
/// use kvsession::{config::ConfigLoader, SessionConfig};
///
/// #[derive(Debug, Clone, serde::Deserialize)]
/// pub struct Config {
///     #[serde(default)]
///     session: SessionConfig,
///     // Other fields...
/// }
///
/// # fn main() -> anyhow::Result<()> {
/// let config: Config = ConfigLoader::new().profile("prod").load()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigLoader {
    configuration_dir: Option<PathBuf>,
    profile: Option<String>,
}

impl ConfigLoader {
    /// Initialize a new [`ConfigLoader`] instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify the configuration profile manually, rather than loading it
    /// from the `SM_PROFILE` environment variable.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Specify the path to the directory where configuration files are stored.
    ///
    /// By default, configuration files are looked up under `configuration/`.
    pub fn configuration_dir<Dir>(mut self, dir: Dir) -> Self
    where
        Dir: Into<PathBuf>,
    {
        self.configuration_dir = Some(dir.into());
        self
    }

    /// Load the configuration by merging together three sources:
    ///
    /// 1. Environment variables (`SM_*`, with `__` separating nested keys,
    ///    e.g. `SM_REDIS__HOST`)
    /// 2. Profile-specific configuration file (`{configuration_dir}/{profile}.yml`), if a
    ///    profile was set
    /// 3. Base configuration file (`{configuration_dir}/base.yml`)
    ///
    /// The list above is ordered by precedence. Missing files are skipped.
    pub fn load<Config>(self) -> Result<Config, errors::ConfigLoadError>
    where
        Config: DeserializeOwned,
    {
        let profile = self
            .profile
            .or_else(|| std::env::var(PROFILE_ENV_VAR).ok());
        let configuration_dir = self
            .configuration_dir
            .unwrap_or_else(|| PathBuf::from("configuration"));
        let span = tracing::info_span!(
            "Loading configuration",
            configuration.directory = %configuration_dir.display(),
            configuration.profile = profile.as_deref(),
        );
        let _guard = span.enter();

        let mut figment = Figment::new().merge(Yaml::file(configuration_dir.join("base.yml")));
        if let Some(profile) = &profile {
            figment = figment.merge(Yaml::file(
                configuration_dir.join(format!("{profile}.yml")),
            ));
        }
        // `SM_PROFILE` selects the profile, it isn't a configuration value.
        let env_source = Env::prefixed(PREFIX).split("__").ignore(&["PROFILE"]);
        let configuration: Config = figment
            .merge(env_source)
            .extract()
            .context("Failed to load hierarchical configuration")
            .map_err(errors::ConfigLoadError)?;
        Ok(configuration)
    }
}

/// Errors that can occur when loading configuration.
pub mod errors {
    #[derive(Debug, thiserror::Error)]
    #[error("Failed to load configuration")]
    /// The error returned by [`ConfigLoader::load`](super::ConfigLoader::load).
    pub struct ConfigLoadError(#[source] pub(super) anyhow::Error);
}
