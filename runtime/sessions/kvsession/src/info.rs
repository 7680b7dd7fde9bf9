#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
/// A fingerprint of the client that first saved a session.
///
/// It is recorded once per session identifier and never updated afterwards,
/// even if the client roams to a different address.
///
/// Parsing the `User-Agent` header is left to the host application:
/// fill in whatever it can detect.
pub struct ClientInfo {
    /// The remote address of the client.
    #[serde(default)]
    pub ip: Option<String>,
    /// The client platform (e.g. `linux`, `iphone`).
    #[serde(default)]
    pub platform: Option<String>,
    /// The client browser (e.g. `firefox`).
    #[serde(default)]
    pub browser: Option<String>,
    /// The browser version.
    #[serde(default)]
    pub version: Option<String>,
    /// The preferred language advertised by the client.
    #[serde(default)]
    pub language: Option<String>,
}

impl ClientInfo {
    /// An empty fingerprint.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}
