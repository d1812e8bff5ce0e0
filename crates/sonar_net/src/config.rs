//! Connection configuration.

/// Default presence server address.
pub const DEFAULT_SERVER_ADDRESS: &str = "nats://localhost:4222";

/// Default hub path on the presence server.
pub const DEFAULT_HUB_PATH: &str = "/rpUtilsHub";

/// Protocol version this client speaks. The server pushes `UpdateClient`
/// when it no longer accepts it.
pub const API_VERSION: &str = "0.0.2";

/// Where and how to connect. Immutable for the duration of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server address, e.g. `nats://rputils.example:4222`.
    pub server_address: String,
    /// Hub path appended to the address, e.g. `/rpUtilsHub`.
    pub hub_path: String,
    /// Client api version sent with every call.
    pub api_version: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            hub_path: DEFAULT_HUB_PATH.to_string(),
            api_version: API_VERSION.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Create a config for the given server with the default hub and version.
    #[must_use]
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            ..Self::default()
        }
    }

    /// Override the hub path.
    #[must_use]
    pub fn with_hub_path(mut self, hub_path: impl Into<String>) -> Self {
        self.hub_path = hub_path.into();
        self
    }

    /// Override the api version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The full connection URL: `{server_address}{hub_path}?version={api_version}`.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}{}?version={}",
            self.server_address, self.hub_path, self.api_version
        )
    }

    /// The subject prefix derived from the hub path.
    ///
    /// `/rpUtilsHub` becomes `rpUtilsHub`; nested paths such as
    /// `/api/rpUtilsHub` become `api.rpUtilsHub`.
    #[must_use]
    pub fn subject_prefix(&self) -> String {
        self.hub_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}
