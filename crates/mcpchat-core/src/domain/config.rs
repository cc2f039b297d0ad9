//! Endpoint and connection configuration
//!
//! The config file follows the standard MCP layout used by VS Code, Cursor and
//! Claude Desktop: transport fields (`command`/`args`/`env` or `url`/`headers`)
//! sit at the top level of each `mcpServers` entry. A `settings` block carries
//! the global tuning values.
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "docs": { "command": "npx", "args": ["-y", "@acme/docs-server"] },
//!     "search": { "url": "https://search.example.com/mcp", "requiresAuth": true }
//!   },
//!   "settings": { "maxReconnectAttempts": "unbounded" }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How to reach an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportSpec {
    /// Local child process speaking over stdin/stdout
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Remote Streamable HTTP endpoint
    Http {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl TransportSpec {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Http { .. } => "http",
        }
    }

    /// Short description for logging (never includes env or header values)
    pub fn description(&self) -> String {
        match self {
            Self::Stdio { command, .. } => format!("stdio:{}", command),
            Self::Http { url, .. } => format!("http:{}", url),
        }
    }
}

/// Immutable descriptor of one endpoint, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    /// Unique key
    pub name: String,
    pub transport: TransportSpec,
    #[serde(default)]
    pub requires_auth: bool,
}

impl EndpointConfig {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportSpec::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
            requires_auth: false,
        }
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportSpec::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
            requires_auth: false,
        }
    }

    /// Add an environment variable (stdio only, ignored for HTTP)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportSpec::Stdio { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Add a request header (HTTP only, ignored for stdio)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportSpec::Http { headers, .. } = &mut self.transport {
            headers.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_auth_required(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Validate name and transport descriptor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyEndpointName);
        }

        let invalid = |reason: String| ConfigError::InvalidTransport {
            endpoint: self.name.clone(),
            reason,
        };

        match &self.transport {
            TransportSpec::Stdio { command, .. } => {
                if command.trim().is_empty() {
                    return Err(invalid("command must not be empty".to_string()));
                }
            }
            TransportSpec::Http { url, .. } => {
                let parsed =
                    url::Url::parse(url).map_err(|e| invalid(format!("invalid URL: {}", e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(invalid(format!(
                        "unsupported URL scheme '{}'",
                        parsed.scheme()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Normalize an endpoint name: lowercase alphanumerics, `-` and `.` only
///
/// Two config entries that normalize to the same name are duplicates.
pub fn normalize_endpoint_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == '-' || c == '.' {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// Upper bound on automatic reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaxAttemptsRepr", into = "MaxAttemptsRepr")]
pub enum MaxAttempts {
    Bounded(u32),
    /// Retry forever at the capped delay
    Unbounded,
}

impl MaxAttempts {
    /// Whether `attempt` (1-based count of failures) is past the limit
    pub fn exceeded_by(&self, attempt: u32) -> bool {
        match self {
            Self::Bounded(max) => attempt > *max,
            Self::Unbounded => false,
        }
    }

    pub fn as_option(&self) -> Option<u32> {
        match self {
            Self::Bounded(max) => Some(*max),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for MaxAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{}", max),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Wire form: a number or the word "unbounded"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MaxAttemptsRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<MaxAttemptsRepr> for MaxAttempts {
    type Error = String;

    fn try_from(repr: MaxAttemptsRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxAttemptsRepr::Count(n) => Ok(Self::Bounded(n)),
            MaxAttemptsRepr::Word(w) if w.eq_ignore_ascii_case("unbounded") => Ok(Self::Unbounded),
            MaxAttemptsRepr::Word(w) => Err(format!(
                "expected a number or \"unbounded\", got \"{}\"",
                w
            )),
        }
    }
}

impl From<MaxAttempts> for MaxAttemptsRepr {
    fn from(value: MaxAttempts) -> Self {
        match value {
            MaxAttempts::Bounded(n) => Self::Count(n),
            MaxAttempts::Unbounded => Self::Word("unbounded".to_string()),
        }
    }
}

/// Default health-check interval
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Default liveness probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default transport connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default first reconnect delay
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default reconnect delay cap
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);
/// Default jitter ratio applied to reconnect delays
pub const DEFAULT_RECONNECT_JITTER: f64 = 0.2;
/// Default artifact refresh interval
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Default timeout for a single list call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for a whole artifact fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Default retries for a failed list call
pub const DEFAULT_CALL_RETRIES: u32 = 2;

/// Global tuning values shared by every endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub health_check_interval: Duration,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Jitter ratio in `[0.0, 1.0)`, applied as ±ratio of the delay
    pub reconnect_jitter: f64,
    pub max_reconnect_attempts: MaxAttempts,
    pub artifact_refresh_interval: Duration,
    pub call_timeout: Duration,
    pub fetch_timeout: Duration,
    pub call_retries: u32,
}

impl ConnectionSettings {
    /// Defaults for everything except the attempt limit, which has no default
    pub fn new(max_reconnect_attempts: MaxAttempts) -> Self {
        Self {
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
            max_reconnect_attempts,
            artifact_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            call_retries: DEFAULT_CALL_RETRIES,
        }
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub fn with_reconnect_jitter(mut self, ratio: f64) -> Self {
        self.reconnect_jitter = ratio;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.artifact_refresh_interval = interval;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_call_retries(mut self, retries: u32) -> Self {
        self.call_retries = retries;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("healthCheckIntervalMs", self.health_check_interval),
            ("probeTimeoutMs", self.probe_timeout),
            ("connectTimeoutMs", self.connect_timeout),
            ("reconnectBaseDelayMs", self.reconnect_base_delay),
            ("artifactRefreshIntervalMs", self.artifact_refresh_interval),
            ("callTimeoutMs", self.call_timeout),
            ("fetchTimeoutMs", self.fetch_timeout),
        ];
        for (field, value) in non_zero {
            if value.is_zero() {
                return Err(ConfigError::InvalidSetting {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.reconnect_max_delay < self.reconnect_base_delay {
            return Err(ConfigError::InvalidSetting {
                field: "reconnectMaxDelayMs",
                reason: format!(
                    "{:?} is smaller than the base delay {:?}",
                    self.reconnect_max_delay, self.reconnect_base_delay
                ),
            });
        }

        if !(0.0..1.0).contains(&self.reconnect_jitter) {
            return Err(ConfigError::InvalidSetting {
                field: "reconnectJitter",
                reason: format!("{} is outside [0.0, 1.0)", self.reconnect_jitter),
            });
        }

        Ok(())
    }
}

/// Fully loaded client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub settings: ConnectionSettings,
}

impl ChatConfig {
    pub fn new(endpoints: Vec<EndpointConfig>, settings: ConnectionSettings) -> Self {
        Self {
            endpoints,
            settings,
        }
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let config = file.into_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validate settings, every endpoint, and name uniqueness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        validate_endpoints(&self.endpoints)
    }
}

/// Validate endpoints and reject names that collide after normalization
pub fn validate_endpoints(endpoints: &[EndpointConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for endpoint in endpoints {
        endpoint.validate()?;
        if !seen.insert(normalize_endpoint_name(&endpoint.name)) {
            return Err(ConfigError::DuplicateEndpoint(endpoint.name.clone()));
        }
    }
    Ok(())
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "mcpServers", deserialize_with = "entries_in_order")]
    servers: Vec<(String, ServerEntry)>,
    settings: SettingsFile,
}

/// A single `mcpServers` entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerEntry {
    // --- Stdio Transport (command-based) ---
    command: Option<String>,
    args: Option<Vec<String>>,
    env: Option<HashMap<String, String>>,

    // --- HTTP Transport (URL-based) ---
    url: Option<String>,
    headers: Option<HashMap<String, String>>,

    #[serde(default)]
    requires_auth: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    health_check_interval_ms: Option<u64>,
    probe_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
    reconnect_jitter: Option<f64>,
    max_reconnect_attempts: MaxAttempts,
    artifact_refresh_interval_ms: Option<u64>,
    call_timeout_ms: Option<u64>,
    fetch_timeout_ms: Option<u64>,
    call_retries: Option<u32>,
}

impl ConfigFile {
    fn into_config(self) -> Result<ChatConfig, ConfigError> {
        let endpoints = self
            .servers
            .into_iter()
            .map(|(name, entry)| entry.into_endpoint(&name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChatConfig::new(endpoints, self.settings.into_settings()))
    }
}

impl ServerEntry {
    fn into_endpoint(self, raw_name: &str) -> Result<EndpointConfig, ConfigError> {
        let name = normalize_endpoint_name(raw_name);
        let invalid = |reason: &str| ConfigError::InvalidTransport {
            endpoint: raw_name.to_string(),
            reason: reason.to_string(),
        };

        let transport = match (self.command, self.url) {
            (Some(_), Some(_)) => return Err(invalid("both 'command' and 'url' are set")),
            (None, None) => return Err(invalid("one of 'command' or 'url' is required")),
            (Some(command), None) => {
                let (command, args) = split_command(&command, self.args.unwrap_or_default())
                    .map_err(|reason| invalid(&reason))?;
                TransportSpec::Stdio {
                    command,
                    args,
                    env: self.env.unwrap_or_default(),
                }
            }
            (None, Some(url)) => TransportSpec::Http {
                url,
                headers: self.headers.unwrap_or_default(),
            },
        };

        Ok(EndpointConfig {
            name,
            transport,
            requires_auth: self.requires_auth,
        })
    }
}

impl SettingsFile {
    fn into_settings(self) -> ConnectionSettings {
        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        ConnectionSettings {
            health_check_interval: ms(self.health_check_interval_ms, DEFAULT_HEALTH_CHECK_INTERVAL),
            probe_timeout: ms(self.probe_timeout_ms, DEFAULT_PROBE_TIMEOUT),
            connect_timeout: ms(self.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT),
            reconnect_base_delay: ms(self.reconnect_base_delay_ms, DEFAULT_RECONNECT_BASE_DELAY),
            reconnect_max_delay: ms(self.reconnect_max_delay_ms, DEFAULT_RECONNECT_MAX_DELAY),
            reconnect_jitter: self.reconnect_jitter.unwrap_or(DEFAULT_RECONNECT_JITTER),
            max_reconnect_attempts: self.max_reconnect_attempts,
            artifact_refresh_interval: ms(
                self.artifact_refresh_interval_ms,
                DEFAULT_REFRESH_INTERVAL,
            ),
            call_timeout: ms(self.call_timeout_ms, DEFAULT_CALL_TIMEOUT),
            fetch_timeout: ms(self.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT),
            call_retries: self.call_retries.unwrap_or(DEFAULT_CALL_RETRIES),
        }
    }
}

/// Split a command that may carry embedded arguments
///
/// - "npx -y @some/server" → ("npx", ["-y", "@some/server"])
/// - "node" with args ["server.js"] → ("node", ["server.js"])
fn split_command(command: &str, args: Vec<String>) -> Result<(String, Vec<String>), String> {
    if !args.is_empty() || !command.contains(' ') {
        return Ok((command.to_string(), args));
    }

    let mut parts = shell_words::split(command)
        .map_err(|e| format!("failed to parse command string: {}", e))?;
    if parts.is_empty() {
        return Err("empty command after parsing".to_string());
    }
    let executable = parts.remove(0);
    Ok((executable, parts))
}

/// Keep `mcpServers` entries in file order, duplicates included
fn entries_in_order<'de, D>(deserializer: D) -> Result<Vec<(String, ServerEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, ServerEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of endpoint name to endpoint entry")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, entry)) = map.next_entry::<String, ServerEntry>()? {
                entries.push((name, entry));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}
