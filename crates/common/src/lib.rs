
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use types::Value;

/// Environment variable naming the project the harness targets.
pub const PROJECT_ENV: &str = "SPANNER_TEST_PROJECT";
/// Environment variable naming the instance the harness targets.
pub const INSTANCE_ENV: &str = "SPANNER_TEST_INSTANCE";
/// Environment variable naming the database the harness targets.
pub const DATABASE_ENV: &str = "SPANNER_TEST_DBID";
/// When set, the admin channel talks to this plaintext emulator endpoint.
pub const EMULATOR_HOST_ENV: &str = "SPANNER_EMULATOR_HOST";

pub const DEFAULT_PROJECT: &str = "test-project";
pub const DEFAULT_INSTANCE: &str = "test-instance";
pub const DEFAULT_DATABASE: &str = "gotest";
pub const PRODUCTION_ENDPOINT: &str = "spanner.googleapis.com:443";

/// Positional row representation backed by `types::Value`.
/// Examples:
/// - `let row = Row::new(vec![Value::Text("a1".into())]);`
/// - `let row = Row::new(vec![Value::Int(10), Value::Null]);`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Errors raised while resolving run configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid database id '{0}': expected projects/<p>/instances/<i>/databases/<d>")]
    InvalidDatabaseId(String),
}

/// Fully-qualified database name, also used as the data source name.
///
/// # Example
/// ```
/// use common::DatabaseId;
///
/// let id: DatabaseId = "projects/p/instances/i/databases/d".parse().unwrap();
/// assert_eq!(id.database, "d");
/// assert_eq!(id.to_string(), "projects/p/instances/i/databases/d");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseId {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabaseId {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

impl FromStr for DatabaseId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "instances", instance, "databases", database]
                if !project.is_empty() && !instance.is_empty() && !database.is_empty() =>
            {
                Ok(DatabaseId::new(*project, *instance, *database))
            }
            _ => Err(ConfigError::InvalidDatabaseId(s.to_string())),
        }
    }
}

/// Where schema administration requests are sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminEndpoint {
    /// Local emulator: plaintext and unauthenticated.
    Emulator { host: String },
    /// Production service: TLS with credentials.
    Production { host: String },
}

impl AdminEndpoint {
    pub fn host(&self) -> &str {
        match self {
            AdminEndpoint::Emulator { host } | AdminEndpoint::Production { host } => host,
        }
    }

    pub fn uses_tls(&self) -> bool {
        matches!(self, AdminEndpoint::Production { .. })
    }

    pub fn requires_credentials(&self) -> bool {
        matches!(self, AdminEndpoint::Production { .. })
    }
}

impl fmt::Display for AdminEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminEndpoint::Emulator { host } => write!(f, "{host} (emulator, insecure)"),
            AdminEndpoint::Production { host } => write!(f, "{host} (tls, authenticated)"),
        }
    }
}

/// Run-wide target configuration, passed explicitly to every collaborator.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .project("my-project")
///     .database("scratch")
///     .build();
/// assert_eq!(config.instance, "test-instance");
/// assert_eq!(
///     config.database_id().to_string(),
///     "projects/my-project/instances/test-instance/databases/scratch"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Project identifier.
    #[builder(into, default = DEFAULT_PROJECT.to_string())]
    pub project: String,
    /// Instance identifier.
    #[builder(into, default = DEFAULT_INSTANCE.to_string())]
    pub instance: String,
    /// Database identifier.
    #[builder(into, default = DEFAULT_DATABASE.to_string())]
    pub database: String,
    /// Emulator endpoint override for the admin channel.
    pub emulator_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            instance: DEFAULT_INSTANCE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            emulator_host: None,
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Self {
            project: lookup(PROJECT_ENV).unwrap_or(defaults.project),
            instance: lookup(INSTANCE_ENV).unwrap_or(defaults.instance),
            database: lookup(DATABASE_ENV).unwrap_or(defaults.database),
            emulator_host: lookup(EMULATOR_HOST_ENV),
        }
    }

    pub fn database_id(&self) -> DatabaseId {
        DatabaseId::new(&self.project, &self.instance, &self.database)
    }

    /// Data source name consumed by `Connector::open`.
    pub fn dsn(&self) -> String {
        self.database_id().to_string()
    }

    pub fn admin_endpoint(&self) -> AdminEndpoint {
        match &self.emulator_host {
            Some(host) => AdminEndpoint::Emulator { host: host.clone() },
            None => AdminEndpoint::Production {
                host: PRODUCTION_ENDPOINT.to_string(),
            },
        }
    }
}
