use crate::core::{DbError, Result};
use std::time::Duration;

const URL_SCHEME: &str = "batchwrite://";

/// Connection configuration
///
/// Identifies the target database and sizes the session pool.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub project: String,

    pub instance: String,

    pub database: String,

    /// How long `acquire_session` may wait for a free session
    pub acquire_timeout: Duration,

    /// Deadline for each batch stream, measured from stream open
    pub call_timeout: Option<Duration>,

    /// Maximum number of sessions in pool
    pub max_sessions: usize,

    /// Sessions created up front
    pub min_sessions: usize,

    /// Idle sessions older than this are discarded
    pub idle_timeout: Option<Duration>,

    /// Maximum session lifetime
    pub max_lifetime: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(project: &str, instance: &str, database: &str) -> Self {
        Self {
            project: project.to_string(),
            instance: instance.to_string(),
            database: database.to_string(),
            acquire_timeout: Duration::from_secs(30),
            call_timeout: None,
            max_sessions: 10,
            min_sessions: 1,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(3600)), // 1 hour
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn min_sessions(mut self, min: usize) -> Self {
        self.min_sessions = min;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Fully qualified database path
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }

    /// Parse from connection string
    ///
    /// Format: `batchwrite://project/instance/database`
    ///
    /// # Examples
    ///
    /// ```
    /// # use batchwrite::ConnectionConfig;
    /// let config = ConnectionConfig::from_url("batchwrite://acme/prod/orders").unwrap();
    /// assert_eq!(config.database_path(), "projects/acme/instances/prod/databases/orders");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| DbError::Config(format!("URL must start with '{}'", URL_SCHEME)))?;

        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        match parts.as_slice() {
            [project, instance, database]
                if !project.is_empty() && !instance.is_empty() && !database.is_empty() =>
            {
                Ok(Self::new(project, instance, database))
            }
            _ => Err(DbError::Config(
                "URL must have the form batchwrite://project/instance/database".to_string(),
            )),
        }
    }

    pub fn to_url(&self) -> String {
        format!(
            "{}{}/{}/{}",
            URL_SCHEME, self.project, self.instance, self.database
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.is_empty() || self.instance.is_empty() || self.database.is_empty() {
            return Err(DbError::Config(
                "project, instance and database must be set".to_string(),
            ));
        }

        if self.max_sessions == 0 {
            return Err(DbError::Config("max_sessions must be > 0".to_string()));
        }

        if self.min_sessions > self.max_sessions {
            return Err(DbError::Config(
                "min_sessions cannot exceed max_sessions".to_string(),
            ));
        }

        Ok(())
    }
}
