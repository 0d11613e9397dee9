use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "ready_or_not";

/// Where the CouchDB database lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    /// Server URL, e.g. `http://couch:5984`.
    pub base_url: String,
    /// Database name.
    pub database: String,
    /// Basic-auth user and password.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Anonymous access to `database` on `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional basic-auth pair
    /// `COUCH_USERNAME` / `COUCH_PASSWORD`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = lookup("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = lookup("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        Ok(Self {
            credentials: lookup("COUCH_USERNAME").zip(lookup("COUCH_PASSWORD")),
            ..Self::new(base_url, database)
        })
    }

    /// URL of the database itself, without trailing slash.
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.database)
    }
}
