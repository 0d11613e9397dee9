use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures of the CouchDB adapter.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The request never got a response.
    #[error("CouchDB request to `{path}` failed")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{path}`")]
    Status { path: String, status: StatusCode },
    /// The document `_rev` moved between read and write.
    #[error("CouchDB revision conflict on `{path}`")]
    Conflict { path: String },
    #[error("CouchDB returned an unreadable body for `{path}`")]
    Body {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB document `{path}` does not match the game schema")]
    Document {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
