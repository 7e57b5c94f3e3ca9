use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Msg(String),

    #[error("unsupported target platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("network failure fetching {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("checksum mismatch for {file} (got {got}, want {want})")]
    ChecksumMismatch {
        file: String,
        got: String,
        want: String,
    },

    #[error("extraction of {archive} failed ({command}): {detail}")]
    ExtractionFailure {
        archive: PathBuf,
        command: String,
        detail: String,
    },

    #[error("cannot read version of {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error(
        "'{}' is currently locked by another process. Close the application holding it \
         (e.g. a running editor) before installing a new PRT package.",
        path.display()
    )]
    FileLocked { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Net(#[from] reqwest::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ProvisionError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ProvisionError::ParseError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        ProvisionError::NetworkFailure {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures a retry may cure (transport hiccups, truncated bodies).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProvisionError::NetworkFailure { .. } | ProvisionError::Net(_)
        )
    }
}

impl From<anyhow::Error> for ProvisionError {
    fn from(e: anyhow::Error) -> Self {
        // Context chains built around reqwest errors are still network failures.
        if let Some(re) = e.downcast_ref::<reqwest::Error>() {
            let url = re.url().map(|u| u.to_string()).unwrap_or_default();
            return ProvisionError::NetworkFailure {
                url,
                reason: format!("{e:#}"),
            };
        }
        ProvisionError::Msg(format!("{e:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
