use thiserror::Error;

/// Failures surfaced by the validation, store and export layers.
///
/// Every variant maps onto a wire `code` and an HTTP-style `status` so the
/// IPC layer never has to guess how to report it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to load configuration: {0}")]
    Config(Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable wire code reported in `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "bad_params",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NoWorkspace => "no_workspace",
            Self::Store(_) => "db_error",
            Self::Io(_) | Self::Archive(_) => "io_error",
            Self::Json(_) | Self::Config(_) | Self::ConfigValidation(_) => "internal",
        }
    }

    /// HTTP-style status for bindings that speak status codes.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::Conflict(_) | Self::NoWorkspace => 400,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Store and I/O failures are the only ones whose detail is hidden
    /// outside diagnostic mode.
    pub fn is_internal(&self) -> bool {
        self.status() >= 500
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// True when the store rejected a write on a UNIQUE constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
