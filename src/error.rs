use kube::core::ErrorResponse;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {kind} {name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Resource already exists: {kind} {name} in namespace {namespace}")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Method not allowed: {verb} is not supported for {kind}")]
    MethodNotAllowed { verb: String, kind: String },

    #[error("Resource type not found: {kind} in {api_version}")]
    ResourceNotFound { kind: String, api_version: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON patch error: {0}")]
    PatchError(#[from] json_patch::PatchError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn not_found(kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.unwrap_or("").to_string(),
        }
    }

    /// True for both duplicate creates and stale replaces.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status code the real API server would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::ResourceNotFound { .. } => 404,
            Self::AlreadyExists { .. } | Self::Conflict(_) => 409,
            Self::MethodNotAllowed { .. } => 405,
            Self::InvalidRequest(_)
            | Self::SerializationError(_)
            | Self::YamlError(_)
            | Self::PatchError(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::ResourceNotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::Conflict(_) => "Conflict",
            Self::MethodNotAllowed { .. } => "MethodNotAllowed",
            Self::InvalidRequest(_) | Self::PatchError(_) => "Invalid",
            Self::SerializationError(_) | Self::YamlError(_) => "BadRequest",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Convert into the error kube-rs clients see for the same API failure.
    pub fn into_kube_err(self) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: self.to_string(),
            reason: self.reason().to_string(),
            code: self.status_code(),
        })
    }
}

impl From<Error> for kube::Error {
    fn from(err: Error) -> Self {
        err.into_kube_err()
    }
}
