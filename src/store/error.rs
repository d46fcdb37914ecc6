use thiserror::Error;

/// Errors returned by [`super::KubeStore`] implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Conflict(String),

    /// Any other status returned by the API server
    #[error("{message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error(transparent)]
    Kube(kube::Error),

    #[error("failed to (de)serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                StoreError::NotFound(api_err.message.clone())
            }
            kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
                StoreError::AlreadyExists(api_err.message.clone())
            }
            kube::Error::Api(api_err) if api_err.code == 409 => {
                StoreError::Conflict(api_err.message.clone())
            }
            kube::Error::Api(api_err) => StoreError::Api {
                code: api_err.code,
                reason: api_err.reason.clone(),
                message: api_err.message.clone(),
            },
            other => StoreError::Kube(other),
        }
    }
}
