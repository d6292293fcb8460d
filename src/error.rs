/// Error type returned by this crate.
///
/// Every failed call yields exactly one of these. Branch on the variant and
/// the predicates below rather than on message text.
#[derive(Debug, thiserror::Error)]
pub enum ManapoolError {
    /// The API answered with a non-success status code.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A local precondition failed, or a successful response did not have
    /// the expected shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport failure or cancellation.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ManapoolError {
    /// Returns the API error payload, if this is an API error.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status code of an API error.
    pub fn status(&self) -> Option<u16> {
        self.as_api().map(|err| err.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_not_found)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_unauthorized)
    }

    pub fn is_forbidden(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_forbidden)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_rate_limited)
    }

    pub fn is_server_error(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_server_error)
    }

    /// Returns `true` if the call was abandoned because its cancellation
    /// token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Network(err) if err.is_cancelled())
    }

    /// Returns `true` if another attempt of the same request could succeed.
    ///
    /// Mirrors the executor's own retry decision: transport failures, 429 and
    /// 5xx are retryable, cancellation and everything else are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_rate_limited() || err.is_server_error(),
            Self::Network(err) => {
                !err.is_cancelled() && !err.transport_error().is_some_and(reqwest::Error::is_builder)
            }
            Self::Validation(_) => false,
        }
    }
}

/// Non-success response from the Manapool API.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("manapool API error (status {status}{}): {message}", request_suffix(.request_id))]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Message extracted from the response body, or a generic description.
    pub message: String,
    /// Request identifier reported by the API, if any.
    pub request_id: Option<String>,
    /// Raw response body.
    pub body: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            request_id: None,
            body: String::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

fn request_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(", request {id}"))
        .unwrap_or_default()
}

/// Local input validation or response-shape failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("validation error for field '{field}': {message}")]
pub struct ValidationError {
    /// Offending field name (`"response"` for undecodable bodies).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Connection, timeout or cancellation failure.
#[derive(Debug, thiserror::Error)]
#[error("network error: {message}{}", cause_suffix(.cause))]
pub struct NetworkError {
    pub message: String,
    #[source]
    pub cause: Option<NetworkCause>,
}

fn cause_suffix(cause: &Option<NetworkCause>) -> String {
    cause
        .as_ref()
        .map(|cause| format!(": {cause}"))
        .unwrap_or_default()
}

/// Underlying cause of a [`NetworkError`].
#[derive(Debug, thiserror::Error)]
pub enum NetworkCause {
    /// Error from the `reqwest` transport.
    #[error(transparent)]
    Transport(reqwest::Error),
    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl NetworkError {
    pub fn new(message: impl Into<String>, cause: Option<NetworkCause>) -> Self {
        Self {
            message: message.into(),
            cause,
        }
    }

    pub(crate) fn transport(message: impl Into<String>, err: reqwest::Error) -> Self {
        Self::new(message, Some(NetworkCause::Transport(err)))
    }

    pub(crate) fn cancelled(message: impl Into<String>) -> Self {
        Self::new(message, Some(NetworkCause::Cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, Some(NetworkCause::Cancelled))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&self.cause, Some(NetworkCause::Transport(err)) if err.is_timeout())
    }

    /// The `reqwest` error behind this failure, if any.
    pub fn transport_error(&self) -> Option<&reqwest::Error> {
        match &self.cause {
            Some(NetworkCause::Transport(err)) => Some(err),
            _ => None,
        }
    }
}
