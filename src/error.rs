use crate::response::Res;

/// Malformed route pattern.
///
/// ルールのコンパイル時に発生するエラー。登録時に検出されるので、
/// アプリケーションは起動を中止するべき。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Opening and closing optionals are not matching, check your rule {0}")]
    UnbalancedOptionals(String),
    #[error("Parameters are not properly defined, check your rule {0}")]
    UnbalancedBraces(String),
    #[error("Rule {rule} contains malformed parameter {token}")]
    MalformedParameter { rule: String, token: String },
    #[error("Rule {rule} uses unknown constraint {constraint}, expected one of: any, numeric, alpha, alphanum")]
    UnknownConstraint { rule: String, constraint: String },
    #[error("Rule {rule} declares parameter {name} more than once")]
    DuplicateParameter { rule: String, name: String },
    #[error("Rule {rule} could not be compiled: {source}")]
    Regex {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Path handed to the router was not normalized.
///
/// ディスパッチャのバグを示す。404 とは別物。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Path must start with /: {0}")]
    MissingLeadingSlash(String),
    #[error("Path cannot end with /: {0}")]
    TrailingSlash(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Path(#[from] PathError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Could not resolve service {0}")]
    Unresolved(String),
    #[error("Service {name} is not of the requested type {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("Service {0} depends on itself")]
    Cycle(String),
    #[error("Factory for service {name} failed: {message}")]
    Factory { name: String, message: String },
}

/// A request body field that failed its rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

/// Application setup failure.
#[derive(Debug, thiserror::Error)]
pub enum BoltError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("Route {rule} requires {source}")]
    Dependency {
        rule: String,
        #[source]
        source: ServiceError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found")]
    NotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Status: {0}, Message: {1}")]
    CUSTOM(u16, String),
}

impl HttpError {
    #[inline]
    pub fn code(&self) -> u16 {
        match self {
            HttpError::BadRequest(_) => 400,
            HttpError::NotFound => 404,
            HttpError::MethodNotAllowed => 405,
            HttpError::InternalServerError(_) => 500,
            HttpError::ServiceUnavailable(_) => 503,
            HttpError::CUSTOM(status, _) => *status,
        }
    }

    pub fn err_res(&self) -> Res {
        let mut res = Res::new();
        res.set_status(self.code());
        match self {
            HttpError::CUSTOM(_, message) => res.text(message),
            other => res.text(&other.to_string()),
        };
        res
    }
}

impl From<ServiceError> for HttpError {
    fn from(e: ServiceError) -> Self {
        HttpError::InternalServerError(e.to_string())
    }
}

impl From<RoutingError> for HttpError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::Path(e) => HttpError::BadRequest(e.to_string()),
            RoutingError::Pattern(e) => HttpError::InternalServerError(e.to_string()),
        }
    }
}
