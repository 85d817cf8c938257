use crate::{
    config::ConfigError,
    db::{
        search::{QueryParseError, SearchError},
        store::StoreError,
    },
    model::MappingError,
    types::Pid,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every fallible repodb operation returns this type; leaf errors from the
/// storage client, search client, and model layer are folded into it.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Storage reported absence where presence was required.
    pub fn object_not_found(pid: &Pid) -> Self {
        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("unable to find '{pid}' in the repository"),
            detail: Some(ErrorDetail::Store(StoreError::NotFound { pid: pid.clone() })),
        }
    }

    /// Reload (or any identity-oriented access) of an entity that was never saved.
    pub(crate) fn never_persisted(operation: &str, entity: &str) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Entity,
            format!("can't {operation} {entity}: it hasn't been saved"),
        )
    }

    /// A typed association received a record of an incompatible class.
    pub(crate) fn association_type_mismatch(
        reflection: &str,
        expected: &str,
        found: &str,
    ) -> Self {
        Self::new(
            ErrorClass::TypeMismatch,
            ErrorOrigin::Association,
            format!("association '{reflection}' expected {expected}, got {found}"),
        )
    }

    /// A stored object's class isn't the requested class or a subclass.
    pub(crate) fn class_mismatch(pid: &Pid, expected: &str, found: &str) -> Self {
        Self::new(
            ErrorClass::TypeMismatch,
            ErrorOrigin::Persistence,
            format!("'{pid}' is a {found}, not a {expected}"),
        )
    }

    /// An operation required a persisted owner.
    pub(crate) fn record_not_saved(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotSaved, ErrorOrigin::Persistence, message)
    }

    pub(crate) fn entity_frozen(entity: &str) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Entity,
            format!("can't modify frozen {entity}"),
        )
    }

    pub(crate) fn entity_destroyed(entity: &str) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Entity,
            format!("can't modify destroyed {entity}"),
        )
    }

    pub(crate) fn association_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Association,
            message,
        )
    }

    pub(crate) fn persistence_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Persistence,
            message,
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self.class, ErrorClass::TypeMismatch)
    }

    #[must_use]
    pub const fn is_not_saved(&self) -> bool {
        matches!(self.class, ErrorClass::NotSaved)
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),

    #[error("{0}")]
    Search(SearchError),

    #[error("{0}")]
    Mapping(MappingError),

    #[error("{0}")]
    Config(ConfigError),
}

impl From<StoreError> for InternalError {
    fn from(err: StoreError) -> Self {
        let class = match err {
            StoreError::NotFound { .. } => ErrorClass::NotFound,
            StoreError::MintFailed { .. } => ErrorClass::NotSaved,
            StoreError::Unavailable { .. } => ErrorClass::Backend,
        };

        Self {
            class,
            origin: ErrorOrigin::Store,
            message: err.to_string(),
            detail: Some(ErrorDetail::Store(err)),
        }
    }
}

impl From<SearchError> for InternalError {
    fn from(err: SearchError) -> Self {
        let class = match err {
            SearchError::Parse(_) | SearchError::InvalidDocument { .. } => {
                ErrorClass::InvariantViolation
            }
            SearchError::Unavailable { .. } => ErrorClass::Backend,
        };

        Self {
            class,
            origin: ErrorOrigin::Search,
            message: err.to_string(),
            detail: Some(ErrorDetail::Search(err)),
        }
    }
}

impl From<QueryParseError> for InternalError {
    fn from(err: QueryParseError) -> Self {
        SearchError::Parse(err).into()
    }
}

impl From<MappingError> for InternalError {
    fn from(err: MappingError) -> Self {
        Self {
            class: ErrorClass::Configuration,
            origin: ErrorOrigin::Model,
            message: err.to_string(),
            detail: Some(ErrorDetail::Mapping(err)),
        }
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self {
            class: ErrorClass::Configuration,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    TypeMismatch,
    NotSaved,
    Configuration,
    Unsupported,
    Backend,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::TypeMismatch => "type_mismatch",
            Self::NotSaved => "not_saved",
            Self::Configuration => "configuration",
            Self::Unsupported => "unsupported",
            Self::Backend => "backend",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Store,
    Search,
    Entity,
    Association,
    Persistence,
    Model,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Store => "store",
            Self::Search => "search",
            Self::Entity => "entity",
            Self::Association => "association",
            Self::Persistence => "persistence",
            Self::Model => "model",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
