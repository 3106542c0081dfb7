//! Error taxonomy shared by every Strata crate
//!
//! Each variant names a failure class rather than the subsystem that raised it,
//! so a binary read error looks the same whether it surfaced while merging a
//! directory or while a loader was decoding a payload.

use thiserror::Error;

/// Engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Container has a bad magic, version, or checksum
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Data ended before a complete record could be read
    #[error("Truncated data in {context}: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        context: String,
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Path, URL, object, or composer does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value or resource kind disagrees with what was requested
    #[error("Type mismatch for {subject}: expected {expected}, found {found}")]
    TypeMismatch {
        subject: String,
        expected: String,
        found: String,
    },

    /// Property type is not registered
    #[error("Unknown property type: {0}")]
    UnknownPropertyType(String),

    /// Name already registered
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Registration attempted after the registry was locked
    #[error("Registry is locked, cannot register '{0}'")]
    RegistryLocked(String),

    /// Operation would introduce a cycle
    #[error("Cycle detected: {0}")]
    Cycle(String),

    /// A transitive dependency failed to load
    #[error("Failed to load dependency '{dependency}' of '{resource}': {source}")]
    DependencyLoad {
        resource: String,
        dependency: String,
        #[source]
        source: Box<Error>,
    },

    /// Render target could not be bound during a frame
    #[error("Failed to bind render target '{target}': {reason}")]
    RenderTargetBind { target: String, reason: String },

    /// Resource validator refused the path
    #[error("Resource rejected by validator: {0}")]
    Rejected(String),

    /// Resource URL could not be parsed
    #[error("Invalid resource URL: {0}")]
    InvalidUrl(String),

    /// Payload bytes could not be decoded
    #[error("Invalid data in {context}: {reason}")]
    InvalidData { context: String, reason: String },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a type mismatch
    pub fn type_mismatch(
        subject: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            subject: subject.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Shorthand for a decode failure
    pub fn invalid_data(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidData {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts only the current frame
    pub fn is_frame_scoped(&self) -> bool {
        matches!(self, Self::RenderTargetBind { .. })
    }

    /// Walk `DependencyLoad` chains down to the first non-dependency error
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Self::DependencyLoad { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Result type for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::NotFound("kzb://project/missing".into());
        assert_eq!(err.to_string(), "Not found: kzb://project/missing");

        let err = Error::type_mismatch("Node.Opacity", "Float", "Bool");
        assert!(err.to_string().contains("expected Float"));
    }

    #[test]
    fn test_root_cause() {
        let inner = Error::NotFound("shaders/basic".into());
        let mid = Error::DependencyLoad {
            resource: "materials/b".into(),
            dependency: "shaders/basic".into(),
            source: Box::new(inner),
        };
        let outer = Error::DependencyLoad {
            resource: "meshes/a".into(),
            dependency: "materials/b".into(),
            source: Box::new(mid),
        };

        assert!(matches!(outer.root_cause(), Error::NotFound(path) if path == "shaders/basic"));
    }

    #[test]
    fn test_io_conversion() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
