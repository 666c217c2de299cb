use std::path::PathBuf;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised by the parsing pipeline.
///
/// Configuration errors are raised during setup, before any scanning begins.
/// Scanning and validation errors abort the run; no partial document is ever
/// produced.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    /// A source construct outside the supported model variants (unions,
    /// trait definitions, macros) was used where a model was required.
    UnsupportedOrigin(String),
    /// A referenced type could not be found in the type universe. Names the
    /// referencing member and the missing type.
    UnresolvedType { referrer: String, missing: String },
    /// The textual form of a signature could not be parsed back.
    SignatureSyntax { input: String, message: String },
    /// A plugin with the same name was registered twice.
    DuplicatePlugin(String),
    /// A plugin declared "must run after" a plugin that does not precede it
    /// in the sorted sequence (or is absent entirely).
    PluginOrdering { plugin: String, dependency: String },
    /// Two exact replacements were registered for the same canonical key.
    ConflictingMapping(String),
    /// A nullability matcher was configured with an unusable pattern.
    InvalidMatcher(String),
    /// A validation plugin rejected a node. Carries the full ancestor chain
    /// from the document root for diagnosability.
    Validation { message: String, chain: Vec<String> },
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "parse error in {}: {}", file.display(), message)
            }
            Error::UnsupportedOrigin(what) => {
                write!(f, "unsupported source construct: {}", what)
            }
            Error::UnresolvedType { referrer, missing } => {
                write!(f, "unresolved type `{}` referenced by `{}`", missing, referrer)
            }
            Error::SignatureSyntax { input, message } => {
                write!(f, "malformed signature text `{}`: {}", input, message)
            }
            Error::DuplicatePlugin(name) => {
                write!(f, "plugin `{}` registered more than once", name)
            }
            Error::PluginOrdering { plugin, dependency } => {
                write!(
                    f,
                    "plugin `{}` must run after `{}`, which does not precede it",
                    plugin, dependency
                )
            }
            Error::ConflictingMapping(key) => {
                write!(f, "conflicting type replacements registered for `{}`", key)
            }
            Error::InvalidMatcher(msg) => write!(f, "invalid nullability matcher: {}", msg),
            Error::Validation { message, chain } => {
                write!(f, "validation failed: {} (at {})", message, chain.join(" > "))
            }
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML serialization error: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::ParseError {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}
