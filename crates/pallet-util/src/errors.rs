use miette::Diagnostic;
use thiserror::Error;

/// Error type for everything below the resolver: names, specs, the package
/// universe, configuration and the plan codec.
#[derive(Debug, Error, Diagnostic)]
pub enum PalletError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A repository name was referenced but no such repository exists.
    #[error("No such repository '{name}'")]
    #[diagnostic(help("Check the [[repository]] tables of your universe file"))]
    NoSuchRepository { name: String },

    /// A set name was referenced but no such set exists.
    #[error("No such set '{name}'")]
    NoSuchSet { name: String },

    /// A package id could not be found, e.g. while decoding a plan.
    #[error("No package id matches '{spec}'")]
    NoSuchPackageId { spec: String },

    /// A package or block dep spec could not be parsed.
    #[error("Malformed dep spec '{spec}': {message}")]
    #[diagnostic(help("Specs look like '>=cat/pkg-1.2:slot::repo[flag,-flag]' or '!cat/pkg'"))]
    MalformedSpec { spec: String, message: String },

    /// A dependency string or tree could not be parsed or sanitised.
    #[error("Malformed dependency '{text}': {message}")]
    MalformedDependency { text: String, message: String },

    /// A version string could not be parsed.
    #[error("Malformed version '{version}'")]
    MalformedVersion { version: String },

    /// Invalid or unreadable configuration / universe file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the TOML syntax and key names"))]
    Config { message: String },

    /// A serialised plan could not be decoded.
    #[error("Serialisation error: {message}")]
    Serialisation { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

impl PalletError {
    pub fn malformed_spec(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSpec {
            spec: spec.into(),
            message: message.into(),
        }
    }

    pub fn serialisation(message: impl Into<String>) -> Self {
        Self::Serialisation {
            message: message.into(),
        }
    }
}

/// Convenience alias for `miette::Result<T>`.
pub type PalletResult<T> = miette::Result<T>;
