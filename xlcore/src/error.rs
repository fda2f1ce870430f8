//! The error kinds of this crate, so downstream users can match on the exact failure.

use context_error::{BoxedError, ErrorKind};

/// An error in a configuration string, setup should abort when one of these is returned.
pub type ConfigurationError = BoxedError<'static, ConfigurationErrorKind>;

/// The reason a configuration string could not be used.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConfigurationErrorKind {
    /// The class name is not one of the known variants
    UnknownClass,
    /// A required argument (name, mass, residues) is missing
    MissingArgument,
    /// A number could not be parsed
    InvalidNumber,
    /// A residue symbol is not known
    InvalidResidue,
    /// A site specificity list could not be understood
    InvalidSpecificity,
    /// Any other invalid value
    #[default]
    InvalidValue,
}

impl ErrorKind for ConfigurationErrorKind {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}

/// The reason a sequence could not be read.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SequenceErrorKind {
    /// A residue symbol that is neither a standard amino acid nor a registered modified residue
    #[default]
    UnknownResidue,
    /// The sequence does not contain any residue
    Empty,
}

impl ErrorKind for SequenceErrorKind {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}
