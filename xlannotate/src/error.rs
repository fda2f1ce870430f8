//! The error kinds of this crate.

use context_error::{BoxedError, ErrorKind};

/// A broken consistency rule in the bookkeeping of matched fragments.
pub type BookkeepingError = BoxedError<'static, BookkeepingErrorKind>;

/// The reason the bookkeeping of matched fragments is not consistent. These are programming
/// errors, never caused by input data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BookkeepingErrorKind {
    /// The running counters or the structure of a collection do not match its content
    #[default]
    InternalInconsistency,
}

impl ErrorKind for BookkeepingErrorKind {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "internal inconsistency"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}
