//! A run configuration is a list of `key:arguments` lines. Reading it builds the [`Registry`]
//! of cross-linkers, ion types, losses and modifications together with the numeric
//! [`SearchSettings`]. Both are read-only once setup is done.

mod configuration;
mod registry;
mod settings;

pub use configuration::*;
pub use registry::*;
pub use settings::*;
