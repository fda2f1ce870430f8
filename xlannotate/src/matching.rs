mod matched;
mod matcher;
mod support;

pub use matched::*;
pub use matcher::*;
pub use support::*;
