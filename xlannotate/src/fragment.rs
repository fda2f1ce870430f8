//! Theoretical fragments. All fragments of a search live in a [`FragmentArena`] and refer to
//! each other (a loss to the fragment it derives from, a cross-linked fragment to both of its
//! sides) by [`FragmentId`].

mod arena;
mod cross_link;
mod ion;
mod loss;

pub use arena::*;
pub(crate) use cross_link::*;
pub use ion::*;
pub use loss::*;
