#![doc = include_str!("../README.md")]

/// Reading run configurations into a [`config::Registry`] and [`config::SearchSettings`].
pub mod config;
pub mod error;
/// Contains all things related to fragments and fragmentation.
pub mod fragment;
/// Matching theoretical fragments against spectra and keeping track of the matches.
pub mod matching;
/// Defines the spectra that fragments are matched against
pub mod spectrum;

/// A subset of the types and traits that are envisioned to be used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::config::{Configuration, Registry, SearchSettings};
    pub use crate::fragment::{
        Fragment, FragmentArena, FragmentId, FragmentKind, IonSeries, IonType, IonTypeRegistry,
        LossRule, PeptideSlot,
    };
    pub use crate::matching::{
        MatchedBaseFragment, MatchedFragmentCollection, Matcher, MatcherSettings, SupportLevel,
    };
    pub use crate::spectrum::{IsotopeCluster, Peak, PeakAnnotation, Spectrum};
}
