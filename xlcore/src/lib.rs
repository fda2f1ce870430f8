#![doc = include_str!("../README.md")]

mod helper_functions;

/// Reading of the argument lists used by configuration lines.
pub mod arguments;

/// Mass constants and conversions between neutral masses and m/z values.
pub mod chemistry;
/// Cross-linker policies: which sites can be linked and what mass the link adds.
pub mod crosslinker;
/// Enzymatic digestion of protein sequences into candidate peptides.
pub mod digest;
pub mod error;
/// Contains all things related to tolerances.
pub mod quantities;
/// Contains all things related to sequences, amongst others amino acids, residues and peptides.
pub mod sequence;

/// A subset of the types and traits that are envisioned to be used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::chemistry::{C13_MASS_DIFFERENCE, PROTON_MASS, WATER_MASS};
    pub use crate::crosslinker::{
        CrossLinker, CrossLinkerRegistry, LinkableSequence, LinkerSpecificity, SiteRestriction,
    };
    pub use crate::digest::{
        Digestion, DigestionMethod, DigestionSettings, MultiStepDigest, PeptideIndices,
        PeptideLookup, Protease, StepMethod,
    };
    pub use crate::error::{ConfigurationError, ConfigurationErrorKind};
    pub use crate::quantities::Tolerance;
    pub use crate::sequence::{
        AminoAcid, IsAminoAcid, ModificationKind, ModifiedAminoAcid, Peptide, Residue, Sequence,
    };
}
