use serde::{Deserialize, Serialize};

use crate::sequence::AminoAcid;

/// A cut rule, given as patterns on the residues around the cut. `before` ends with the residue
/// the cut follows, `after` starts with the residue following the cut. A `None` pattern matches
/// any residue. Patterns that fall outside of the sequence always match, so the last residue of
/// a sequence is a cleavage site whenever the residues before the cut match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Protease {
    /// The patterns N terminal of the cut
    pub before: Vec<Option<Vec<AminoAcid>>>,
    /// The patterns C terminal of the cut
    pub after: Vec<Option<Vec<AminoAcid>>>,
}

impl Protease {
    /// Cut after any of the digested residues
    pub fn after(digested: Vec<AminoAcid>) -> Self {
        Self {
            before: vec![Some(digested)],
            after: Vec::new(),
        }
    }

    /// Cut after any of the digested residues, unless the next residue is a constraining one
    pub fn after_unless_followed_by(digested: Vec<AminoAcid>, constraining: &[AminoAcid]) -> Self {
        Self {
            before: vec![Some(digested)],
            after: vec![all_except(constraining)],
        }
    }

    /// Cut before any of the digested residues, unless the previous residue is a constraining one
    pub fn before_unless_preceded_by(digested: Vec<AminoAcid>, constraining: &[AminoAcid]) -> Self {
        Self {
            before: vec![all_except(constraining)],
            after: vec![Some(digested)],
        }
    }

    /// Cut after every residue
    pub fn unspecific() -> Self {
        Self {
            before: vec![None],
            after: Vec::new(),
        }
    }

    /// If this protease cuts after the given position in the sequence
    pub fn cleaves_after(&self, sequence: &[AminoAcid], position: usize) -> bool {
        if position >= sequence.len() || position + 1 < self.before.len() {
            return false;
        }
        let before_start = position + 1 - self.before.len();
        let before = self
            .before
            .iter()
            .zip(&sequence[before_start..=position]);
        let after = self
            .after
            .iter()
            .enumerate()
            .filter_map(|(offset, pattern)| sequence.get(position + 1 + offset).map(|aa| (pattern, aa)));
        before
            .chain(after)
            .all(|(pattern, aa)| pattern.as_ref().is_none_or(|options| options.contains(aa)))
    }
}

/// No constraint is no pattern at all
fn all_except(exclude: &[AminoAcid]) -> Option<Vec<AminoAcid>> {
    (!exclude.is_empty()).then(|| {
        AminoAcid::ALL_AMINO_ACIDS
            .iter()
            .copied()
            .filter(|aa| !exclude.contains(aa))
            .collect()
    })
}
