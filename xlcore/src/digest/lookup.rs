use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{crosslinker::CrossLinker, sequence::Peptide};

/// Peptides ordered by mass, filled while digesting and queried by mass window afterwards.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct PeptideLookup {
    peptides: BTreeMap<OrderedFloat<f64>, Vec<Peptide>>,
    len: usize,
}

impl PeptideLookup {
    /// Add a peptide
    pub fn insert(&mut self, peptide: Peptide) {
        self.peptides
            .entry(OrderedFloat(peptide.mass()))
            .or_default()
            .push(peptide);
        self.len += 1;
    }

    /// The number of peptides
    pub const fn len(&self) -> usize {
        self.len
    }

    /// If there are no peptides
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All peptides by increasing mass
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Peptide> {
        self.peptides.values().flatten()
    }

    /// All peptides with a mass inside `min..=max`, an inverted window is empty
    pub fn in_range(&self, min: f64, max: f64) -> impl DoubleEndedIterator<Item = &Peptide> {
        // BTreeMap::range panics on an inverted range
        let end = OrderedFloat(max.max(min));
        self.peptides
            .range(OrderedFloat(min)..=end)
            .flat_map(|(_, peptides)| peptides)
            .filter(move |p| p.mass() <= max)
    }

    /// Move all peptides of the other lookup into this one
    pub fn merge(&mut self, other: Self) {
        for (mass, peptides) in other.peptides {
            self.len += peptides.len();
            self.peptides.entry(mass).or_default().extend(peptides);
        }
    }
}

/// The two lookups filled by digestion: peptides that can carry a cross-linker and peptides that
/// can only be found as linear peptides.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct PeptideIndices {
    /// Peptides with at least one site a configured cross-linker can react with
    pub crosslinkable: PeptideLookup,
    /// Peptides longer than three residues without any linkable site
    pub linear: PeptideLookup,
}

impl PeptideIndices {
    /// The total number of indexed peptides
    pub const fn len(&self) -> usize {
        self.crosslinkable.len() + self.linear.len()
    }

    /// If nothing is indexed
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index a peptide: crosslinkable if any of the cross-linkers can attach to one of its sites,
    /// otherwise linear when it has more than three residues. Shorter peptides are not indexed.
    pub fn add(&mut self, peptide: &Peptide, crosslinkers: &[CrossLinker]) {
        if crosslinkers.iter().any(|linker| linker.can_cross_link(peptide)) {
            self.crosslinkable.insert(peptide.clone());
        } else if peptide.len() > 3 {
            self.linear.insert(peptide.clone());
        }
    }

    /// Move all peptides of the other indices into these
    pub fn merge(&mut self, other: Self) {
        self.crosslinkable.merge(other.crosslinkable);
        self.linear.merge(other.linear);
    }
}
