use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    ops::Range,
    sync::Arc,
};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::{IsAminoAcid, Residue, Sequence};
use crate::chemistry::WATER_MASS;

/// A peptide: a region of a [`Sequence`] with point substitutions laid over it. The sequence
/// itself is shared and never copied, only the overlay is cloned when variants are made.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Peptide {
    sequence: Arc<Sequence>,
    start: usize,
    length: usize,
    /// Substituted residues, keyed by the position relative to the peptide start
    overlay: BTreeMap<usize, Residue>,
    missed_cleavages: usize,
    forced_n_terminal: bool,
    mass: f64,
}

impl Peptide {
    /// Create a peptide spanning `length` residues from `start` in the given sequence.
    /// # Panics
    /// If the region does not lie inside the sequence or is empty.
    pub fn new(sequence: Arc<Sequence>, start: usize, length: usize) -> Self {
        assert!(
            length > 0 && start + length <= sequence.len(),
            "peptide region {start}+{length} is outside of a sequence of length {}",
            sequence.len()
        );
        let mass = sequence.residues()[start..start + length]
            .iter()
            .map(IsAminoAcid::monoisotopic_mass)
            .sum::<f64>()
            + WATER_MASS;
        Self {
            sequence,
            start,
            length,
            overlay: BTreeMap::new(),
            missed_cleavages: 0,
            forced_n_terminal: false,
            mass,
        }
    }

    /// Build the synthetic single residue peptide whose mass equals `total_mass`. It stands in
    /// for all other peptides of a link joining more than two peptides.
    pub fn mass_complement(total_mass: f64) -> Self {
        let residue = Residue::Pseudo {
            symbol: "X".to_string(),
            mass: OrderedFloat(total_mass - WATER_MASS),
        };
        Self::new(Arc::new(Sequence::new("mass complement", vec![residue])), 0, 1)
    }

    /// The sequence this peptide is a view on
    pub const fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// The position of the first residue in the sequence
    pub const fn start(&self) -> usize {
        self.start
    }

    /// The number of residues
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Always false, a peptide has at least one residue
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The monoisotopic mass: all residues plus water
    pub const fn mass(&self) -> f64 {
        self.mass
    }

    /// If the mass is a usable number, peptides containing unknown residues are not
    pub const fn is_valid(&self) -> bool {
        self.mass.is_finite()
    }

    /// The residue at the given position relative to the peptide start
    /// # Panics
    /// If the position is outside of the peptide.
    pub fn residue_at(&self, position: usize) -> &Residue {
        assert!(position < self.length, "residue {position} is outside of the peptide");
        self.overlay
            .get(&position)
            .unwrap_or_else(|| self.sequence.residue_at(self.start + position))
    }

    /// All residues in order
    pub fn residues(&self) -> impl DoubleEndedIterator<Item = &Residue> + ExactSizeIterator {
        (0..self.length).map(|position| self.residue_at(position))
    }

    /// The substituted residues keyed by relative position
    pub const fn modifications(&self) -> &BTreeMap<usize, Residue> {
        &self.overlay
    }

    /// Create a copy with the residue at the relative position substituted
    /// # Panics
    /// If the position is outside of the peptide.
    #[must_use]
    pub fn with_modification(&self, position: usize, residue: Residue) -> Self {
        let mut result = self.clone();
        result.mass += residue.monoisotopic_mass() - self.residue_at(position).monoisotopic_mass();
        result.overlay.insert(position, residue);
        result
    }

    /// The peptide covering part of this one, positions are relative to this peptide. The overlay
    /// follows the residues, the missed cleavages are kept.
    /// # Panics
    /// If the region is outside of this peptide or empty.
    #[must_use]
    pub fn sub_peptide(&self, start: usize, length: usize) -> Self {
        assert!(
            length > 0 && start + length <= self.length,
            "sub peptide {start}+{length} is outside of a peptide of length {}",
            self.length
        );
        let overlay = self
            .overlay
            .range(start..start + length)
            .map(|(position, residue)| (position - start, residue.clone()))
            .collect();
        let mass = (start..start + length)
            .map(|position| self.residue_at(position).monoisotopic_mass())
            .sum::<f64>()
            + WATER_MASS;
        Self {
            sequence: self.sequence.clone(),
            start: self.start + start,
            length,
            overlay,
            missed_cleavages: self.missed_cleavages,
            forced_n_terminal: start == 0 && self.forced_n_terminal,
            mass,
        }
    }

    /// The summed residue masses over the relative range, without water
    pub fn residue_mass(&self, range: Range<usize>) -> f64 {
        range
            .map(|position| self.residue_at(position).monoisotopic_mass())
            .sum()
    }

    /// The number of residues in the relative range for which the predicate holds
    pub fn count_residues(&self, range: Range<usize>, matches: impl Fn(&Residue) -> bool) -> usize {
        range.filter(|position| matches(self.residue_at(*position))).count()
    }

    /// The number of missed cleavages
    pub const fn missed_cleavages(&self) -> usize {
        self.missed_cleavages
    }

    /// Set the number of missed cleavages
    pub const fn set_missed_cleavages(&mut self, missed_cleavages: usize) {
        self.missed_cleavages = missed_cleavages;
    }

    /// Mark this peptide as N-terminal even though it does not start the sequence, used for
    /// peptides that lost their initiator methionine
    #[must_use]
    pub const fn with_forced_n_terminal(mut self) -> Self {
        self.forced_n_terminal = true;
        self
    }

    /// If this peptide carries the free N-terminus of the protein
    pub const fn is_n_terminal(&self) -> bool {
        self.start == 0 || self.forced_n_terminal
    }

    /// If this peptide starts at the first residue of the sequence
    pub const fn is_protein_n_terminal(&self) -> bool {
        self.start == 0
    }

    /// If this peptide ends at the last residue of the sequence
    pub fn is_c_terminal(&self) -> bool {
        self.start + self.length == self.sequence.len()
    }

    /// If the sequence is a decoy
    pub fn is_decoy(&self) -> bool {
        self.sequence.is_decoy()
    }
}

impl PartialEq for Peptide {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.sequence, &other.sequence)
            && self.start == other.start
            && self.length == other.length
            && self.overlay == other.overlay
    }
}

impl Eq for Peptide {}

impl Hash for Peptide {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.sequence).hash(state);
        self.start.hash(state);
        self.length.hash(state);
        self.overlay.hash(state);
    }
}

impl std::fmt::Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for residue in self.residues() {
            write!(f, "{residue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::sequence::{AminoAcid, ModificationKind, ModifiedAminoAcid};

    fn sequence(text: &str) -> Arc<Sequence> {
        Arc::new(Sequence::from_text("test", text, &[]).unwrap())
    }

    #[test]
    fn view_and_overlay() {
        let sequence = sequence("MKRTESTK");
        let peptide = Peptide::new(sequence.clone(), 3, 5);
        assert_eq!(peptide.to_string(), "TESTK");
        assert!(peptide.is_c_terminal());
        assert!(!peptide.is_n_terminal());
        let phospho = ModifiedAminoAcid::new("Sph", AminoAcid::Serine, 79.96633, ModificationKind::Variable);
        let modified = peptide.with_modification(2, phospho.into());
        assert_eq!(modified.to_string(), "TESphTK");
        assert!((modified.mass() - peptide.mass() - 79.96633).abs() < 1e-9);
        assert_ne!(modified, peptide);
        assert_eq!(sequence.to_string(), "MKRTESTK");
        let part = modified.sub_peptide(1, 3);
        assert_eq!(part.to_string(), "ESphT");
        assert_eq!(part.start(), 4);
    }

    #[test]
    fn same_region_is_same_peptide() {
        let sequence = sequence("PEPTIDE");
        let other = Arc::new(Sequence::from_text("other", "PEPTIDE", &[]).unwrap());
        assert_eq!(Peptide::new(sequence.clone(), 0, 3), Peptide::new(sequence, 0, 3));
        assert_ne!(
            Peptide::new(other.clone(), 0, 3),
            Peptide::new(Arc::new(Sequence::new("x", other.residues().to_vec())), 0, 3)
        );
    }

    #[test]
    fn mass_complement() {
        let complement = Peptide::mass_complement(2500.0);
        assert!((complement.mass() - 2500.0).abs() < 1e-9);
        assert_eq!(complement.len(), 1);
        assert!(complement.is_n_terminal() && complement.is_c_terminal());
    }

    #[test]
    fn unknown_residue_invalid() {
        let peptide = Peptide::new(sequence("PEXK"), 0, 4);
        assert!(!peptide.is_valid());
        assert_eq!(peptide.count_residues(0..4, |r| r.base_amino_acid() == AminoAcid::Proline), 1);
    }
}
