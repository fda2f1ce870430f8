use std::{
    collections::BTreeMap,
    ops::Range,
};

use context_error::{BoxedError, Context};
use serde::{Deserialize, Serialize};

use super::{IsAminoAcid, ModificationKind, ModifiedAminoAcid, Residue};
use crate::error::SequenceErrorKind;

/// A protein sequence as read from a database. It is never changed once it is handed to
/// digestion, peptides refer to it by reference.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Sequence {
    header: String,
    decoy: bool,
    residues: Vec<Residue>,
    /// Alternate residues usable at a position, keyed by the position in the sequence
    expected_modifications: BTreeMap<usize, Vec<Residue>>,
}

impl Sequence {
    /// Create a sequence from residues
    pub fn new(header: impl Into<String>, residues: Vec<Residue>) -> Self {
        Self {
            header: header.into(),
            residues,
            ..Self::default()
        }
    }

    /// Read a sequence from text. Every residue starts with an upper case letter, a modified
    /// residue is written as its amino acid followed by lower case letters or digits (`Mox`)
    /// and has to be in `known`. White space is ignored.
    /// # Errors
    /// If a residue symbol is unknown or if the text contains no residues.
    pub fn from_text(
        header: impl Into<String>,
        text: &str,
        known: &[ModifiedAminoAcid],
    ) -> Result<Self, BoxedError<'static, SequenceErrorKind>> {
        let mut residues = Vec::with_capacity(text.len());
        let chars: Vec<(usize, char)> = text
            .char_indices()
            .filter(|(_, c)| !c.is_whitespace())
            .collect();
        let mut index = 0;
        while index < chars.len() {
            let (start, first) = chars[index];
            let mut end = index + 1;
            while end < chars.len()
                && (chars[end].1.is_ascii_lowercase() || chars[end].1.is_ascii_digit())
            {
                end += 1;
            }
            let stop = chars.get(end).map_or(text.len(), |(offset, _)| *offset);
            let symbol: String = chars[index..end].iter().map(|(_, c)| *c).collect();
            let residue = if first.is_ascii_uppercase() {
                Residue::from_symbol(&symbol, known)
            } else {
                None
            };
            residues.push(residue.ok_or_else(|| {
                BoxedError::new(
                    SequenceErrorKind::UnknownResidue,
                    "Unknown residue",
                    format!("The residue '{symbol}' is not an amino acid or a known modified residue"),
                    Context::line(None, text, start, stop - start).to_owned(),
                )
            })?);
            index = end;
        }
        if residues.is_empty() {
            return Err(BoxedError::new(
                SequenceErrorKind::Empty,
                "Empty sequence",
                "A sequence needs at least one residue",
                Context::show(text.to_string()),
            ));
        }
        Ok(Self::new(header, residues))
    }

    /// Mark this sequence as decoy
    #[must_use]
    pub fn with_decoy(self, decoy: bool) -> Self {
        Self { decoy, ..self }
    }

    /// Register an alternate residue at the given position
    pub fn add_expected_modification(&mut self, position: usize, residue: Residue) {
        self.expected_modifications
            .entry(position)
            .or_default()
            .push(residue);
    }

    /// The identifying header
    pub fn header(&self) -> &str {
        &self.header
    }

    /// If this is a decoy sequence
    pub const fn is_decoy(&self) -> bool {
        self.decoy
    }

    /// The residues
    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    /// The residue at the given position
    /// # Panics
    /// If the position is outside of the sequence.
    pub fn residue_at(&self, position: usize) -> &Residue {
        &self.residues[position]
    }

    /// The number of residues
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    /// If the sequence has no residues
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// All expected modifications
    pub const fn expected_modifications(&self) -> &BTreeMap<usize, Vec<Residue>> {
        &self.expected_modifications
    }

    /// The expected modifications inside the given range of sequence positions
    pub fn expected_modifications_in(
        &self,
        range: Range<usize>,
    ) -> impl Iterator<Item = (usize, &[Residue])> {
        self.expected_modifications
            .range(range)
            .map(|(position, residues)| (*position, residues.as_slice()))
    }

    /// The summed mass of all residues plus water
    pub fn mass(&self) -> f64 {
        self.residues
            .iter()
            .map(IsAminoAcid::monoisotopic_mass)
            .sum::<f64>()
            + crate::chemistry::WATER_MASS
    }

    /// Replace every residue whose base amino acid matches a fixed modification by that modified
    /// residue. Returns the number of replaced residues.
    pub fn apply_fixed_modifications(&mut self, modifications: &[ModifiedAminoAcid]) -> usize {
        let mut replaced = 0;
        for residue in &mut self.residues {
            if let Residue::Plain(aa) = residue
                && let Some(modification) = modifications
                    .iter()
                    .find(|m| m.kind() == ModificationKind::Fixed && m.base_amino_acid() == *aa)
            {
                *residue = Residue::Modified(modification.clone());
                replaced += 1;
            }
        }
        replaced
    }

    /// Create the reversed decoy of this sequence, expected modifications follow their residues.
    #[must_use]
    pub fn reverse(&self) -> Self {
        let length = self.len();
        Self {
            header: format!("REV_{}", self.header),
            decoy: true,
            residues: self.residues.iter().rev().cloned().collect(),
            expected_modifications: self
                .expected_modifications
                .iter()
                .map(|(position, residues)| (length - 1 - position, residues.clone()))
                .collect(),
        }
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for residue in &self.residues {
            write!(f, "{residue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::sequence::AminoAcid;

    #[test]
    fn parse_text() {
        let oxidation =
            ModifiedAminoAcid::new("Mox", AminoAcid::Methionine, 15.99491, ModificationKind::Variable);
        let sequence = Sequence::from_text("P1", "PEP Mox K", &[oxidation]).unwrap();
        assert_eq!(sequence.len(), 5);
        assert_eq!(sequence.to_string(), "PEPMoxK");
        assert!(Sequence::from_text("P2", "PEPKac", &[]).is_err());
        assert!(Sequence::from_text("P3", "  ", &[]).is_err());
        assert!(Sequence::from_text("P4", "pep", &[]).is_err());
    }

    #[test]
    fn fixed_and_reverse() {
        let carbamidomethyl =
            ModifiedAminoAcid::new("Ccm", AminoAcid::Cysteine, 57.021464, ModificationKind::Fixed);
        let mut sequence = Sequence::from_text("P1", "ACDCK", &[]).unwrap();
        sequence.add_expected_modification(1, Residue::Plain(AminoAcid::Serine));
        assert_eq!(sequence.apply_fixed_modifications(&[carbamidomethyl]), 2);
        assert_eq!(sequence.to_string(), "ACcmDCcmK");
        let decoy = sequence.reverse();
        assert!(decoy.is_decoy());
        assert_eq!(decoy.to_string(), "KCcmDCcmA");
        assert_eq!(
            decoy.expected_modifications().keys().copied().collect::<Vec<_>>(),
            vec![3]
        );
    }
}
