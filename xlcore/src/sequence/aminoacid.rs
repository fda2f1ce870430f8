use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A general trait to define anything that can stand at a position in a sequence: it has a
/// symbol and a mass.
pub trait IsAminoAcid {
    /// The symbol used in sequence text, a single letter for the standard amino acids and the
    /// letter followed by a lower case suffix for modified ones (eg `Mox`).
    fn symbol(&self) -> Cow<'_, str>;
    /// The monoisotopic residue mass
    fn monoisotopic_mass(&self) -> f64;
    /// The unmodified amino acid this builds on, used for enzyme specificity
    fn base_amino_acid(&self) -> AminoAcid;
}

/// An amino acid, alongside the standard ones the non-standard (U/O) and unknown (X) are included.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub enum AminoAcid {
    /// Ala, A
    #[default]
    Alanine = 0,
    /// Arg, R
    Arginine,
    /// Asn, N
    Asparagine,
    /// Asp, D
    AsparticAcid,
    /// Cys, C
    Cysteine,
    /// Gln, Q
    Glutamine,
    /// Glu, E
    GlutamicAcid,
    /// Gly, G
    Glycine,
    /// His, H
    Histidine,
    /// Ile, I
    Isoleucine,
    /// Leu, L
    Leucine,
    /// Lys, K
    Lysine,
    /// Met, M
    Methionine,
    /// Phe, F
    Phenylalanine,
    /// Pro, P
    Proline,
    /// Ser, S
    Serine,
    /// Thr, T
    Threonine,
    /// Trp, W
    Tryptophan,
    /// Tyr, Y
    Tyrosine,
    /// Val, V
    Valine,
    /// Sec, U
    Selenocysteine,
    /// Pyl, O
    Pyrrolysine,
    /// Xxx, X, has no defined mass
    Unknown,
}

impl AminoAcid {
    /// The total number of amino acids
    pub const TOTAL_NUMBER: usize = Self::Unknown as usize + 1;

    /// The twenty standard amino acids
    pub const STANDARD_AMINO_ACIDS: &'static [Self] = &[
        Self::Alanine,
        Self::Arginine,
        Self::Asparagine,
        Self::AsparticAcid,
        Self::Cysteine,
        Self::Glutamine,
        Self::GlutamicAcid,
        Self::Glycine,
        Self::Histidine,
        Self::Isoleucine,
        Self::Leucine,
        Self::Lysine,
        Self::Methionine,
        Self::Phenylalanine,
        Self::Proline,
        Self::Serine,
        Self::Threonine,
        Self::Tryptophan,
        Self::Tyrosine,
        Self::Valine,
    ];

    /// All amino acids, including the non-standard and unknown ones
    pub const ALL_AMINO_ACIDS: &'static [Self] = &[
        Self::Alanine,
        Self::Arginine,
        Self::Asparagine,
        Self::AsparticAcid,
        Self::Cysteine,
        Self::Glutamine,
        Self::GlutamicAcid,
        Self::Glycine,
        Self::Histidine,
        Self::Isoleucine,
        Self::Leucine,
        Self::Lysine,
        Self::Methionine,
        Self::Phenylalanine,
        Self::Proline,
        Self::Serine,
        Self::Threonine,
        Self::Tryptophan,
        Self::Tyrosine,
        Self::Valine,
        Self::Selenocysteine,
        Self::Pyrrolysine,
        Self::Unknown,
    ];

    /// The one letter code
    pub const fn one_letter_code(self) -> char {
        match self {
            Self::Alanine => 'A',
            Self::Arginine => 'R',
            Self::Asparagine => 'N',
            Self::AsparticAcid => 'D',
            Self::Cysteine => 'C',
            Self::Glutamine => 'Q',
            Self::GlutamicAcid => 'E',
            Self::Glycine => 'G',
            Self::Histidine => 'H',
            Self::Isoleucine => 'I',
            Self::Leucine => 'L',
            Self::Lysine => 'K',
            Self::Methionine => 'M',
            Self::Phenylalanine => 'F',
            Self::Proline => 'P',
            Self::Serine => 'S',
            Self::Threonine => 'T',
            Self::Tryptophan => 'W',
            Self::Tyrosine => 'Y',
            Self::Valine => 'V',
            Self::Selenocysteine => 'U',
            Self::Pyrrolysine => 'O',
            Self::Unknown => 'X',
        }
    }

    /// The monoisotopic residue mass (the amino acid minus water). Unknown residues have an
    /// infinite mass so any peptide containing them is rejected.
    pub const fn residue_mass(self) -> f64 {
        match self {
            Self::Alanine => 71.03711,
            Self::Arginine => 156.10111,
            Self::Asparagine => 114.04293,
            Self::AsparticAcid => 115.02694,
            Self::Cysteine => 103.00919,
            Self::Glutamine => 128.05858,
            Self::GlutamicAcid => 129.04259,
            Self::Glycine => 57.02146,
            Self::Histidine => 137.05891,
            Self::Isoleucine | Self::Leucine => 113.08406,
            Self::Lysine => 128.09496,
            Self::Methionine => 131.04049,
            Self::Phenylalanine => 147.06841,
            Self::Proline => 97.05276,
            Self::Serine => 87.03203,
            Self::Threonine => 101.04768,
            Self::Tryptophan => 186.07931,
            Self::Tyrosine => 163.06333,
            Self::Valine => 99.06841,
            Self::Selenocysteine => 150.95364,
            Self::Pyrrolysine => 237.14773,
            Self::Unknown => f64::INFINITY,
        }
    }
}

impl IsAminoAcid for AminoAcid {
    fn symbol(&self) -> Cow<'_, str> {
        Cow::Owned(self.one_letter_code().to_string())
    }
    fn monoisotopic_mass(&self) -> f64 {
        self.residue_mass()
    }
    fn base_amino_acid(&self) -> AminoAcid {
        *self
    }
}

impl std::fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.one_letter_code())
    }
}

impl TryFrom<char> for AminoAcid {
    type Error = ();
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'A' => Ok(Self::Alanine),
            'C' => Ok(Self::Cysteine),
            'D' => Ok(Self::AsparticAcid),
            'E' => Ok(Self::GlutamicAcid),
            'F' => Ok(Self::Phenylalanine),
            'G' => Ok(Self::Glycine),
            'H' => Ok(Self::Histidine),
            'I' => Ok(Self::Isoleucine),
            'K' => Ok(Self::Lysine),
            'L' => Ok(Self::Leucine),
            'M' => Ok(Self::Methionine),
            'N' => Ok(Self::Asparagine),
            'O' => Ok(Self::Pyrrolysine),
            'P' => Ok(Self::Proline),
            'Q' => Ok(Self::Glutamine),
            'R' => Ok(Self::Arginine),
            'S' => Ok(Self::Serine),
            'T' => Ok(Self::Threonine),
            'U' => Ok(Self::Selenocysteine),
            'V' => Ok(Self::Valine),
            'W' => Ok(Self::Tryptophan),
            'X' => Ok(Self::Unknown),
            'Y' => Ok(Self::Tyrosine),
            _ => Err(()),
        }
    }
}

impl TryFrom<&str> for AminoAcid {
    type Error = ();
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => ch.try_into(),
            _ => Err(()),
        }
    }
}
