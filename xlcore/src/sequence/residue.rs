use std::borrow::Cow;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::{AminoAcid, IsAminoAcid};

/// How a modified residue came to be, this only changes how a residue is treated during setup
/// (fixed modifications are applied to every sequence) never how it is matched.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum ModificationKind {
    /// Applied to every occurrence of the base amino acid
    Fixed,
    /// Optionally present
    #[default]
    Variable,
    /// A cross-linker that reacted on one side only
    Linear,
    /// An isotope label
    Label,
    /// Only used as an expected modification at annotated positions
    Known,
}

/// An amino acid carrying a modification, substitutable wherever an amino acid is expected.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ModifiedAminoAcid {
    symbol: String,
    base: AminoAcid,
    delta: OrderedFloat<f64>,
    kind: ModificationKind,
}

impl ModifiedAminoAcid {
    /// Create a new modified residue, the symbol is how it is written in sequences (eg `Mox`)
    pub fn new(
        symbol: impl Into<String>,
        base: AminoAcid,
        delta: f64,
        kind: ModificationKind,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            base,
            delta: OrderedFloat(delta),
            kind,
        }
    }

    /// The mass added to the base amino acid
    pub fn delta(&self) -> f64 {
        self.delta.0
    }

    /// How this modification is used
    pub const fn kind(&self) -> ModificationKind {
        self.kind
    }
}

impl IsAminoAcid for ModifiedAminoAcid {
    fn symbol(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.symbol)
    }
    fn monoisotopic_mass(&self) -> f64 {
        self.base.residue_mass() + self.delta.0
    }
    fn base_amino_acid(&self) -> AminoAcid {
        self.base
    }
}

/// A single position in a sequence.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Residue {
    /// A plain amino acid
    Plain(AminoAcid),
    /// A modified amino acid
    Modified(ModifiedAminoAcid),
    /// A residue that only stands for a mass, used to stand in for a group of peptides
    Pseudo {
        /// The symbol to show
        symbol: String,
        /// The residue mass
        mass: OrderedFloat<f64>,
    },
}

impl Residue {
    /// Look up a residue by its symbol, modified residues are searched in `known`.
    pub fn from_symbol(symbol: &str, known: &[ModifiedAminoAcid]) -> Option<Self> {
        let symbol = symbol.trim();
        AminoAcid::try_from(symbol).map_or_else(
            |()| {
                known
                    .iter()
                    .find(|m| m.symbol == symbol)
                    .map(|m| Self::Modified(m.clone()))
            },
            |aa| Some(Self::Plain(aa)),
        )
    }

    /// Get the modification if this is a modified residue
    pub const fn modification(&self) -> Option<&ModifiedAminoAcid> {
        match self {
            Self::Modified(m) => Some(m),
            _ => None,
        }
    }
}

impl From<AminoAcid> for Residue {
    fn from(value: AminoAcid) -> Self {
        Self::Plain(value)
    }
}

impl From<ModifiedAminoAcid> for Residue {
    fn from(value: ModifiedAminoAcid) -> Self {
        Self::Modified(value)
    }
}

impl IsAminoAcid for Residue {
    fn symbol(&self) -> Cow<'_, str> {
        match self {
            Self::Plain(aa) => aa.symbol(),
            Self::Modified(m) => m.symbol(),
            Self::Pseudo { symbol, .. } => Cow::Borrowed(symbol),
        }
    }
    fn monoisotopic_mass(&self) -> f64 {
        match self {
            Self::Plain(aa) => aa.residue_mass(),
            Self::Modified(m) => m.monoisotopic_mass(),
            Self::Pseudo { mass, .. } => mass.0,
        }
    }
    fn base_amino_acid(&self) -> AminoAcid {
        match self {
            Self::Plain(aa) => *aa,
            Self::Modified(m) => m.base,
            Self::Pseudo { .. } => AminoAcid::Unknown,
        }
    }
}

impl std::fmt::Display for Residue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let oxidation =
            ModifiedAminoAcid::new("Mox", AminoAcid::Methionine, 15.99491, ModificationKind::Variable);
        let known = [oxidation.clone()];
        assert_eq!(
            Residue::from_symbol("K", &known),
            Some(Residue::Plain(AminoAcid::Lysine))
        );
        assert_eq!(
            Residue::from_symbol("Mox", &known),
            Some(Residue::Modified(oxidation))
        );
        assert_eq!(Residue::from_symbol("Kac", &known), None);
    }

    #[test]
    fn masses() {
        let oxidised: Residue =
            ModifiedAminoAcid::new("Mox", AminoAcid::Methionine, 15.99491, ModificationKind::Variable)
                .into();
        assert!((oxidised.monoisotopic_mass() - 147.0354).abs() < 1e-4);
        assert_eq!(oxidised.base_amino_acid(), AminoAcid::Methionine);
        assert_eq!(oxidised.to_string(), "Mox");
    }
}
