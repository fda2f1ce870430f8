use std::{collections::HashSet, fmt::Display};

use serde::{Deserialize, Serialize};
use xlcore::{
    chemistry::{CARBON_MASS, HYDROGEN_MASS, NITROGEN_MASS, OXYGEN_MASS, WATER_MASS},
    sequence::IsAminoAcid,
};

use super::{FragmentArena, FragmentId, FragmentKind, NewFragment, PeptideSlot};

/// The primary ion series, each a fixed mass offset on the residues of the fragment
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IonSeries {
    /// N-terminal, `b - CO`
    A,
    /// N-terminal, the plain residues
    B,
    /// N-terminal, `b + NH3`
    C,
    /// C-terminal, `y + CO - H2`
    X,
    /// C-terminal, the residues plus water
    Y,
    /// The whole peptide
    Peptide,
    /// A single residue cut out of the backbone, `a1` like. One per distinct residue.
    Immonium,
}

impl IonSeries {
    /// The mass added to the summed residue masses
    pub fn mass_offset(self) -> f64 {
        match self {
            Self::A | Self::Immonium => -(OXYGEN_MASS + CARBON_MASS),
            Self::B => 0.0,
            Self::C => 3.0f64.mul_add(HYDROGEN_MASS, NITROGEN_MASS),
            Self::X => 2.0f64.mul_add(OXYGEN_MASS, CARBON_MASS),
            Self::Y | Self::Peptide => WATER_MASS,
        }
    }

    /// If the fragments of this series contain the N-terminus
    pub const fn is_n_terminal(self) -> bool {
        matches!(self, Self::A | Self::B | Self::C | Self::Peptide)
    }

    /// If the fragments of this series contain the C-terminus
    pub const fn is_c_terminal(self) -> bool {
        matches!(self, Self::X | Self::Y | Self::Peptide)
    }

    const fn letter(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::X => "x",
            Self::Y => "y",
            Self::Peptide => "P",
            Self::Immonium => "im",
        }
    }

    /// The `(start, length)` of every fragment of this series on a peptide of the given length,
    /// by increasing length
    pub fn spans(self, peptide_length: usize) -> Vec<(usize, usize)> {
        match self {
            Self::Peptide => vec![(0, peptide_length)],
            Self::Immonium => (0..peptide_length).map(|i| (i, 1)).collect(),
            Self::A | Self::B | Self::C => (1..peptide_length).map(|i| (0, i)).collect(),
            Self::X | Self::Y => (1..peptide_length)
                .map(|i| (peptide_length - i, i))
                .collect(),
        }
    }

    /// Generate all fragments of this series for the peptide
    pub fn generate(
        self,
        arena: &mut FragmentArena,
        slot: PeptideSlot,
        ion_type: Option<usize>,
    ) -> Vec<FragmentId> {
        let peptide = arena.peptide(slot);
        let mut seen = HashSet::new();
        let fragments: Vec<(usize, usize, f64, String)> = self
            .spans(peptide.len())
            .into_iter()
            .filter_map(|(start, length)| {
                let name = match self {
                    Self::Peptide => self.letter().to_string(),
                    Self::Immonium => {
                        format!("{}{}", self.letter(), peptide.residue_at(start).symbol())
                    }
                    _ => format!("{}{length}", self.letter()),
                };
                seen.insert(name.clone()).then(|| {
                    let mass = peptide.residue_mass(start..start + length) + self.mass_offset();
                    (start, length, mass, name)
                })
            })
            .collect();
        fragments
            .into_iter()
            .map(|(start, length, neutral_mass, name)| {
                arena.push(NewFragment {
                    peptide: slot,
                    start,
                    length,
                    neutral_mass,
                    kind: FragmentKind::Primary(self),
                    name,
                    ion_type,
                })
            })
            .collect()
    }
}

impl Display for IonSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Generate the b-like internal fragments of a peptide, every fragment of at least two residues
/// that contains neither terminus
pub fn double_fragments(
    arena: &mut FragmentArena,
    slot: PeptideSlot,
    ion_type: Option<usize>,
) -> Vec<FragmentId> {
    let peptide = arena.peptide(slot);
    let length = peptide.len();
    let fragments: Vec<(usize, usize, f64)> = (1..length.saturating_sub(2))
        .flat_map(|start| {
            (2..length - start)
                .rev()
                .map(move |sub_length| (start, sub_length))
        })
        .map(|(start, sub_length)| {
            (
                start,
                sub_length,
                peptide.residue_mass(start..start + sub_length),
            )
        })
        .collect();
    fragments
        .into_iter()
        .map(|(start, sub_length, neutral_mass)| {
            arena.push(NewFragment {
                peptide: slot,
                start,
                length: sub_length,
                neutral_mass,
                kind: FragmentKind::DoubleFragmentation,
                name: format!("dbl_{}_{sub_length}", start + 1),
                ion_type,
            })
        })
        .collect()
}

/// A kind of fragment that can be switched on in a run configuration
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum IonType {
    /// One of the primary series
    Series(IonSeries),
    /// Internal fragments from two backbone breaks, switching these on allows double
    /// fragmentation everywhere
    BLikeDoubleFragmentation,
}

/// The configuration class names of the ion types
pub const ION_TYPE_CLASSES: &[(&str, IonType)] = &[
    ("AIon", IonType::Series(IonSeries::A)),
    ("BIon", IonType::Series(IonSeries::B)),
    ("CIon", IonType::Series(IonSeries::C)),
    ("XIon", IonType::Series(IonSeries::X)),
    ("YIon", IonType::Series(IonSeries::Y)),
    ("PeptideIon", IonType::Series(IonSeries::Peptide)),
    ("ImmoniumIon", IonType::Series(IonSeries::Immonium)),
    ("BLikeDoubleFragmentation", IonType::BLikeDoubleFragmentation),
];

impl IonType {
    /// Find the ion type for a configuration class name, ignoring case
    pub fn from_class(class: &str) -> Option<Self> {
        ION_TYPE_CLASSES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(class.trim()))
            .map(|(_, ion_type)| *ion_type)
    }

    /// The configuration class name
    pub fn class(self) -> &'static str {
        ION_TYPE_CLASSES
            .iter()
            .find(|(_, ion_type)| *ion_type == self)
            .map_or("", |(name, _)| *name)
    }
}

/// The ids of the registered ion types and of the named losses and stubs. An id is handed out
/// once when a type is registered, either the configured one or the next free id.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IonTypeRegistry {
    ion_types: Vec<(IonType, usize)>,
    named: Vec<(String, usize)>,
}

impl IonTypeRegistry {
    /// Register an ion type, a configured id replaces the id of an earlier registration
    pub fn register(&mut self, ion_type: IonType, id: Option<usize>) -> usize {
        if let Some(index) = self.ion_types.iter().position(|(t, _)| *t == ion_type) {
            if let Some(id) = id {
                self.ion_types[index].1 = id;
            }
            return self.ion_types[index].1;
        }
        let id = id.unwrap_or_else(|| self.next_free());
        self.ion_types.push((ion_type, id));
        id
    }

    /// Register a named loss or stub, names are compared ignoring case
    pub fn register_named(&mut self, name: &str, id: Option<usize>) -> usize {
        if let Some(index) = self
            .named
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            if let Some(id) = id {
                self.named[index].1 = id;
            }
            return self.named[index].1;
        }
        let id = id.unwrap_or_else(|| self.next_free());
        self.named.push((name.to_string(), id));
        id
    }

    /// The id of the ion type, if registered
    pub fn id(&self, ion_type: IonType) -> Option<usize> {
        self.ion_types
            .iter()
            .find(|(t, _)| *t == ion_type)
            .map(|(_, id)| *id)
    }

    /// The id of the named loss or stub, if registered
    pub fn named_id(&self, name: &str) -> Option<usize> {
        self.named
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    /// The registered primary series with their ids, in registration order
    pub fn series(&self) -> impl Iterator<Item = (IonSeries, usize)> + '_ {
        self.ion_types.iter().filter_map(|(t, id)| match t {
            IonType::Series(series) => Some((*series, *id)),
            IonType::BLikeDoubleFragmentation => None,
        })
    }

    /// The id of the double fragmentation type, if registered
    pub fn double_fragmentation(&self) -> Option<usize> {
        self.id(IonType::BLikeDoubleFragmentation)
    }

    /// The number of registered ion types
    pub fn len(&self) -> usize {
        self.ion_types.len()
    }

    /// If no ion type is registered
    pub fn is_empty(&self) -> bool {
        self.ion_types.is_empty()
    }

    fn next_free(&self) -> usize {
        self.ion_types
            .iter()
            .map(|(_, id)| *id)
            .chain(self.named.iter().map(|(_, id)| *id))
            .max()
            .map_or(1, |id| id + 1)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::sync::Arc;

    use xlcore::sequence::{Peptide, Sequence};

    use super::*;

    fn arena(text: &str) -> (FragmentArena, PeptideSlot) {
        let sequence = Arc::new(Sequence::from_text("p", text, &[]).unwrap());
        let mut arena = FragmentArena::default();
        let slot = arena.add_peptide(Peptide::new(sequence, 0, text.len()));
        (arena, slot)
    }

    #[test]
    fn series_masses() {
        let (mut arena, slot) = arena("GAK");
        let peptide_mass = arena.peptide(slot).mass();
        for (series, expected) in [
            (IonSeries::B, vec![57.02146]),
            (IonSeries::A, vec![29.02655]),
            (IonSeries::C, vec![74.04801]),
            (IonSeries::Y, vec![146.10552, 217.14263]),
            (IonSeries::X, vec![172.08478]),
        ] {
            let fragments = series.generate(&mut arena, slot, None);
            assert_eq!(fragments.len(), 2, "{series}");
            for (id, mass) in fragments.iter().zip(expected) {
                assert!(
                    (arena[*id].neutral_mass() - mass).abs() < 1e-3,
                    "{} {}",
                    arena[*id].name(),
                    arena[*id].neutral_mass()
                );
            }
        }
        let whole = IonSeries::Peptide.generate(&mut arena, slot, Some(3));
        assert_eq!(whole.len(), 1);
        assert_eq!(arena[whole[0]].name(), "P");
        assert!((arena[whole[0]].neutral_mass() - peptide_mass).abs() < 1e-9);
        assert_eq!(arena[whole[0]].fragmentation_sites(), 0);
        assert!(arena[whole[0]].is_c_terminal());
    }

    #[test]
    fn immonium_ions() {
        let (mut arena, slot) = arena("KPEPK");
        let ions = IonSeries::Immonium.generate(&mut arena, slot, Some(4));
        let names: Vec<&str> = ions.iter().map(|id| arena[*id].name()).collect();
        assert_eq!(names, vec!["imK", "imP", "imE"]);
        // The lysine immonium ion at 101.1073
        assert!((arena[ions[0]].mz(1) - 101.10732).abs() < 1e-3);
        assert!(ions.iter().all(|id| !arena[*id].is_primary_evidence()));
        assert_eq!(IonType::from_class("immoniumion"), Some(IonType::Series(IonSeries::Immonium)));
    }

    #[test]
    fn internal_fragments() {
        let (mut arena, slot) = arena("PEPTIDE");
        let fragments = double_fragments(&mut arena, slot, Some(9));
        let spans: Vec<(usize, usize)> = fragments
            .iter()
            .map(|id| (arena[*id].start(), arena[*id].length()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (1, 5),
                (1, 4),
                (1, 3),
                (1, 2),
                (2, 4),
                (2, 3),
                (2, 2),
                (3, 3),
                (3, 2),
                (4, 2)
            ]
        );
        assert!(
            fragments
                .iter()
                .all(|id| !arena[*id].is_n_terminal() && !arena[*id].is_c_terminal())
        );
        assert_eq!(arena[fragments[0]].name(), "dbl_2_5");
        assert_eq!(arena[fragments[0]].fragmentation_sites(), 2);
    }

    #[test]
    fn registry_ids() {
        let mut registry = IonTypeRegistry::default();
        assert_eq!(registry.register(IonType::Series(IonSeries::B), None), 1);
        assert_eq!(registry.register(IonType::Series(IonSeries::Y), Some(5)), 5);
        assert_eq!(registry.register_named("H2O", None), 6);
        assert_eq!(registry.register(IonType::Series(IonSeries::B), None), 1);
        assert_eq!(registry.register_named("h2o", None), 6);
        assert_eq!(registry.double_fragmentation(), None);
        registry.register(IonType::BLikeDoubleFragmentation, None);
        assert_eq!(registry.double_fragmentation(), Some(7));
        assert_eq!(
            registry.series().collect::<Vec<_>>(),
            vec![(IonSeries::B, 1), (IonSeries::Y, 5)]
        );
        assert_eq!(IonType::from_class("yion"), Some(IonType::Series(IonSeries::Y)));
        assert_eq!(IonType::BLikeDoubleFragmentation.class(), "BLikeDoubleFragmentation");
    }
}
