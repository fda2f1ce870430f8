use std::ops::{Index, Range};

use serde::{Deserialize, Serialize};
use xlcore::{chemistry, crosslinker::LinkableSequence, sequence::Peptide, sequence::Residue};

use super::IonSeries;

/// A handle to a peptide stored in a [`FragmentArena`]
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct PeptideSlot(usize);

impl PeptideSlot {
    /// The position in the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A handle to a fragment stored in a [`FragmentArena`]
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct FragmentId(usize);

impl FragmentId {
    /// The position in the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Where the mass change of a loss comes from
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum LossSource {
    /// Loss of a small molecule from eligible residues or termini
    AminoAcid,
    /// Loss of (part of) the cross-linker
    CrossLinker,
    /// One side of a cross-linked fragment that kept the cross-linker while the other side was
    /// lost, optionally with the immonium ion of the lost side still attached
    CrossLinkerModified {
        /// The surviving side
        side: FragmentId,
        /// If the immonium ion of the lost side is still attached
        immonium: bool,
    },
    /// One side of a cross-linked fragment on its own, both the cross-linker and the other
    /// side were lost
    Rest {
        /// The surviving side
        side: FragmentId,
    },
    /// The immonium ion of a residue of the peptide, the mass is set by the rule
    Immonium,
}

/// One step in a chain of losses
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct LossStep {
    /// The fragment this loss is taken from, possibly a loss itself
    pub parent: FragmentId,
    /// The closest ancestor that is not a loss
    pub base: FragmentId,
    /// The id of the loss rule
    pub loss_id: usize,
    /// How many times the loss happened in this step
    pub count: usize,
    /// The mass added to the parent, negative for a real loss
    pub delta: f64,
    /// What is lost
    pub source: LossSource,
}

/// How a fragment came to be
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum FragmentKind {
    /// A fragment of one of the primary ion series, or the whole peptide
    Primary(IonSeries),
    /// An internal fragment from two backbone breaks
    DoubleFragmentation,
    /// Two fragments of different peptides joined by a cross-linker
    CrossLinked {
        /// The side this fragment is named after
        base: FragmentId,
        /// The other side
        other: FragmentId,
    },
    /// A fragment of a peptide linked to itself. Either one fragment containing both link
    /// sites, or an N-terminal and a C-terminal fragment held together by the link.
    LoopLinked {
        /// The (N-terminal) fragment
        first: FragmentId,
        /// The C-terminal fragment, if the loop was broken twice
        second: Option<FragmentId>,
    },
    /// A loss from another fragment
    Loss(LossStep),
    /// A fragment carrying the stub of a cleaved cross-linker
    Stub {
        /// The fragment carrying the stub
        parent: FragmentId,
    },
}

/// A theoretical fragment. Created by fragment generation and never changed afterwards.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Fragment {
    id: FragmentId,
    peptide: PeptideSlot,
    start: usize,
    length: usize,
    ends_peptide: bool,
    neutral_mass: f64,
    mass_difference: f64,
    kind: FragmentKind,
    name: String,
    ion_type: Option<usize>,
    fragmentation_sites: usize,
    total_loss_count: usize,
    contains_crosslinker: bool,
}

impl Fragment {
    /// The handle of this fragment
    pub const fn id(&self) -> FragmentId {
        self.id
    }

    /// The peptide the fragment (or for a cross-linked fragment its base side) comes from
    pub const fn peptide(&self) -> PeptideSlot {
        self.peptide
    }

    /// The first residue, relative to the peptide
    pub const fn start(&self) -> usize {
        self.start
    }

    /// The number of residues
    pub const fn length(&self) -> usize {
        self.length
    }

    /// The residue positions in the peptide
    pub const fn span(&self) -> Range<usize> {
        self.start..self.start + self.length
    }

    /// The neutral mass
    pub const fn neutral_mass(&self) -> f64 {
        self.neutral_mass
    }

    /// The mass difference to the plain residue masses of the span
    pub const fn mass_difference(&self) -> f64 {
        self.mass_difference
    }

    /// The m/z at the given charge
    pub fn mz(&self, charge: usize) -> f64 {
        chemistry::mz(self.neutral_mass, charge)
    }

    /// How this fragment came to be
    pub const fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    /// The name, like `b3`, `y4_H2Ox2` or `b2+P`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id of the ion type, if the type is registered
    pub const fn ion_type(&self) -> Option<usize> {
        self.ion_type
    }

    /// If this is a loss
    pub const fn is_loss(&self) -> bool {
        matches!(self.kind, FragmentKind::Loss(_))
    }

    /// If a match of this fragment is primary evidence, so not a loss and at most one backbone
    /// break
    pub const fn is_primary_evidence(&self) -> bool {
        !self.is_loss() && self.fragmentation_sites <= 1
    }

    /// The loss step, if this is a loss
    pub const fn loss(&self) -> Option<&LossStep> {
        match &self.kind {
            FragmentKind::Loss(step) => Some(step),
            _ => None,
        }
    }

    /// The fragment matches are grouped under: itself for a fragment that is not a loss,
    /// otherwise the closest ancestor that is not a loss
    pub const fn base(&self) -> FragmentId {
        match &self.kind {
            FragmentKind::Loss(step) => step.base,
            _ => self.id,
        }
    }

    /// The fragment a loss is taken from
    pub const fn parent(&self) -> Option<FragmentId> {
        match &self.kind {
            FragmentKind::Loss(step) => Some(step.parent),
            _ => None,
        }
    }

    /// The number of losses in the last step, 0 if this is not a loss
    pub const fn loss_count(&self) -> usize {
        match &self.kind {
            FragmentKind::Loss(step) => step.count,
            _ => 0,
        }
    }

    /// The number of losses over the whole chain
    pub const fn total_loss_count(&self) -> usize {
        self.total_loss_count
    }

    /// The number of backbone breaks needed to form this fragment, 0 for the whole peptide
    pub const fn fragmentation_sites(&self) -> usize {
        self.fragmentation_sites
    }

    /// If the fragment contains the N-terminus of its peptide
    pub const fn is_n_terminal(&self) -> bool {
        self.start == 0
    }

    /// If the fragment contains the C-terminus of its peptide
    pub const fn is_c_terminal(&self) -> bool {
        self.ends_peptide
    }

    /// If the fragment carries (part of) a cross-linker
    pub const fn contains_crosslinker(&self) -> bool {
        self.contains_crosslinker
    }

    /// If this is the whole peptide ion
    pub const fn is_peptide_ion(&self) -> bool {
        matches!(self.kind, FragmentKind::Primary(IonSeries::Peptide))
    }

    /// If this is an immonium ion, of a single residue or made by an immonium rule
    pub const fn is_immonium(&self) -> bool {
        matches!(
            self.kind,
            FragmentKind::Primary(IonSeries::Immonium)
                | FragmentKind::Loss(LossStep {
                    source: LossSource::Immonium,
                    ..
                })
        )
    }

    /// If this is one of the two sides left over from a cross-linked fragment, these are
    /// never combined again
    pub const fn is_cross_linker_modified(&self) -> bool {
        matches!(
            self.kind,
            FragmentKind::Loss(LossStep {
                source: LossSource::CrossLinkerModified { .. } | LossSource::Rest { .. },
                ..
            })
        )
    }
}

/// The fragment to be added to an arena
#[derive(Clone, Debug)]
pub(crate) struct NewFragment {
    pub(crate) peptide: PeptideSlot,
    pub(crate) start: usize,
    pub(crate) length: usize,
    pub(crate) neutral_mass: f64,
    pub(crate) kind: FragmentKind,
    pub(crate) name: String,
    pub(crate) ion_type: Option<usize>,
}

/// Owns all peptides and fragments of a search.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FragmentArena {
    peptides: Vec<Peptide>,
    fragments: Vec<Fragment>,
}

impl FragmentArena {
    /// Store a peptide to generate fragments for
    pub fn add_peptide(&mut self, peptide: Peptide) -> PeptideSlot {
        self.peptides.push(peptide);
        PeptideSlot(self.peptides.len() - 1)
    }

    /// The peptide in the given slot
    pub fn peptide(&self, slot: PeptideSlot) -> &Peptide {
        &self.peptides[slot.0]
    }

    /// The fragment with the given id, if it exists
    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0)
    }

    /// The number of fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// If there are no fragments
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// All fragments in the order they were created
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Fragment> {
        self.fragments.iter()
    }

    /// Forget all fragments and peptides
    pub fn clear(&mut self) {
        self.peptides.clear();
        self.fragments.clear();
    }

    pub(crate) fn push(&mut self, new: NewFragment) -> FragmentId {
        let id = FragmentId(self.fragments.len());
        let peptide = &self.peptides[new.peptide.0];
        let end = new.start + new.length;
        let mass_difference = new.neutral_mass - peptide.residue_mass(new.start..end);
        let ends_peptide = end == peptide.len();
        let (fragmentation_sites, total_loss_count, contains_crosslinker) = match &new.kind {
            FragmentKind::Primary(IonSeries::Peptide) => (0, 0, false),
            FragmentKind::Primary(IonSeries::Immonium) => (2, 0, false),
            FragmentKind::Primary(_) => (1, 0, false),
            FragmentKind::DoubleFragmentation => (2, 0, false),
            FragmentKind::CrossLinked { base, other } => (
                self[*base].fragmentation_sites + self[*other].fragmentation_sites,
                0,
                true,
            ),
            FragmentKind::LoopLinked { first, second } => (
                self[*first].fragmentation_sites
                    + second.map_or(0, |second| self[second].fragmentation_sites),
                0,
                true,
            ),
            FragmentKind::Loss(step) => {
                let parent = &self[step.parent];
                match step.source {
                    LossSource::CrossLinkerModified { side, .. } => {
                        (self[side].fragmentation_sites, step.count, true)
                    }
                    LossSource::Rest { side } => (self[side].fragmentation_sites, step.count, false),
                    LossSource::Immonium => (2, step.count + parent.total_loss_count, false),
                    LossSource::AminoAcid | LossSource::CrossLinker => (
                        parent.fragmentation_sites,
                        step.count + parent.total_loss_count,
                        parent.contains_crosslinker,
                    ),
                }
            }
            FragmentKind::Stub { parent } => (self[*parent].fragmentation_sites, 0, true),
        };
        self.fragments.push(Fragment {
            id,
            peptide: new.peptide,
            start: new.start,
            length: new.length,
            ends_peptide,
            neutral_mass: new.neutral_mass,
            mass_difference,
            kind: new.kind,
            name: new.name,
            ion_type: new.ion_type,
            fragmentation_sites,
            total_loss_count,
            contains_crosslinker,
        });
        id
    }

    /// Add a loss of the parent. The span is that of the parent, or of the surviving side for
    /// the leftovers of a cross-linked fragment.
    pub(crate) fn push_loss(
        &mut self,
        parent: FragmentId,
        loss_id: usize,
        count: usize,
        delta: f64,
        source: LossSource,
        name: String,
    ) -> FragmentId {
        let parent_fragment = &self[parent];
        let span_of = match source {
            LossSource::CrossLinkerModified { side, .. } | LossSource::Rest { side } => &self[side],
            LossSource::AminoAcid | LossSource::CrossLinker | LossSource::Immonium => {
                parent_fragment
            }
        };
        let new = NewFragment {
            peptide: span_of.peptide,
            start: span_of.start,
            length: span_of.length,
            neutral_mass: parent_fragment.neutral_mass + delta,
            kind: FragmentKind::Loss(LossStep {
                parent,
                base: parent_fragment.base(),
                loss_id,
                count,
                delta,
                source,
            }),
            name,
            ion_type: parent_fragment.ion_type,
        };
        self.push(new)
    }

    /// The `(loss id, count)` of every step in the loss chain, starting with the last step
    pub fn loss_ids(&self, id: FragmentId) -> Vec<(usize, usize)> {
        let mut result = Vec::new();
        let mut current = &self[id];
        while let FragmentKind::Loss(step) = &current.kind {
            result.push((step.loss_id, step.count));
            current = &self[step.parent];
        }
        result
    }

    /// Count the residues matching the predicate, for a cross-linked fragment this counts on
    /// both sides
    pub fn count_residues(&self, id: FragmentId, matches: &impl Fn(&Residue) -> bool) -> usize {
        let fragment = &self[id];
        match &fragment.kind {
            FragmentKind::CrossLinked { base, other } => {
                self.count_residues(*base, matches) + self.count_residues(*other, matches)
            }
            FragmentKind::LoopLinked { first, second } => {
                self.count_residues(*first, matches)
                    + second.map_or(0, |second| self.count_residues(second, matches))
            }
            FragmentKind::Loss(step) => match step.source {
                LossSource::CrossLinkerModified { side, .. } | LossSource::Rest { side } => {
                    self.count_residues(side, matches)
                }
                LossSource::AminoAcid | LossSource::CrossLinker | LossSource::Immonium => {
                    self.count_residues(step.parent, matches)
                }
            },
            FragmentKind::Stub { parent } => self.count_residues(*parent, matches),
            FragmentKind::Primary(_) | FragmentKind::DoubleFragmentation => self
                .peptide(fragment.peptide)
                .count_residues(fragment.span(), matches),
        }
    }

    /// A view on the residues of the fragment, used to check cross-linker sites
    pub(crate) fn span(&self, id: FragmentId) -> FragmentSpan<'_> {
        let fragment = &self[id];
        FragmentSpan {
            peptide: self.peptide(fragment.peptide),
            start: fragment.start,
            length: fragment.length,
        }
    }
}

impl Index<FragmentId> for FragmentArena {
    type Output = Fragment;
    fn index(&self, index: FragmentId) -> &Self::Output {
        &self.fragments[index.0]
    }
}

/// The residues of a fragment with the termini of the protein they carry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FragmentSpan<'a> {
    peptide: &'a Peptide,
    start: usize,
    length: usize,
}

impl FragmentSpan<'_> {
    /// If the peptide position lies in this span
    pub(crate) const fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.start + self.length
    }
}

impl LinkableSequence for FragmentSpan<'_> {
    fn link_len(&self) -> usize {
        self.length
    }
    fn link_residue(&self, site: usize) -> &Residue {
        self.peptide.residue_at(self.start + site)
    }
    fn link_n_terminal(&self) -> bool {
        self.start == 0 && self.peptide.is_n_terminal()
    }
    fn link_c_terminal(&self) -> bool {
        self.start + self.length == self.peptide.len() && self.peptide.is_c_terminal()
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use xlcore::{chemistry::WATER_MASS, sequence::Sequence};

    use super::*;

    fn arena(text: &str) -> (FragmentArena, PeptideSlot) {
        let sequence = Arc::new(Sequence::from_text("p", text, &[]).unwrap());
        let mut arena = FragmentArena::default();
        let slot = arena.add_peptide(Peptide::new(sequence, 0, text.len()));
        (arena, slot)
    }

    #[test]
    fn loss_chain() {
        let (mut arena, slot) = arena("PEPTIDE");
        let y = IonSeries::Y.generate(&mut arena, slot, Some(2));
        let y3 = y[2];
        assert_eq!(arena[y3].name(), "y3");
        let first = arena.push_loss(y3, 7, 1, -WATER_MASS, LossSource::AminoAcid, "a".into());
        let second = arena.push_loss(first, 8, 2, -2.0, LossSource::AminoAcid, "b".into());
        assert_eq!(arena[second].base(), y3);
        assert_eq!(arena[second].parent(), Some(first));
        assert_eq!(arena[second].total_loss_count(), 3);
        assert_eq!(arena.loss_ids(second), vec![(8, 2), (7, 1)]);
        assert_eq!(
            arena[second].neutral_mass(),
            arena[first].neutral_mass() - 2.0
        );
        assert_eq!(arena[second].span(), arena[y3].span());
        assert!(arena[second].is_c_terminal());
        assert!(!arena[second].is_n_terminal());
    }

    #[test]
    fn count_and_span() {
        let (mut arena, slot) = arena("TESTK");
        let b = IonSeries::B.generate(&mut arena, slot, None);
        let b4 = b[3];
        let count = arena.count_residues(b4, &|r| matches!(r.to_string().as_str(), "S" | "T"));
        assert_eq!(count, 3);
        let span = arena.span(b4);
        assert_eq!(span.link_len(), 4);
        assert!(span.link_n_terminal());
        assert!(!span.link_c_terminal());
        assert!(span.contains(3));
        assert!(!span.contains(4));
        assert!((arena[b4].mass_difference()).abs() < 1e-9);
    }
}
