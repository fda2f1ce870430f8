use std::collections::BTreeSet;

use context_error::{BoxedError, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::trace;
use xlcore::{
    arguments::{Arguments, parse_number},
    crosslinker::CrossLinker,
    error::{ConfigurationError, ConfigurationErrorKind},
    sequence::IsAminoAcid,
};

use super::{FragmentArena, FragmentId, FragmentKind, IonTypeRegistry, LossSource, NewFragment};

/// The mass of the immonium ion of a lost side that stays attached to the cross-linker
pub const IMMONIUM_MASS: f64 = 81.05784922929;

/// The limits on the number of losses from one fragment
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LossLimits {
    /// The maximal number of times one rule can apply to one fragment
    pub max_losses: usize,
    /// The maximal number of losses over a whole loss chain
    pub max_total_losses: usize,
}

impl Default for LossLimits {
    fn default() -> Self {
        Self {
            max_losses: 4,
            max_total_losses: 8,
        }
    }
}

/// Loss of a small molecule from eligible residues or termini, like water from S, T, D and E.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AminoAcidLoss {
    /// The name, used to build the names of the losses
    pub name: String,
    /// The symbols of the residues that can lose this
    pub residues: BTreeSet<String>,
    /// If the N-terminus of a peptide can lose this
    pub n_terminal: bool,
    /// If the C-terminus of a peptide can lose this
    pub c_terminal: bool,
    /// The mass lost, positive
    pub mass: f64,
    /// The id of the loss
    pub id: usize,
}

impl AminoAcidLoss {
    /// If the other rule describes the same loss, these are merged into one rule
    pub fn same_loss(&self, other: &Self) -> bool {
        self.name == other.name && self.mass.to_bits() == other.mass.to_bits()
    }

    /// Take over the residues and termini of the other rule
    pub fn merge(&mut self, other: &Self) {
        self.residues.extend(other.residues.iter().cloned());
        self.n_terminal |= other.n_terminal;
        self.c_terminal |= other.c_terminal;
    }

    /// The number of times this can be lost from the fragment, bounded by the limits
    pub fn occurrences(&self, arena: &FragmentArena, id: FragmentId, limits: LossLimits) -> usize {
        let fragment = &arena[id];
        if fragment.fragmentation_sites() > 1 {
            return 0;
        }
        let mut count = arena.count_residues(id, &|residue| {
            self.residues.contains(residue.symbol().as_ref())
        });
        if self.c_terminal && fragment.is_c_terminal() {
            count += 1;
        }
        if self.n_terminal && fragment.is_n_terminal() {
            count += 1;
        }
        count
            .min(limits.max_total_losses.saturating_sub(fragment.total_loss_count()))
            .min(limits.max_losses)
    }

    /// A correction adds the mass instead and only applies to fragments with exactly one
    /// backbone break
    fn derive(
        &self,
        arena: &mut FragmentArena,
        fragments: &[FragmentId],
        limits: LossLimits,
        correction: bool,
    ) -> Vec<FragmentId> {
        let sign = if correction { 1.0 } else { -1.0 };
        let mut result = Vec::new();
        for &parent in fragments {
            if correction && arena[parent].fragmentation_sites() != 1 {
                continue;
            }
            let occurrences = self.occurrences(arena, parent, limits);
            for count in 1..=occurrences {
                let name = format!("{}_{}x{count}", arena[parent].name(), self.name);
                result.push(arena.push_loss(
                    parent,
                    self.id,
                    count,
                    sign * self.mass * count as f64,
                    LossSource::AminoAcid,
                    name,
                ));
            }
        }
        result
    }
}

/// The immonium ion of a peptide containing one of the residues, made once per peptide from its
/// whole peptide ion.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ImmoniumLoss {
    /// The name of the ion
    pub name: String,
    /// The symbols of the residues giving this ion
    pub residues: BTreeSet<String>,
    /// Every N-terminal peptide gives this ion
    pub n_terminal: bool,
    /// Every C-terminal peptide gives this ion
    pub c_terminal: bool,
    /// The neutral mass of the ion
    pub mass: f64,
    /// The id of the loss
    pub id: usize,
}

impl ImmoniumLoss {
    fn derive(&self, arena: &mut FragmentArena, fragments: &[FragmentId]) -> Vec<FragmentId> {
        let mut done = Vec::new();
        let mut result = Vec::new();
        for &parent in fragments {
            let fragment = &arena[parent];
            if !fragment.is_peptide_ion() || done.contains(&fragment.peptide()) {
                continue;
            }
            done.push(fragment.peptide());
            let delta = self.mass - fragment.neutral_mass();
            let present = self.n_terminal
                || self.c_terminal
                || arena.count_residues(parent, &|residue| {
                    self.residues.contains(residue.symbol().as_ref())
                }) > 0;
            if present {
                result.push(arena.push_loss(
                    parent,
                    self.id,
                    1,
                    delta,
                    LossSource::Immonium,
                    self.name.clone(),
                ));
            }
        }
        result
    }
}

/// Loss of part of the cross-linker from every fragment carrying one
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CrossLinkerLoss {
    /// The name
    pub name: String,
    /// The mass lost, positive
    pub mass: f64,
    /// The id of the loss
    pub id: usize,
}

impl CrossLinkerLoss {
    fn derive(
        &self,
        arena: &mut FragmentArena,
        fragments: &[FragmentId],
        limits: LossLimits,
    ) -> Vec<FragmentId> {
        fragments
            .iter()
            .copied()
            .filter(|id| {
                let fragment = &arena[*id];
                fragment.contains_crosslinker() && fragment.loss_count() < limits.max_total_losses
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|parent| {
                let name = format!("{}_{}", arena[parent].name(), self.name);
                arena.push_loss(parent, self.id, 1, -self.mass, LossSource::CrossLinker, name)
            })
            .collect()
    }
}

/// A rule that derives losses from fragments
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum LossRule {
    /// Loss from eligible residues or termini
    AminoAcid(AminoAcidLoss),
    /// Mass correction on eligible residues of fragments with a single backbone break
    Correctable(AminoAcidLoss),
    /// The immonium ion of a residue in the peptide
    Immonium(ImmoniumLoss),
    /// Loss from the cross-linker
    CrossLinker(CrossLinkerLoss),
    /// One side of a cross-linked fragment surviving on its own, with or without the
    /// cross-linker
    CrossLinkerModified {
        /// The id of the loss
        id: usize,
    },
}

impl LossRule {
    /// The id of the loss
    pub const fn id(&self) -> usize {
        match self {
            Self::AminoAcid(rule) | Self::Correctable(rule) => rule.id,
            Self::Immonium(rule) => rule.id,
            Self::CrossLinker(rule) => rule.id,
            Self::CrossLinkerModified { id } => *id,
        }
    }

    /// Derive the losses of all given fragments. The cross-linker is needed for the cross-linker
    /// modified sides, these are only made when double fragmentation is allowed or when both
    /// sides are whole peptides.
    pub fn derive(
        &self,
        arena: &mut FragmentArena,
        fragments: &[FragmentId],
        linker: Option<&CrossLinker>,
        limits: LossLimits,
        double_fragmentation: bool,
    ) -> Vec<FragmentId> {
        match self {
            Self::AminoAcid(rule) => rule.derive(arena, fragments, limits, false),
            Self::Correctable(rule) => rule.derive(arena, fragments, limits, true),
            Self::Immonium(rule) => rule.derive(arena, fragments),
            Self::CrossLinker(rule) => rule.derive(arena, fragments, limits),
            Self::CrossLinkerModified { id } => linker.map_or_else(Vec::new, |linker| {
                cross_linker_modified(arena, fragments, linker, *id, double_fragmentation)
            }),
        }
    }
}

/// Apply the rules in order, every rule also sees the losses made by the rules before it. The
/// new losses are added to `fragments`.
pub fn apply_losses(
    rules: &[LossRule],
    arena: &mut FragmentArena,
    fragments: &mut Vec<FragmentId>,
    linker: Option<&CrossLinker>,
    limits: LossLimits,
    double_fragmentation: bool,
) {
    for rule in rules {
        let losses = rule.derive(arena, fragments, linker, limits, double_fragmentation);
        trace!(rule = rule.id(), losses = losses.len(), "derived losses");
        fragments.extend(losses);
    }
}

fn cross_linker_modified(
    arena: &mut FragmentArena,
    fragments: &[FragmentId],
    linker: &CrossLinker,
    id: usize,
    double_fragmentation: bool,
) -> Vec<FragmentId> {
    let mut result = Vec::new();
    for &parent in fragments {
        let FragmentKind::CrossLinked { base, other } = *arena[parent].kind() else {
            continue;
        };
        let base_whole = arena[base].is_peptide_ion();
        let other_whole = arena[other].is_peptide_ion();
        // (surviving side, lost side)
        let sides = match (double_fragmentation, base_whole, other_whole) {
            (_, true, true) => vec![(base, other), (other, base)],
            (true, false, true) => vec![(base, other)],
            (true, true, false) => vec![(other, base)],
            _ => continue,
        };
        let immonium = !double_fragmentation;
        for (side, lost) in sides {
            result.extend(split_side(arena, parent, side, lost, linker, id, immonium));
        }
    }
    result
}

/// The side with the cross-linker, the side on its own and optionally the side with the
/// cross-linker and the immonium ion of the lost side
fn split_side(
    arena: &mut FragmentArena,
    parent: FragmentId,
    side: FragmentId,
    lost: FragmentId,
    linker: &CrossLinker,
    id: usize,
    immonium: bool,
) -> Vec<FragmentId> {
    let parent_mass = arena[parent].neutral_mass();
    let side_mass = arena[side].neutral_mass();
    let linked_mass = side_mass + linker.cross_linked_mass();
    let side_name = arena[side].name().to_string();
    let lost_name = arena[lost].name().to_string();
    let mut variants = vec![
        (
            linked_mass,
            LossSource::CrossLinkerModified {
                side,
                immonium: false,
            },
            format!("{side_name}+({lost_name})"),
        ),
        (
            side_mass,
            LossSource::Rest { side },
            format!("{side_name}(+{lost_name})"),
        ),
    ];
    if immonium {
        variants.push((
            linked_mass + IMMONIUM_MASS,
            LossSource::CrossLinkerModified {
                side,
                immonium: true,
            },
            format!("{side_name}+i({lost_name})"),
        ));
    }
    variants
        .into_iter()
        .map(|(mass, source, name)| arena.push_loss(parent, id, 1, mass - parent_mass, source, name))
        .collect()
}

/// The stub a cleavable cross-linker leaves on a fragment
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StubRule {
    /// The name
    pub name: String,
    /// The mass of the stub
    pub mass: f64,
    /// The ion type id of the stub fragments
    pub id: usize,
}

impl StubRule {
    /// Add a stub fragment for every fragment that does not carry a cross-linker
    pub fn derive(&self, arena: &mut FragmentArena, fragments: &[FragmentId]) -> Vec<FragmentId> {
        fragments
            .iter()
            .copied()
            .filter(|id| !arena[*id].contains_crosslinker())
            .collect::<Vec<_>>()
            .into_iter()
            .map(|parent| {
                let fragment = &arena[parent];
                let new = NewFragment {
                    peptide: fragment.peptide(),
                    start: fragment.start(),
                    length: fragment.length(),
                    neutral_mass: fragment.neutral_mass() + self.mass,
                    kind: FragmentKind::Stub { parent },
                    name: format!("{}_{}", fragment.name(), self.name),
                    ion_type: Some(self.id),
                };
                arena.push(new)
            })
            .collect()
    }
}

/// A loss rule or stub read from a configuration line
#[derive(Clone, Debug, PartialEq)]
pub enum LossDefinition {
    /// A loss rule
    Rule(LossRule),
    /// A cross-linker stub
    Stub(StubRule),
}

/// Builds a loss definition from the arguments of a configuration line
pub type LossParser =
    fn(&Arguments<'_>, &mut IonTypeRegistry) -> Result<LossDefinition, ConfigurationError>;

/// All known loss classes with their parser
pub const LOSS_CLASSES: &[(&str, LossParser)] = &[
    ("AminoAcidRestrictedLoss", parse_amino_acid_loss),
    ("CorrectableAminoAcidRestrictedLoss", parse_correctable_loss),
    ("AminoAcidRestrictedImmonium", parse_immonium),
    ("CrossLinkerRestrictedLoss", parse_cross_linker_loss),
    ("CrosslinkerModified", parse_cross_linker_modified),
    ("CleavableCrossLinkerPeptide", parse_stub),
];

impl LossDefinition {
    /// Build a loss from a configuration class name and its arguments. Ids that are not
    /// configured are taken from the registry.
    /// # Errors
    /// If the class is unknown or the arguments are invalid.
    pub fn parse(
        class: &str,
        arguments: &str,
        ion_types: &mut IonTypeRegistry,
    ) -> Result<Self, ConfigurationError> {
        let (_, parser) = LOSS_CLASSES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(class.trim()))
            .ok_or_else(|| {
                BoxedError::new(
                    ConfigurationErrorKind::UnknownClass,
                    "Unknown loss",
                    format!(
                        "The loss class '{}' is not known, use one of: {}",
                        class.trim(),
                        LOSS_CLASSES.iter().map(|(name, _)| *name).join(", ")
                    ),
                    Context::show(format!("{class}:{arguments}")),
                )
            })?;
        parser(&Arguments::parse(arguments), ion_types)
    }
}

fn required_mass(arguments: &Arguments<'_>) -> Result<f64, ConfigurationError> {
    parse_number(arguments.require("MASS")?, arguments.text())
}

fn residue_set(arguments: &Arguments<'_>) -> BTreeSet<String> {
    arguments
        .get("AMINOACIDS")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `NAME:H20;AMINOACIDS:S,T,D,E;CTERM;MASS:18.01056027;ID:1`
fn parse_amino_acid_loss(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    residue_rule(arguments, ion_types)
        .map(|rule| LossDefinition::Rule(LossRule::AminoAcid(rule)))
}

/// `NAME:ox;AMINOACIDS:M;MASS:15.99491;ID:7`, the mass is added
fn parse_correctable_loss(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    residue_rule(arguments, ion_types)
        .map(|rule| LossDefinition::Rule(LossRule::Correctable(rule)))
}

fn residue_rule(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<AminoAcidLoss, ConfigurationError> {
    let name = arguments.require("NAME")?;
    let residues = residue_set(arguments);
    let n_terminal = arguments.has_flag("NTERM");
    let c_terminal = arguments.has_flag("CTERM");
    if residues.is_empty() && !n_terminal && !c_terminal {
        return Err(BoxedError::new(
            ConfigurationErrorKind::MissingArgument,
            "Missing loss residues",
            "A residue restricted loss needs 'AMINOACIDS', 'NTERM' or 'CTERM'",
            Context::show(arguments.text().to_string()),
        ));
    }
    let mass = required_mass(arguments)?;
    let id = ion_types.register_named(name, arguments.integer("ID")?);
    Ok(AminoAcidLoss {
        name: name.to_string(),
        residues,
        n_terminal,
        c_terminal,
        mass,
        id,
    })
}

/// `NAME:iK;AMINOACIDS:K;MASS:100.10005;ID:8`
fn parse_immonium(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    let name = arguments.require("NAME")?;
    let residues = residue_set(arguments);
    if residues.is_empty() {
        return Err(BoxedError::new(
            ConfigurationErrorKind::MissingArgument,
            "Missing immonium residues",
            "An immonium ion needs 'AMINOACIDS'",
            Context::show(arguments.text().to_string()),
        ));
    }
    let mass = required_mass(arguments)?;
    let id = ion_types.register_named(name, arguments.integer("ID")?);
    Ok(LossDefinition::Rule(LossRule::Immonium(ImmoniumLoss {
        name: name.to_string(),
        residues,
        n_terminal: arguments.has_flag("NTERM"),
        c_terminal: arguments.has_flag("CTERM"),
        mass,
        id,
    })))
}

/// `NAME:xl;MASS:138.06807;ID:4`
fn parse_cross_linker_loss(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    let name = arguments.require("NAME")?;
    let mass = required_mass(arguments)?;
    let id = ion_types.register_named(name, arguments.integer("ID")?);
    Ok(LossDefinition::Rule(LossRule::CrossLinker(CrossLinkerLoss {
        name: name.to_string(),
        mass,
        id,
    })))
}

/// `ID:5`
fn parse_cross_linker_modified(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    let id = ion_types.register_named("CrosslinkerModified", arguments.integer("ID")?);
    Ok(LossDefinition::Rule(LossRule::CrossLinkerModified { id }))
}

/// `NAME:A;MASS:54.01056;ID:6`
fn parse_stub(
    arguments: &Arguments<'_>,
    ion_types: &mut IonTypeRegistry,
) -> Result<LossDefinition, ConfigurationError> {
    let name = arguments.require("NAME")?;
    let mass = required_mass(arguments)?;
    let id = ion_types.register_named(name, arguments.integer("ID")?);
    Ok(LossDefinition::Stub(StubRule {
        name: name.to_string(),
        mass,
        id,
    }))
}
