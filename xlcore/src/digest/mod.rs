mod lookup;
mod multi_step;
mod protease;

pub use lookup::*;
pub use multi_step::*;
pub use protease::*;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use context_error::{BoxedError, Context};
use itertools::Itertools;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    arguments::Arguments,
    crosslinker::CrossLinker,
    error::{ConfigurationError, ConfigurationErrorKind},
    helper_functions::split_list,
    sequence::{AminoAcid, IsAminoAcid, ModifiedAminoAcid, Peptide, Residue, Sequence},
};

/// The limits applied while digesting.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DigestionSettings {
    /// The maximal number of cleavage sites a peptide may span
    pub max_missed_cleavages: usize,
    /// Shorter peptides are discarded
    pub min_peptide_length: usize,
    /// The maximal number of expected modifications placed on one peptide at the same time
    pub max_modifications_per_peptide: usize,
    /// Once this many modified variants of one peptide are generated no further modification
    /// counts are tried
    pub max_modified_peptides_per_peptide: usize,
}

impl Default for DigestionSettings {
    fn default() -> Self {
        Self {
            max_missed_cleavages: 0,
            min_peptide_length: 1,
            max_modifications_per_peptide: 3,
            max_modified_peptides_per_peptide: 20,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct LengthStatistics {
    average: f64,
    peptides: usize,
}

impl Default for LengthStatistics {
    fn default() -> Self {
        Self {
            average: 9.0,
            peptides: 0,
        }
    }
}

/// A single enzymatic digestion. A digestion without any protease does not cut at all and
/// yields the full sequence.
#[derive(Debug)]
pub struct Digestion {
    name: String,
    proteases: Vec<Protease>,
    settings: DigestionSettings,
    /// Running average of the peptide length, only used to size allocations
    statistics: Mutex<LengthStatistics>,
}

impl Clone for Digestion {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            proteases: self.proteases.clone(),
            settings: self.settings,
            statistics: Mutex::new(self.statistics()),
        }
    }
}

impl PartialEq for Digestion {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.proteases == other.proteases
            && self.settings == other.settings
    }
}

/// The state of one scan over a sequence
struct Scan<'a> {
    base: &'a Peptide,
    max_mass: f64,
    /// If the first residue of the scanned sequence is itself a cleavage site
    n_terminal_site: bool,
    /// Starts of the previous segments that can still be joined by a missed cleavage
    missed: VecDeque<usize>,
    result: Vec<Peptide>,
}

impl Digestion {
    /// Create a digestion with a single protease
    pub fn new(name: impl Into<String>, protease: Protease, settings: DigestionSettings) -> Self {
        Self::with_proteases(name, vec![protease], settings)
    }

    /// Create a digestion that cuts wherever any of the proteases cuts
    pub fn with_proteases(
        name: impl Into<String>,
        proteases: Vec<Protease>,
        settings: DigestionSettings,
    ) -> Self {
        Self {
            name: name.into(),
            proteases,
            settings,
            statistics: Mutex::new(LengthStatistics::default()),
        }
    }

    /// Create a digestion that does not cut at all
    pub fn none(name: impl Into<String>, settings: DigestionSettings) -> Self {
        Self::with_proteases(name, Vec::new(), settings)
    }

    /// The name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cleavage rules
    pub fn proteases(&self) -> &[Protease] {
        &self.proteases
    }

    /// The settings
    pub const fn settings(&self) -> &DigestionSettings {
        &self.settings
    }

    /// Replace the settings
    pub const fn apply_settings(&mut self, settings: DigestionSettings) {
        self.settings = settings;
    }

    /// Set the number of missed cleavages
    pub const fn set_max_missed_cleavages(&mut self, max: usize) {
        self.settings.max_missed_cleavages = max;
    }

    /// The running average length of the generated peptides
    pub fn average_peptide_length(&self) -> f64 {
        self.statistics().average
    }

    fn statistics(&self) -> LengthStatistics {
        *self
            .statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// If any protease cuts after the given position
    pub fn is_cleavage_site(&self, residues: &[AminoAcid], position: usize) -> bool {
        self.proteases
            .iter()
            .any(|protease| protease.cleaves_after(residues, position))
    }

    /// If both ends of the peptide lie on a cleavage site or on a terminus of the protein
    pub fn is_digested_peptide(&self, peptide: &Peptide) -> bool {
        let residues = base_residues(peptide.sequence().residues().iter());
        (peptide.is_n_terminal() || self.is_cleavage_site(&residues, peptide.start() - 1))
            && (peptide.is_c_terminal()
                || self.is_cleavage_site(&residues, peptide.start() + peptide.len() - 1))
    }

    /// Digest a sequence into peptides no heavier than `max_mass`. The peptides are added to the
    /// indices and returned.
    pub fn digest(
        &self,
        sequence: &Arc<Sequence>,
        max_mass: f64,
        crosslinkers: &[CrossLinker],
        indices: &mut PeptideIndices,
    ) -> Vec<Peptide> {
        let peptides = whole_sequence(sequence)
            .map(|base| self.candidates(&base, max_mass))
            .unwrap_or_default();
        index_all(&peptides, crosslinkers, indices);
        peptides
    }

    /// Digest an already digested peptide further. The result keeps the missed cleavages of the
    /// peptide when those are more than the newly missed ones.
    pub fn digest_peptide(
        &self,
        peptide: &Peptide,
        max_mass: f64,
        crosslinkers: &[CrossLinker],
        indices: &mut PeptideIndices,
    ) -> Vec<Peptide> {
        let peptides = self.candidates(peptide, max_mass);
        index_all(&peptides, crosslinkers, indices);
        peptides
    }

    /// All peptides for the base, without indexing them
    pub(crate) fn candidates(&self, base: &Peptide, max_mass: f64) -> Vec<Peptide> {
        if max_mass <= 0.0 || base.is_empty() {
            return Vec::new();
        }
        let residues = base_residues(base.residues());
        let missed = self.settings.max_missed_cleavages;
        let expected = (base.len() as f64 / self.average_peptide_length()) as usize + 1;
        let mut scan = Scan {
            base,
            max_mass,
            n_terminal_site: self.is_cleavage_site(&residues, 0),
            missed: VecDeque::with_capacity(missed + 1),
            result: Vec::with_capacity(expected * (missed + 1)),
        };

        if self.proteases.is_empty() {
            if base.len() > 1 && base.mass() <= max_mass {
                self.add_peptide(&mut scan, base.clone(), true);
            }
        } else {
            let mut start = 0;
            for position in 0..residues.len() {
                if self.is_cleavage_site(&residues, position) {
                    self.add_segment(&mut scan, start, position + 1, true);
                    start = position + 1;
                }
            }
            if start < residues.len() {
                self.add_segment(&mut scan, start, residues.len(), false);
            }
        }

        let result = scan.result;
        if !result.is_empty() {
            let total: usize = result.iter().map(Peptide::len).sum();
            let mut statistics = self
                .statistics
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            statistics.average = statistics.average.mul_add(statistics.peptides as f64, total as f64)
                / (statistics.peptides + result.len()) as f64;
            statistics.peptides += result.len();
        }
        debug!(
            digestion = self.name,
            sequence = base.sequence().header(),
            peptides = result.len(),
            "digested"
        );
        result
    }

    /// Add the segment `start..end` and all peptides reaching back over missed cleavages. When
    /// the segment itself is too heavy every longer peptide is as well so the missed cleavage
    /// window is emptied.
    fn add_segment(&self, scan: &mut Scan<'_>, start: usize, end: usize, retain: bool) {
        let peptide = scan.base.sub_peptide(start, end - start);
        if peptide.mass() > scan.max_mass {
            trace!(peptide = %peptide, "segment above the mass limit");
            scan.missed.clear();
            return;
        }
        self.add_peptide(scan, peptide, true);

        let previous: Vec<usize> = scan.missed.iter().copied().collect();
        for (index, previous_start) in previous.iter().enumerate() {
            let mut peptide = scan.base.sub_peptide(*previous_start, end - previous_start);
            peptide.set_missed_cleavages(
                (previous.len() - index).max(scan.base.missed_cleavages()),
            );
            if peptide.mass() <= scan.max_mass {
                self.add_peptide(scan, peptide, true);
            }
        }

        if retain {
            scan.missed.push_back(start);
            if scan.missed.len() > self.settings.max_missed_cleavages {
                scan.missed.pop_front();
            }
        }
    }

    /// Check and add a single candidate. With `extra_check` the candidate is also considered
    /// without its initiator methionine and expanded into its expected modification variants.
    fn add_peptide(&self, scan: &mut Scan<'_>, peptide: Peptide, extra_check: bool) {
        if !peptide.is_valid() || peptide.len() < self.settings.min_peptide_length {
            trace!(peptide = %peptide, mass = peptide.mass(), "discarded peptide");
            return;
        }

        if extra_check
            && peptide.is_protein_n_terminal()
            && peptide.len() > 1
            && *peptide.residue_at(0) == Residue::Plain(AminoAcid::Methionine)
            && !scan.n_terminal_site
        {
            let excised = peptide
                .sub_peptide(1, peptide.len() - 1)
                .with_forced_n_terminal();
            self.add_peptide(scan, excised, true);
        }

        if extra_check {
            let variants = self.modified_variants(&peptide);
            if !variants.is_empty() {
                for variant in variants {
                    self.add_peptide(scan, variant, false);
                }
                return;
            }
        }

        scan.result.push(peptide);
    }

    /// All variants of the peptide with one up to the maximal number of expected modifications
    /// placed. Increasing numbers of modifications are tried until the variant limit is reached.
    fn modified_variants(&self, peptide: &Peptide) -> Vec<Peptide> {
        let start = peptide.start();
        let sites: Vec<(usize, &[Residue])> = peptide
            .sequence()
            .expected_modifications_in(start..start + peptide.len())
            .filter(|(_, alternatives)| !alternatives.is_empty())
            .map(|(position, alternatives)| (position - start, alternatives))
            .collect();

        let mut variants = Vec::new();
        for count in 1..=self.settings.max_modifications_per_peptide.min(sites.len()) {
            for chosen in sites.iter().combinations(count) {
                let mut branches = vec![peptide.clone()];
                for (position, alternatives) in chosen {
                    branches = branches
                        .iter()
                        .flat_map(|branch| {
                            alternatives.iter().map(move |alternative| {
                                if branch.residue_at(*position) == alternative {
                                    branch.clone()
                                } else {
                                    branch.with_modification(*position, alternative.clone())
                                }
                            })
                        })
                        .collect();
                }
                variants.extend(branches);
            }
            if variants.len() >= self.settings.max_modified_peptides_per_peptide {
                break;
            }
        }
        variants.into_iter().unique().collect()
    }
}

/// The base amino acids, cleavage rules do not look at modifications
fn base_residues<'a>(residues: impl Iterator<Item = &'a Residue>) -> Vec<AminoAcid> {
    residues.map(IsAminoAcid::base_amino_acid).collect()
}

/// The full sequence as a peptide, none for an empty sequence
fn whole_sequence(sequence: &Arc<Sequence>) -> Option<Peptide> {
    (!sequence.is_empty()).then(|| Peptide::new(sequence.clone(), 0, sequence.len()))
}

fn index_all(peptides: &[Peptide], crosslinkers: &[CrossLinker], indices: &mut PeptideIndices) {
    for peptide in peptides {
        indices.add(peptide, crosslinkers);
    }
}

/// A configured digestion, either a single digestion or several combined
#[derive(Clone, Debug, PartialEq)]
pub enum DigestionMethod {
    /// One digestion
    Single(Digestion),
    /// Several digestions applied in steps
    MultiStep(MultiStepDigest),
}

/// Builds a digestion method from the arguments of a configuration line
pub type DigestionParser =
    fn(&str, &[ModifiedAminoAcid]) -> Result<DigestionMethod, ConfigurationError>;

/// All known digestion classes with their parser
pub const DIGESTION_CLASSES: &[(&str, DigestionParser)] = &[
    ("PostAAConstrainedDigestion", parse_post_aa_constrained),
    ("PostAADigestion", parse_post_aa),
    ("AAConstrainedDigestion", parse_aa_constrained),
    ("NoDigestion", parse_no_digestion),
    ("UnspecificDigestion", parse_unspecific),
    ("MultiStepDigest", MultiStepDigest::parse_method),
];

impl DigestionMethod {
    /// Build a digestion from a configuration class name and its arguments
    /// # Errors
    /// If the class is unknown or the arguments are invalid.
    pub fn parse(
        class: &str,
        arguments: &str,
        known: &[ModifiedAminoAcid],
    ) -> Result<Self, ConfigurationError> {
        let (_, parser) = DIGESTION_CLASSES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(class.trim()))
            .ok_or_else(|| {
                BoxedError::new(
                    ConfigurationErrorKind::UnknownClass,
                    "Unknown digestion",
                    format!(
                        "The digestion class '{}' is not known, use one of: {}",
                        class.trim(),
                        DIGESTION_CLASSES.iter().map(|(name, _)| *name).join(", ")
                    ),
                    Context::show(format!("{class}:{arguments}")),
                )
            })?;
        let method = parser(arguments, known)?;
        debug!(class = class.trim(), name = method.name(), "parsed digestion");
        Ok(method)
    }

    /// The name
    pub fn name(&self) -> &str {
        match self {
            Self::Single(digestion) => digestion.name(),
            Self::MultiStep(multi) => multi.name(),
        }
    }

    /// The settings, for a multi step digestion those of the first step
    pub fn settings(&self) -> DigestionSettings {
        match self {
            Self::Single(digestion) => *digestion.settings(),
            Self::MultiStep(multi) => multi.settings(),
        }
    }

    /// Replace the settings of the digestion, for a multi step digestion this sets every step
    /// but keeps the missed cleavages a step was configured with
    pub fn apply_settings(&mut self, settings: DigestionSettings) {
        match self {
            Self::Single(digestion) => digestion.apply_settings(settings),
            Self::MultiStep(multi) => multi.apply_settings(settings),
        }
    }

    /// Set the maximal number of missed cleavages
    pub fn set_max_missed_cleavages(&mut self, max: usize) {
        match self {
            Self::Single(digestion) => digestion.set_max_missed_cleavages(max),
            Self::MultiStep(multi) => multi.set_max_missed_cleavages(max),
        }
    }

    /// If the digestion cuts after the given position
    pub fn is_cleavage_site(&self, residues: &[AminoAcid], position: usize) -> bool {
        match self {
            Self::Single(digestion) => digestion.is_cleavage_site(residues, position),
            Self::MultiStep(multi) => multi.is_cleavage_site(residues, position),
        }
    }

    /// If both ends of the peptide lie on a cleavage site or on a terminus of the protein
    pub fn is_digested_peptide(&self, peptide: &Peptide) -> bool {
        match self {
            Self::Single(digestion) => digestion.is_digested_peptide(peptide),
            Self::MultiStep(multi) => multi.is_digested_peptide(peptide),
        }
    }

    /// Digest a sequence, see [`Digestion::digest`]
    pub fn digest(
        &self,
        sequence: &Arc<Sequence>,
        max_mass: f64,
        crosslinkers: &[CrossLinker],
        indices: &mut PeptideIndices,
    ) -> Vec<Peptide> {
        let peptides = whole_sequence(sequence)
            .map(|base| self.candidates(&base, max_mass))
            .unwrap_or_default();
        index_all(&peptides, crosslinkers, indices);
        peptides
    }

    /// Digest a peptide further, see [`Digestion::digest_peptide`]
    pub fn digest_peptide(
        &self,
        peptide: &Peptide,
        max_mass: f64,
        crosslinkers: &[CrossLinker],
        indices: &mut PeptideIndices,
    ) -> Vec<Peptide> {
        let peptides = self.candidates(peptide, max_mass);
        index_all(&peptides, crosslinkers, indices);
        peptides
    }

    pub(crate) fn candidates(&self, base: &Peptide, max_mass: f64) -> Vec<Peptide> {
        match self {
            Self::Single(digestion) => digestion.candidates(base, max_mass),
            Self::MultiStep(multi) => multi.candidates(base, max_mass),
        }
    }

    /// Digest a whole database, every sequence on its own worker. Returns the merged indices.
    #[cfg(feature = "rayon")]
    pub fn digest_all(
        &self,
        sequences: &[Arc<Sequence>],
        max_mass: f64,
        crosslinkers: &[CrossLinker],
    ) -> PeptideIndices {
        let indices = sequences
            .par_iter()
            .fold(PeptideIndices::default, |mut indices, sequence| {
                self.digest(sequence, max_mass, crosslinkers, &mut indices);
                indices
            })
            .reduce(PeptideIndices::default, |mut a, b| {
                a.merge(b);
                a
            });
        debug!(
            sequences = sequences.len(),
            crosslinkable = indices.crosslinkable.len(),
            linear = indices.linear.len(),
            "digested database"
        );
        indices
    }

    /// Digest a whole database. Returns the merged indices.
    #[cfg(not(feature = "rayon"))]
    pub fn digest_all(
        &self,
        sequences: &[Arc<Sequence>],
        max_mass: f64,
        crosslinkers: &[CrossLinker],
    ) -> PeptideIndices {
        let mut indices = PeptideIndices::default();
        for sequence in sequences {
            self.digest(sequence, max_mass, crosslinkers, &mut indices);
        }
        debug!(
            sequences = sequences.len(),
            crosslinkable = indices.crosslinkable.len(),
            linear = indices.linear.len(),
            "digested database"
        );
        indices
    }
}

impl From<Digestion> for DigestionMethod {
    fn from(value: Digestion) -> Self {
        Self::Single(value)
    }
}

impl From<MultiStepDigest> for DigestionMethod {
    fn from(value: MultiStepDigest) -> Self {
        Self::MultiStep(value)
    }
}

/// Read a list of residues, modified residues count as their base amino acid
fn residue_list(
    list: &str,
    known: &[ModifiedAminoAcid],
    text: &str,
) -> Result<Vec<AminoAcid>, ConfigurationError> {
    split_list(list)
        .into_iter()
        .map(|symbol| {
            Residue::from_symbol(symbol, known)
                .map(|residue| residue.base_amino_acid())
                .ok_or_else(|| {
                    BoxedError::new(
                        ConfigurationErrorKind::InvalidResidue,
                        "Unknown residue",
                        format!("The residue '{symbol}' is not an amino acid or a known modified residue"),
                        Context::show(text.to_string()),
                    )
                })
        })
        .collect()
}

fn required_residues(
    arguments: &Arguments<'_>,
    value: Option<&str>,
    key: &str,
    known: &[ModifiedAminoAcid],
) -> Result<Vec<AminoAcid>, ConfigurationError> {
    let residues = residue_list(value.unwrap_or_default(), known, arguments.text())?;
    if residues.is_empty() {
        Err(BoxedError::new(
            ConfigurationErrorKind::MissingArgument,
            "Missing residues",
            format!("The digestion needs at least one residue in '{key}'"),
            Context::show(arguments.text().to_string()),
        ))
    } else {
        Ok(residues)
    }
}

fn optional_residues(
    arguments: &Arguments<'_>,
    value: Option<&str>,
    known: &[ModifiedAminoAcid],
) -> Result<Vec<AminoAcid>, ConfigurationError> {
    value.map_or_else(
        || Ok(Vec::new()),
        |list| residue_list(list, known, arguments.text()),
    )
}

fn digestion_name(arguments: &Arguments<'_>, default: &str) -> String {
    arguments
        .get_prefixed("NAME")
        .unwrap_or(default)
        .to_string()
}

/// `DIGESTED:K,R;CONSTRAINING:P;NAME:Trypsin`, cuts after the digested residues unless followed
/// by a constraining residue
fn parse_post_aa_constrained(
    text: &str,
    known: &[ModifiedAminoAcid],
) -> Result<DigestionMethod, ConfigurationError> {
    let arguments = Arguments::parse(text);
    let digested = required_residues(
        &arguments,
        arguments.get_prefixed("DIGESTED"),
        "DIGESTED",
        known,
    )?;
    let constraining = optional_residues(&arguments, arguments.get_prefixed("CONSTRAINING"), known)?;
    Ok(Digestion::new(
        digestion_name(&arguments, "PostAAConstrainedDigestion"),
        Protease::after_unless_followed_by(digested, &constraining),
        DigestionSettings::default(),
    )
    .into())
}

/// `DIGESTED:K;NAME:LysC`, cuts after the digested residues
fn parse_post_aa(
    text: &str,
    known: &[ModifiedAminoAcid],
) -> Result<DigestionMethod, ConfigurationError> {
    let arguments = Arguments::parse(text);
    let digested = required_residues(
        &arguments,
        arguments.get_prefixed("DIGESTED"),
        "DIGESTED",
        known,
    )?;
    Ok(Digestion::new(
        digestion_name(&arguments, "PostAADigestion"),
        Protease::after(digested),
        DigestionSettings::default(),
    )
    .into())
}

/// `CTERMDIGEST:K,R;CTERMDIGESTCONSTRAINT:P;NTERMDIGEST:D;NTERMDIGESTCONSTRAINT:E`, cuts after
/// the C-terminal digest residues unless followed by a constraint and before the N-terminal
/// digest residues unless preceded by a constraint
fn parse_aa_constrained(
    text: &str,
    known: &[ModifiedAminoAcid],
) -> Result<DigestionMethod, ConfigurationError> {
    let arguments = Arguments::parse(text);
    let c_term = optional_residues(&arguments, arguments.get("CTERMDIGEST"), known)?;
    let n_term = optional_residues(&arguments, arguments.get("NTERMDIGEST"), known)?;
    let c_constraint = optional_residues(&arguments, arguments.get("CTERMDIGESTCONSTRAINT"), known)?;
    let n_constraint = optional_residues(&arguments, arguments.get("NTERMDIGESTCONSTRAINT"), known)?;
    if c_term.is_empty() && n_term.is_empty() {
        return Err(BoxedError::new(
            ConfigurationErrorKind::MissingArgument,
            "Missing residues",
            "The digestion needs residues in 'CTERMDIGEST' or 'NTERMDIGEST'",
            Context::show(text.to_string()),
        ));
    }
    let mut proteases = Vec::new();
    if !c_term.is_empty() {
        proteases.push(Protease::after_unless_followed_by(c_term, &c_constraint));
    }
    if !n_term.is_empty() {
        proteases.push(Protease::before_unless_preceded_by(n_term, &n_constraint));
    }
    Ok(Digestion::with_proteases(
        digestion_name(&arguments, "AAConstrainedDigestion"),
        proteases,
        DigestionSettings::default(),
    )
    .into())
}

fn parse_no_digestion(
    text: &str,
    _known: &[ModifiedAminoAcid],
) -> Result<DigestionMethod, ConfigurationError> {
    let arguments = Arguments::parse(text);
    Ok(Digestion::none(
        digestion_name(&arguments, "NoDigestion"),
        DigestionSettings::default(),
    )
    .into())
}

/// `NAME:unspecific`, cuts after every residue so the peptides are limited by the missed
/// cleavages only
fn parse_unspecific(
    text: &str,
    _known: &[ModifiedAminoAcid],
) -> Result<DigestionMethod, ConfigurationError> {
    let arguments = Arguments::parse(text);
    Ok(Digestion::new(
        digestion_name(&arguments, "UnspecificDigestion"),
        Protease::unspecific(),
        DigestionSettings::default(),
    )
    .into())
}
