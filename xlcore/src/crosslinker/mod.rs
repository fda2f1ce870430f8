mod specificity;

pub use specificity::*;

use context_error::{BoxedError, Context};
use serde::{Deserialize, Serialize};

use crate::{
    arguments::{Arguments, parse_number},
    error::{ConfigurationError, ConfigurationErrorKind},
    helper_functions::split_list,
    sequence::{AminoAcid, IsAminoAcid, ModificationKind, ModifiedAminoAcid, Peptide, Residue},
};

/// A cross-linker: a reagent joining two residues, adding its mass to the linked peptides.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CrossLinker {
    name: String,
    id: Option<usize>,
    base_mass: f64,
    cross_linked_mass: f64,
    min_cross_linked_mass: f64,
    max_cross_linked_mass: f64,
    decoy: bool,
    specificity: LinkerSpecificity,
    /// Named masses added to the base mass when the linker reacted on one side and was quenched
    linear_modifications: Vec<(String, f64)>,
    /// Like the linear modifications but also allowed on cross-linked peptides
    modifications: Vec<(String, f64)>,
    /// Named losses from the cross-linker itself
    losses: Vec<(String, f64)>,
    /// Named stubs left on a peptide after a cleavable cross-linker broke
    stubs: Vec<(String, f64)>,
}

/// The signature of the functions that build a cross-linker from its configuration arguments
pub type CrossLinkerParser =
    fn(&Arguments<'_>, &[ModifiedAminoAcid]) -> Result<CrossLinker, ConfigurationError>;

/// All known cross-linker classes with their parser
pub const CROSS_LINKER_CLASSES: &[(&str, CrossLinkerParser)] = &[
    (
        "SymetricSingleAminoAcidRestrictedCrossLinker",
        CrossLinker::parse_symmetric,
    ),
    (
        "AsymetricSingleAminoAcidRestrictedCrossLinker",
        CrossLinker::parse_asymmetric,
    ),
    ("LinearCrosslinker", CrossLinker::parse_linear),
];

impl CrossLinker {
    /// A cross-linker with the same specificity on both ends
    pub fn symmetric(name: impl Into<String>, mass: f64, sites: SiteRestriction) -> Self {
        Self::new(name, mass, LinkerSpecificity::Symmetric(sites))
    }

    /// A cross-linker with different specificities on its ends
    pub fn asymmetric(
        name: impl Into<String>,
        mass: f64,
        first: SiteRestriction,
        second: SiteRestriction,
    ) -> Self {
        Self::new(name, mass, LinkerSpecificity::Asymmetric(first, second))
    }

    /// The sentinel used when only linear peptides should be considered, it never links and
    /// has an infinite mass.
    pub fn linear() -> Self {
        Self::new("LinearCrosslinker", f64::INFINITY, LinkerSpecificity::None)
    }

    fn new(name: impl Into<String>, mass: f64, specificity: LinkerSpecificity) -> Self {
        Self {
            name: name.into(),
            id: None,
            base_mass: mass,
            cross_linked_mass: mass,
            min_cross_linked_mass: mass,
            max_cross_linked_mass: mass,
            decoy: false,
            specificity,
            linear_modifications: Vec::new(),
            modifications: Vec::new(),
            losses: Vec::new(),
            stubs: Vec::new(),
        }
    }

    /// Set the mass added when both ends reacted, if it differs from the base mass
    #[must_use]
    pub fn with_cross_linked_mass(self, mass: f64) -> Self {
        Self {
            cross_linked_mass: mass,
            min_cross_linked_mass: mass,
            max_cross_linked_mass: mass,
            ..self
        }
    }

    /// Mark this as decoy cross-linker
    #[must_use]
    pub fn with_decoy(self, decoy: bool) -> Self {
        Self { decoy, ..self }
    }

    /// Set the database id
    #[must_use]
    pub fn with_id(self, id: usize) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    /// Add named stubs, left behind when a cleavable cross-linker breaks
    #[must_use]
    pub fn with_stubs(mut self, stubs: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.stubs.extend(stubs);
        self
    }

    /// Add named losses of the cross-linker
    #[must_use]
    pub fn with_losses(mut self, losses: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.losses.extend(losses);
        self
    }

    /// The name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database id, if one was configured
    pub const fn id(&self) -> Option<usize> {
        self.id
    }

    /// The mass of the reagent
    pub const fn base_mass(&self) -> f64 {
        self.base_mass
    }

    /// The mass added when two sites are joined
    pub const fn cross_linked_mass(&self) -> f64 {
        self.cross_linked_mass
    }

    /// The lower bound of the cross-linked mass
    pub const fn min_cross_linked_mass(&self) -> f64 {
        self.min_cross_linked_mass
    }

    /// The upper bound of the cross-linked mass
    pub const fn max_cross_linked_mass(&self) -> f64 {
        self.max_cross_linked_mass
    }

    /// If this is a decoy cross-linker
    pub const fn is_decoy(&self) -> bool {
        self.decoy
    }

    /// Where this cross-linker reacts
    pub const fn specificity(&self) -> &LinkerSpecificity {
        &self.specificity
    }

    /// If this is the sentinel that never links
    pub const fn is_linear(&self) -> bool {
        matches!(self.specificity, LinkerSpecificity::None)
    }

    /// Named losses from the cross-linker
    pub fn losses(&self) -> &[(String, f64)] {
        &self.losses
    }

    /// Named stubs of a cleavable cross-linker
    pub fn stubs(&self) -> &[(String, f64)] {
        &self.stubs
    }

    /// The residue symbols either end can react with, empty for unrestricted ends
    fn linked_residues(&self) -> Vec<AminoAcid> {
        let mut residues: Vec<AminoAcid> = self
            .specificity
            .restrictions()
            .into_iter()
            .flat_map(SiteRestriction::residue_weights)
            .filter_map(|(symbol, _)| AminoAcid::try_from(symbol).ok())
            .collect();
        residues.sort();
        residues.dedup();
        residues
    }

    /// The modified residues this cross-linker creates when it reacted on one side only. Each
    /// configured (linear) modification gives one residue per linked amino acid, named as the
    /// amino acid followed by the lower case linker and modification names.
    pub fn derived_residues(&self) -> Vec<ModifiedAminoAcid> {
        let linked = self.linked_residues();
        let make = |list: &[(String, f64)], kind: ModificationKind| {
            list.iter()
                .flat_map(|(name, mass)| {
                    linked.iter().map(move |aa| {
                        ModifiedAminoAcid::new(
                            format!(
                                "{aa}{}{}",
                                self.name.to_lowercase(),
                                name.to_lowercase()
                            ),
                            *aa,
                            self.base_mass + mass,
                            kind,
                        )
                    })
                })
                .collect::<Vec<_>>()
        };
        let mut result = make(&self.modifications, ModificationKind::Variable);
        result.extend(make(&self.linear_modifications, ModificationKind::Linear));
        result
    }

    /// If the site can carry this cross-linker on a peptide. The last residue of a peptide that
    /// does not end the protein can never be linked.
    pub fn can_link_site(&self, peptide: &Peptide, site: usize) -> bool {
        self.specificity.allows(peptide, site, true)
    }

    /// If the site can carry this cross-linker on a fragment, there is no restriction on the
    /// last residue here.
    pub fn can_link_fragment_site(&self, fragment: &impl LinkableSequence, site: usize) -> bool {
        self.specificity.allows(fragment, site, false)
    }

    /// If any site of the peptide can be linked
    pub fn can_cross_link(&self, peptide: &Peptide) -> bool {
        (0..peptide.len()).any(|site| self.can_link_site(peptide, site))
    }

    /// If any site of the fragment can be linked
    pub fn can_cross_link_fragment(&self, fragment: &impl LinkableSequence) -> bool {
        (0..fragment.link_len()).any(|site| self.can_link_fragment_site(fragment, site))
    }

    /// If the two given sites of the peptides can be joined
    pub fn can_cross_link_sites(&self, a: &Peptide, site_a: usize, b: &Peptide, site_b: usize) -> bool {
        self.specificity.allows_pair(a, site_a, b, site_b, true)
    }

    /// If any pair of sites of the two peptides can be joined
    pub fn can_cross_link_pair(&self, a: &Peptide, b: &Peptide) -> bool {
        (0..a.len()).any(|site_a| {
            self.can_link_site(a, site_a)
                && (0..b.len()).any(|site_b| self.can_cross_link_sites(a, site_a, b, site_b))
        })
    }

    /// If any pair of sites of the two fragments can be joined
    pub fn can_cross_link_spans(
        &self,
        a: &impl LinkableSequence,
        b: &impl LinkableSequence,
    ) -> bool {
        (0..a.link_len()).any(|site_a| {
            self.can_link_fragment_site(a, site_a)
                && (0..b.link_len())
                    .any(|site_b| self.specificity.allows_pair(a, site_a, b, site_b, false))
        })
    }

    /// How likely the site is to be linked, lower is more likely: infinite if not allowed, 0 for
    /// an unrestricted end.
    pub fn link_weight(&self, peptide: &Peptide, site: usize) -> f64 {
        self.specificity.weight(peptide, site)
    }

    /// Build a cross-linker from a configuration class name and its arguments
    /// # Errors
    /// If the class is unknown or the arguments are invalid.
    pub fn parse(
        class: &str,
        arguments: &str,
        known: &[ModifiedAminoAcid],
    ) -> Result<Self, ConfigurationError> {
        let (_, parser) = CROSS_LINKER_CLASSES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(class.trim()))
            .ok_or_else(|| {
                BoxedError::new(
                    ConfigurationErrorKind::UnknownClass,
                    "Unknown cross-linker",
                    format!(
                        "The cross-linker class '{}' is not known, use one of: {}",
                        class.trim(),
                        CROSS_LINKER_CLASSES
                            .iter()
                            .map(|(name, _)| *name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    Context::show(format!("{class}:{arguments}")),
                )
            })?;
        parser(&Arguments::parse(arguments), known)
    }

    fn parse_symmetric(
        arguments: &Arguments<'_>,
        known: &[ModifiedAminoAcid],
    ) -> Result<Self, ConfigurationError> {
        let sites = arguments
            .get("LINKEDAMINOACIDS")
            .map_or_else(|| Ok(SiteRestriction::unrestricted()), |s| SiteRestriction::parse(s, known))?;
        Self::parse_common(arguments, LinkerSpecificity::Symmetric(sites))
    }

    fn parse_asymmetric(
        arguments: &Arguments<'_>,
        known: &[ModifiedAminoAcid],
    ) -> Result<Self, ConfigurationError> {
        let first = SiteRestriction::parse(arguments.require("FIRSTLINKEDAMINOACIDS")?, known)?;
        let second = SiteRestriction::parse(arguments.require("SECONDLINKEDAMINOACIDS")?, known)?;
        Self::parse_common(arguments, LinkerSpecificity::Asymmetric(first, second))
    }

    fn parse_linear(
        arguments: &Arguments<'_>,
        _known: &[ModifiedAminoAcid],
    ) -> Result<Self, ConfigurationError> {
        let mut linker = Self::linear();
        if let Some(name) = arguments.get("NAME") {
            linker.name = name.to_string();
        }
        linker.id = Some(arguments.integer("ID")?.unwrap_or(1));
        Ok(linker)
    }

    fn parse_common(
        arguments: &Arguments<'_>,
        specificity: LinkerSpecificity,
    ) -> Result<Self, ConfigurationError> {
        let name = arguments.require("NAME")?;
        let mass = arguments.number("MASS")?;
        let base = arguments.number("BASEMASS")?;
        let linked = arguments.number("CROSSLINKEDMASS")?;
        let (base_mass, cross_linked_mass) = match (mass, base, linked) {
            (_, Some(base), Some(linked)) => (base, linked),
            (_, Some(base), None) => (base, base),
            (_, None, Some(linked)) => (linked, linked),
            (Some(mass), None, None) => (mass, mass),
            (None, None, None) => {
                return Err(BoxedError::new(
                    ConfigurationErrorKind::MissingArgument,
                    "Missing cross-linker mass",
                    "A cross-linker needs a 'MASS', 'BASEMASS' or 'CROSSLINKEDMASS'",
                    Context::show(arguments.text().to_string()),
                ));
            }
        };
        let min = match arguments.get("CROSSLINKEDMINMASS") {
            Some(value) => Some(parse_number(value, arguments.text())?),
            None => arguments.number("MINMASS")?,
        };
        let max = match arguments.get("CROSSLINKEDMAXMASS") {
            Some(value) => Some(parse_number(value, arguments.text())?),
            None => arguments.number("MAXMASS")?,
        };
        let mut linker = Self::new(name, base_mass, specificity).with_cross_linked_mass(cross_linked_mass);
        linker.min_cross_linked_mass = min.unwrap_or(cross_linked_mass);
        linker.max_cross_linked_mass = max.unwrap_or(cross_linked_mass);
        linker.decoy = arguments.has_flag("DECOY");
        linker.id = arguments.integer("ID")?;
        let pairs = |key: &str| -> Result<Vec<(String, f64)>, ConfigurationError> {
            arguments
                .get(key)
                .map_or_else(|| Ok(Vec::new()), |list| named_masses(list, arguments.text()))
        };
        linker.modifications = pairs("MODIFICATIONS")?;
        linker.linear_modifications = pairs("LINEARMODIFICATIONS")?;
        linker.losses = pairs("LOSSES")?;
        linker.stubs = pairs("STUBS")?;
        Ok(linker)
    }
}

/// Read a `name,mass,name,mass` list
fn named_masses(list: &str, text: &str) -> Result<Vec<(String, f64)>, ConfigurationError> {
    let items = split_list(list);
    if items.len() % 2 != 0 {
        return Err(BoxedError::new(
            ConfigurationErrorKind::InvalidValue,
            "Invalid list",
            "A list of named masses needs a mass after every name",
            Context::show(text.to_string()),
        ));
    }
    items
        .chunks_exact(2)
        .map(|pair| Ok((pair[0].to_string(), parse_number(pair[1], text)?)))
        .collect()
}

/// All configured cross-linkers in configuration order, looked up by name ignoring case.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CrossLinkerRegistry {
    linkers: Vec<CrossLinker>,
}

impl CrossLinkerRegistry {
    /// Add a cross-linker, one with the same name is replaced
    pub fn add(&mut self, linker: CrossLinker) {
        if let Some(existing) = self
            .linkers
            .iter_mut()
            .find(|l| l.name.eq_ignore_ascii_case(&linker.name))
        {
            *existing = linker;
        } else {
            self.linkers.push(linker);
        }
    }

    /// Forget all cross-linkers
    pub fn clear(&mut self) {
        self.linkers.clear();
    }

    /// Find a cross-linker by name
    pub fn get(&self, name: &str) -> Option<&CrossLinker> {
        self.linkers
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// All cross-linkers
    pub fn linkers(&self) -> &[CrossLinker] {
        &self.linkers
    }

    /// The number of cross-linkers
    pub fn len(&self) -> usize {
        self.linkers.len()
    }

    /// If no cross-linker is configured
    pub fn is_empty(&self) -> bool {
        self.linkers.is_empty()
    }

    /// If any cross-linker can link the peptide
    pub fn can_cross_link(&self, peptide: &Peptide) -> bool {
        self.linkers.iter().any(|l| l.can_cross_link(peptide))
    }
}

/// Get the residue of a cross-linker derived modification, used when reading sequences
pub fn derived_residue(linkers: &[CrossLinker], symbol: &str) -> Option<Residue> {
    linkers
        .iter()
        .flat_map(CrossLinker::derived_residues)
        .find(|m| m.symbol() == symbol)
        .map(Residue::Modified)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sequence::Sequence;

    #[test]
    fn parse_bs3() {
        let bs3 = CrossLinker::parse(
            "SymetricSingleAminoAcidRestrictedCrossLinker",
            "Name:BS3;MASS:138.06807;LINKEDAMINOACIDS:K,S(0.2),T(0.2),Y(0.2),nterm;LINEARMODIFICATIONS:NH2,17.026549105,OH,18.0105647;decoy;ID:3",
            &[],
        )
        .unwrap();
        assert_eq!(bs3.name(), "BS3");
        assert!((bs3.cross_linked_mass() - 138.06807).abs() < f64::EPSILON);
        assert!(bs3.is_decoy());
        assert_eq!(bs3.id(), Some(3));
        let derived = bs3.derived_residues();
        assert_eq!(derived.len(), 8);
        assert!(derived.iter().all(|m| m.kind() == ModificationKind::Linear));
        assert!(derived.iter().any(|m| m.symbol() == "Kbs3nh2"));
    }

    #[test]
    fn parse_errors() {
        for (class, arguments) in [
            ("SymetricSingleAminoAcidRestrictedCrossLinker", "MASS:138.06807;LINKEDAMINOACIDS:K"),
            ("SymetricSingleAminoAcidRestrictedCrossLinker", "NAME:BS3;LINKEDAMINOACIDS:K"),
            ("SymetricSingleAminoAcidRestrictedCrossLinker", "NAME:BS3;MASS:heavy"),
            ("AsymetricSingleAminoAcidRestrictedCrossLinker", "NAME:EDC;MASS:-18.01;FIRSTLINKEDAMINOACIDS:K"),
            ("MagicCrossLinker", "NAME:M;MASS:1"),
        ] {
            assert!(CrossLinker::parse(class, arguments, &[]).is_err(), "{class}:{arguments}");
        }
    }

    #[test]
    fn linear_never_links() {
        let linear = CrossLinker::parse("LinearCrosslinker", "", &[]).unwrap();
        assert!(linear.is_linear());
        assert!(linear.cross_linked_mass().is_infinite());
        let sequence = Arc::new(Sequence::from_text("p", "KKKK", &[]).unwrap());
        assert!(!linear.can_cross_link(&Peptide::new(sequence, 0, 4)));
    }

    #[test]
    fn registry() {
        let mut registry = CrossLinkerRegistry::default();
        registry.add(CrossLinker::symmetric("BS3", 138.06807, SiteRestriction::residues(["K"])));
        registry.add(CrossLinker::symmetric("DSSO", 158.0038, SiteRestriction::residues(["K"])));
        registry.add(CrossLinker::symmetric("bs3", 140.0, SiteRestriction::residues(["K"])));
        assert_eq!(registry.len(), 2);
        assert!((registry.get("Bs3").unwrap().base_mass() - 140.0).abs() < f64::EPSILON);
        let sequence = Arc::new(Sequence::from_text("p", "PEPKIDER", &[]).unwrap());
        assert!(registry.can_cross_link(&Peptide::new(sequence.clone(), 0, 8)));
        assert!(!registry.can_cross_link(&Peptide::new(sequence, 4, 4)));
    }
}
