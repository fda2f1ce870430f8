use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use xlcore::{
    crosslinker::{CrossLinker, CrossLinkerRegistry},
    error::ConfigurationError,
    sequence::ModifiedAminoAcid,
};

use super::SearchSettings;
use crate::fragment::{
    AminoAcidLoss, CrossLinkerLoss, DoubleFragmentation, FragmentArena, FragmentId, IonSeries,
    IonType, IonTypeRegistry, LossDefinition, LossRule, PeptideSlot, StubRule, apply_losses,
    combine, double_fragments, loop_link,
};

/// Everything a run configuration registers: cross-linkers, ion types with their ids, loss and
/// stub rules and modified residues. Built once during setup and only borrowed afterwards, so
/// it can be shared between workers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Registry {
    cross_linkers: CrossLinkerRegistry,
    ion_types: IonTypeRegistry,
    loss_rules: Vec<LossRule>,
    stubs: Vec<StubRule>,
    modifications: Vec<ModifiedAminoAcid>,
    double_fragmentation: bool,
}

impl Registry {
    /// The b, y and peptide ions with the water and ammonia losses and the cross-linker
    /// modified losses
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for series in [IonSeries::B, IonSeries::Y, IonSeries::Peptide] {
            registry.add_ion_type(IonType::Series(series), None);
        }
        let id = registry.ion_types.register_named("CrosslinkerModified", None);
        registry.add_loss(LossDefinition::Rule(LossRule::CrossLinkerModified { id }));
        for (name, residues, n_terminal, c_terminal, mass) in [
            ("H20", ["S", "T", "D", "E"], false, true, 18.01056027),
            ("NH3", ["R", "K", "N", "Q"], true, false, 17.02654910),
        ] {
            let id = registry.ion_types.register_named(name, None);
            registry.add_loss(LossDefinition::Rule(LossRule::AminoAcid(AminoAcidLoss {
                name: name.to_string(),
                residues: residues.into_iter().map(String::from).collect::<BTreeSet<_>>(),
                n_terminal,
                c_terminal,
                mass,
                id,
            })));
        }
        registry
    }

    /// The cross-linkers
    pub const fn cross_linkers(&self) -> &CrossLinkerRegistry {
        &self.cross_linkers
    }

    /// The ion types and the ids of the named losses
    pub const fn ion_types(&self) -> &IonTypeRegistry {
        &self.ion_types
    }

    /// The loss rules in the order they are applied
    pub fn loss_rules(&self) -> &[LossRule] {
        &self.loss_rules
    }

    /// The configured stubs, the stubs of cleavable cross-linkers come on top of these
    pub fn stubs(&self) -> &[StubRule] {
        &self.stubs
    }

    /// All modified residues that can be used in sequences
    pub fn modifications(&self) -> &[ModifiedAminoAcid] {
        &self.modifications
    }

    /// If internal fragments from two backbone breaks are generated
    pub const fn double_fragmentation(&self) -> bool {
        self.double_fragmentation
    }

    /// Add a cross-linker, replacing one with the same name. The residues it leaves when
    /// reacting on one side only become known modifications.
    pub fn add_cross_linker(&mut self, linker: CrossLinker) {
        for residue in linker.derived_residues() {
            self.add_modification(residue);
        }
        for (name, _) in linker.losses().iter().chain(linker.stubs()) {
            self.ion_types.register_named(name, None);
        }
        debug!(name = linker.name(), "registered cross-linker");
        self.cross_linkers.add(linker);
    }

    /// Forget all cross-linkers
    pub fn clear_cross_linkers(&mut self) {
        self.cross_linkers.clear();
    }

    /// Register an ion type, a double fragmentation type switches double fragmentation on
    pub fn add_ion_type(&mut self, ion_type: IonType, id: Option<usize>) -> usize {
        if ion_type == IonType::BLikeDoubleFragmentation {
            self.double_fragmentation = true;
        }
        self.ion_types.register(ion_type, id)
    }

    /// Add a loss or stub. A residue restricted loss with the name and mass of an existing
    /// one is merged into it.
    pub fn add_loss(&mut self, definition: LossDefinition) {
        match definition {
            LossDefinition::Rule(LossRule::AminoAcid(rule)) => {
                if let Some(existing) = self.loss_rules.iter_mut().find_map(|r| match r {
                    LossRule::AminoAcid(existing) if existing.same_loss(&rule) => Some(existing),
                    _ => None,
                }) {
                    existing.merge(&rule);
                } else {
                    self.loss_rules.push(LossRule::AminoAcid(rule));
                }
            }
            LossDefinition::Rule(rule) => {
                if !self.loss_rules.contains(&rule) {
                    self.loss_rules.push(rule);
                }
            }
            LossDefinition::Stub(stub) => self.stubs.push(stub),
        }
    }

    /// Read a loss from a configuration class name and its arguments and add it
    /// # Errors
    /// If the class is unknown or the arguments are invalid.
    pub fn parse_loss(&mut self, class: &str, arguments: &str) -> Result<(), ConfigurationError> {
        let definition = LossDefinition::parse(class, arguments, &mut self.ion_types)?;
        debug!(class, "registered loss");
        self.add_loss(definition);
        Ok(())
    }

    /// Register a modified residue, registering the same residue twice has no effect
    pub fn add_modification(&mut self, modification: ModifiedAminoAcid) {
        if !self.modifications.contains(&modification) {
            self.modifications.push(modification);
        }
    }

    fn double(&self) -> DoubleFragmentation {
        DoubleFragmentation {
            enabled: self.double_fragmentation,
            ion_type: self.ion_types.double_fragmentation(),
        }
    }

    /// The loss rules, followed by the losses of the cross-linker
    fn rules_for(&self, linker: Option<&CrossLinker>) -> Vec<LossRule> {
        let mut rules = self.loss_rules.clone();
        if let Some(linker) = linker {
            rules.extend(linker.losses().iter().map(|(name, mass)| {
                LossRule::CrossLinker(CrossLinkerLoss {
                    name: name.clone(),
                    mass: *mass,
                    id: self.ion_types.named_id(name).unwrap_or_default(),
                })
            }));
        }
        rules
    }

    /// The stub rules, followed by the stubs of the cross-linker
    fn stubs_for(&self, linker: &CrossLinker) -> Vec<StubRule> {
        let mut stubs = self.stubs.clone();
        stubs.extend(linker.stubs().iter().map(|(name, mass)| StubRule {
            name: name.clone(),
            mass: *mass,
            id: self.ion_types.named_id(name).unwrap_or_default(),
        }));
        stubs
    }

    /// The fragments of all registered ion types, without losses
    pub fn primary_fragments(&self, arena: &mut FragmentArena, slot: PeptideSlot) -> Vec<FragmentId> {
        let mut fragments: Vec<FragmentId> = self
            .ion_types
            .series()
            .flat_map(|(series, id)| series.generate(arena, slot, Some(id)))
            .collect();
        if self.double_fragmentation {
            fragments.extend(double_fragments(
                arena,
                slot,
                self.ion_types.double_fragmentation(),
            ));
        }
        fragments
    }

    /// All fragments of a peptide that is not cross-linked
    pub fn fragment_linear(
        &self,
        arena: &mut FragmentArena,
        slot: PeptideSlot,
        settings: &SearchSettings,
    ) -> Vec<FragmentId> {
        let mut fragments = self.primary_fragments(arena, slot);
        apply_losses(
            &self.loss_rules,
            arena,
            &mut fragments,
            None,
            settings.loss_limits(),
            self.double_fragmentation,
        );
        fragments
    }

    /// All fragments of two peptides joined by the cross-linker. With known `(first, second)`
    /// sites, relative to their peptide, only fragments containing the sites are linked.
    pub fn fragment_cross_linked(
        &self,
        arena: &mut FragmentArena,
        first: PeptideSlot,
        second: PeptideSlot,
        linker: &CrossLinker,
        sites: Option<(usize, usize)>,
        settings: &SearchSettings,
    ) -> Vec<FragmentId> {
        let mut first_fragments = self.primary_fragments(arena, first);
        let mut second_fragments = self.primary_fragments(arena, second);
        let linked = combine(
            arena,
            &first_fragments,
            &second_fragments,
            linker,
            self.double(),
            sites,
        );

        let stubs = self.stubs_for(linker);
        let carries_link = |arena: &FragmentArena, fragments: &[FragmentId]| -> Vec<FragmentId> {
            fragments
                .iter()
                .copied()
                .filter(|id| linker.can_cross_link_fragment(&arena.span(*id)))
                .collect()
        };
        let first_linkable = carries_link(&*arena, &first_fragments);
        let second_linkable = carries_link(&*arena, &second_fragments);
        let first_stubs: Vec<FragmentId> = stubs
            .iter()
            .flat_map(|stub| stub.derive(arena, &first_linkable))
            .collect();
        let second_stubs: Vec<FragmentId> = stubs
            .iter()
            .flat_map(|stub| stub.derive(arena, &second_linkable))
            .collect();
        first_fragments.extend(linked);
        first_fragments.extend(first_stubs);
        second_fragments.extend(second_stubs);

        let rules = self.rules_for(Some(linker));
        for fragments in [&mut first_fragments, &mut second_fragments] {
            apply_losses(
                &rules,
                arena,
                fragments,
                Some(linker),
                settings.loss_limits(),
                self.double_fragmentation,
            );
        }
        debug!(
            linker = linker.name(),
            first = first_fragments.len(),
            second = second_fragments.len(),
            "generated cross-linked fragments"
        );
        first_fragments.extend(second_fragments);
        first_fragments
    }

    /// All fragments of a peptide linked to itself at the two sites, relative to the peptide
    pub fn fragment_loop_linked(
        &self,
        arena: &mut FragmentArena,
        slot: PeptideSlot,
        linker: &CrossLinker,
        sites: (usize, usize),
        settings: &SearchSettings,
    ) -> Vec<FragmentId> {
        let primaries = self.primary_fragments(arena, slot);
        let mut fragments = loop_link(arena, &primaries, linker, sites, self.double());
        apply_losses(
            &self.rules_for(Some(linker)),
            arena,
            &mut fragments,
            Some(linker),
            settings.loss_limits(),
            self.double_fragmentation,
        );
        fragments
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::sync::Arc;

    use xlcore::{
        crosslinker::SiteRestriction,
        sequence::{Peptide, Sequence},
    };

    use super::*;

    #[test]
    fn standard_rules() {
        let registry = Registry::standard();
        assert_eq!(registry.ion_types().len(), 3);
        assert_eq!(registry.loss_rules().len(), 3);
        assert!(!registry.double_fragmentation());

        let sequence = Arc::new(Sequence::from_text("p", "PEPTIDEK", &[]).unwrap());
        let mut arena = FragmentArena::default();
        let slot = arena.add_peptide(Peptide::new(sequence, 0, 8));
        let primaries = registry.primary_fragments(&mut arena, slot).len();
        assert_eq!(primaries, 7 + 7 + 1);
        let all = registry.fragment_linear(&mut arena, slot, &SearchSettings::default());
        assert!(all.len() > primaries);
        assert!(all.iter().any(|id| arena[*id].name() == "P_H20x1"));
    }

    #[test]
    fn shared_between_workers() {
        fn shared<T: Send + Sync>(_: &T) {}
        shared(&Registry::standard());
    }

    #[test]
    fn merged_losses() {
        let mut registry = Registry::default();
        registry
            .parse_loss("AminoAcidRestrictedLoss", "NAME:H20;AMINOACIDS:S,T;MASS:18.01056027")
            .unwrap();
        registry
            .parse_loss("AminoAcidRestrictedLoss", "NAME:H20;AMINOACIDS:D,E;CTERM;MASS:18.01056027")
            .unwrap();
        registry.parse_loss("CrosslinkerModified", "").unwrap();
        registry.parse_loss("CrosslinkerModified", "").unwrap();
        assert_eq!(registry.loss_rules().len(), 2);
        let LossRule::AminoAcid(water) = &registry.loss_rules()[0] else {
            panic!("not a residue restricted loss");
        };
        assert_eq!(water.residues.len(), 4);
        assert!(water.c_terminal);
    }

    #[test]
    fn cross_linked_with_stubs() {
        let mut registry = Registry::standard();
        let linker = CrossLinker::symmetric("DSSO", 158.0038, SiteRestriction::residues(["K"]))
            .with_stubs([("A".to_string(), 54.01056), ("T".to_string(), 85.98264)])
            .with_losses([("xl".to_string(), 18.0)]);
        registry.add_cross_linker(linker.clone());
        assert!(registry.ion_types().named_id("A").is_some());

        let mut arena = FragmentArena::default();
        let a = arena.add_peptide(Peptide::new(
            Arc::new(Sequence::from_text("a", "PEKTIDER", &[]).unwrap()),
            0,
            8,
        ));
        let b = arena.add_peptide(Peptide::new(
            Arc::new(Sequence::from_text("b", "AKR", &[]).unwrap()),
            0,
            3,
        ));
        let fragments = registry.fragment_cross_linked(
            &mut arena,
            a,
            b,
            &linker,
            None,
            &SearchSettings::default(),
        );
        let names: Vec<&str> = fragments.iter().map(|id| arena[*id].name()).collect();
        assert!(names.contains(&"b3+P"));
        assert!(names.contains(&"P+P"));
        assert!(names.contains(&"b3_A"));
        assert!(names.contains(&"b3+P_xl"));
        assert!(names.contains(&"P+(P)"));
        assert!(names.contains(&"P(+P)"));
        assert!(names.contains(&"P+i(P)"));
        assert!(!names.contains(&"b2_A"));
        for id in &fragments {
            let fragment = &arena[*id];
            if let Some(parent) = fragment.parent() {
                assert!(
                    (fragment.neutral_mass()
                        - arena[parent].neutral_mass()
                        - fragment.loss().unwrap().delta)
                        .abs()
                        < 1e-9
                );
            }
        }
    }
}
