#![allow(clippy::missing_panics_doc, clippy::float_cmp)]
//! Integration tests for fragment and loss generation
use std::sync::Arc;

use xlannotate::prelude::*;
use xlcore::prelude::*;

const WATER: f64 = 18.0106;

fn slot(arena: &mut FragmentArena, configuration: &Configuration, text: &str) -> PeptideSlot {
    let sequence = Arc::new(configuration.prepare_sequence(text, text).unwrap());
    let length = sequence.len();
    arena.add_peptide(Peptide::new(sequence, 0, length))
}

/// Follow the parents of every loss and check the masses on the way
fn check_chains(arena: &FragmentArena, fragments: &[FragmentId]) {
    for id in fragments {
        let fragment = &arena[*id];
        let mut current = fragment;
        let mut steps = 0;
        while let Some(step) = current.loss() {
            let parent = &arena[step.parent];
            assert!(
                (current.neutral_mass() - (parent.neutral_mass() + step.delta)).abs() < 1e-9,
                "{}",
                current.name()
            );
            assert_eq!(step.base, fragment.base());
            current = parent;
            steps += 1;
            assert!(steps <= arena.len());
        }
        assert!(!current.is_loss());
        assert_eq!(current.id(), fragment.base());
    }
}

#[test]
fn water_losses_from_test() {
    let configuration = Configuration::parse(&format!(
        "fragment:PeptideIon\nloss:AminoAcidRestrictedLoss:NAME:H2O;AMINOACIDS:S,T,E,D;MASS:{WATER};ID:1"
    ))
    .unwrap();
    let mut arena = FragmentArena::default();
    let slot = slot(&mut arena, &configuration, "TEST");
    let fragments =
        configuration
            .registry
            .fragment_linear(&mut arena, slot, &configuration.settings);
    let peptide = fragments[0];
    let losses: Vec<&Fragment> = fragments[1..].iter().map(|id| &arena[*id]).collect();
    assert_eq!(losses.len(), 4);
    for (index, loss) in losses.iter().enumerate() {
        assert_eq!(loss.loss_count(), index + 1);
        assert_eq!(loss.parent(), Some(peptide));
        assert_eq!(loss.base(), peptide);
        assert_eq!(loss.loss().unwrap().loss_id, 1);
        let expected = arena[peptide].neutral_mass() - WATER * (index + 1) as f64;
        assert!((loss.neutral_mass() - expected).abs() < 1e-9);
    }
    for pair in losses.windows(2) {
        assert!((pair[0].neutral_mass() - pair[1].neutral_mass() - WATER).abs() < 1e-9);
    }
    check_chains(&arena, &fragments);
}

#[test]
fn immonium_ions_and_corrections() {
    let configuration = Configuration::parse(
        "fragment:PeptideIon
fragment:BIon
fragment:ImmoniumIon
loss:AminoAcidRestrictedImmonium:NAME:iK;AMINOACIDS:K;MASS:101.1073;ID:5
loss:CorrectableAminoAcidRestrictedLoss:NAME:ox;AMINOACIDS:M;MASS:15.9949;ID:6",
    )
    .unwrap();
    let mut arena = FragmentArena::default();
    let slot = slot(&mut arena, &configuration, "PEMK");
    let fragments =
        configuration
            .registry
            .fragment_linear(&mut arena, slot, &configuration.settings);
    check_chains(&arena, &fragments);
    let mut names: Vec<&str> = fragments.iter().map(|id| arena[*id].name()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec!["P", "b1", "b2", "b3", "b3_oxx1", "iK", "imE", "imK", "imM", "imP"]
    );
    let immonium = fragments
        .iter()
        .map(|id| &arena[*id])
        .find(|f| f.name() == "iK")
        .unwrap();
    assert!((immonium.neutral_mass() - 101.1073).abs() < 1e-9);
    assert!(immonium.is_immonium());
    assert!(
        fragments
            .iter()
            .filter(|id| arena[**id].is_immonium())
            .all(|id| !arena[*id].is_primary_evidence())
    );
}

#[test]
fn loss_limits() {
    let configuration = Configuration::parse(&format!(
        "fragment:PeptideIon\nloss:AminoAcidRestrictedLoss:NAME:H2O;AMINOACIDS:S,T,E,D;MASS:{WATER};ID:1\nloss:AminoAcidRestrictedLoss:NAME:NH3;AMINOACIDS:K,R,N,Q;MASS:17.0265;NTERM;ID:2\nMAXLOSSES:2\nMAXTOTALLOSSES:3"
    ))
    .unwrap();
    let mut arena = FragmentArena::default();
    let slot = slot(&mut arena, &configuration, "TESTKK");
    let fragments =
        configuration
            .registry
            .fragment_linear(&mut arena, slot, &configuration.settings);
    // Two water losses, then up to two ammonia losses from each of the three fragments
    // within three losses in total
    let names: Vec<&str> = fragments.iter().map(|id| arena[*id].name()).collect();
    assert_eq!(
        names,
        [
            "P",
            "P_H2Ox1",
            "P_H2Ox2",
            "P_NH3x1",
            "P_NH3x2",
            "P_H2Ox1_NH3x1",
            "P_H2Ox1_NH3x2",
            "P_H2Ox2_NH3x1",
        ]
    );
    for id in &fragments {
        assert!(arena[*id].total_loss_count() <= 3);
    }
    assert_eq!(arena.loss_ids(fragments[6]), vec![(2, 2), (1, 1)]);
    check_chains(&arena, &fragments);
}

#[test]
fn cross_linked_chains() {
    let configuration = Configuration::parse(
        "crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:DSSO;MASS:158.0038;LINKEDAMINOACIDS:K,nterm;LOSSES:SO,47.96699;STUBS:A,54.01056,T,85.98264
fragment:BIon
fragment:YIon
fragment:PeptideIon
fragment:BLikeDoubleFragmentation
loss:AminoAcidRestrictedLoss:NAME:H2O;AMINOACIDS:S,T,E,D;CTERM;MASS:18.0106;ID:1
loss:CrosslinkerModified
loss:CleavableCrossLinkerPeptide:NAME:S;MASS:103.9932",
    )
    .unwrap();
    let registry = &configuration.registry;
    assert!(registry.double_fragmentation());
    let linker = registry.cross_linkers().get("DSSO").unwrap().clone();

    let mut arena = FragmentArena::default();
    let a = slot(&mut arena, &configuration, "PEKTIDER");
    let b = slot(&mut arena, &configuration, "AKR");
    let fragments = registry.fragment_cross_linked(
        &mut arena,
        a,
        b,
        &linker,
        None,
        &configuration.settings,
    );
    check_chains(&arena, &fragments);

    let find = |name: &str| {
        fragments
            .iter()
            .map(|id| &arena[*id])
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("no fragment {name}"))
    };
    let b3 = find("b3");
    let whole_b = fragments
        .iter()
        .map(|id| &arena[*id])
        .find(|f| f.is_peptide_ion() && f.peptide() == b)
        .unwrap();
    let linked = find("b3+P");
    assert!(linked.contains_crosslinker());
    assert!(
        (linked.neutral_mass() - (b3.neutral_mass() + whole_b.neutral_mass() + 158.0038)).abs()
            < 1e-9
    );
    assert!((find("b3_S").neutral_mass() - b3.neutral_mass() - 103.9932).abs() < 1e-9);
    assert!((find("b3_A").neutral_mass() - b3.neutral_mass() - 54.01056).abs() < 1e-9);
    assert!((find("b3+P_SO").neutral_mass() - linked.neutral_mass() + 47.96699).abs() < 1e-9);
    // With double fragmentation the side next to the whole peptide survives on its own
    assert!(find("b3+(P)").is_cross_linker_modified());
    assert!(find("b3(+P)").is_cross_linker_modified());
    // Two broken sides
    let double = find("b3+b2");
    assert_eq!(double.fragmentation_sites(), 2);
    assert_eq!(double.ion_type(), registry.ion_types().double_fragmentation());
}

#[test]
fn loop_linked() {
    let configuration = Configuration::parse(
        "crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:BS3;MASS:138.06807;LINKEDAMINOACIDS:K
fragment:BIon
fragment:YIon
fragment:PeptideIon",
    )
    .unwrap();
    let linker = configuration.registry.cross_linkers().get("BS3").unwrap().clone();
    let mut arena = FragmentArena::default();
    let slot = slot(&mut arena, &configuration, "PKEPTKDE");
    let fragments = configuration.registry.fragment_loop_linked(
        &mut arena,
        slot,
        &linker,
        (1, 5),
        &configuration.settings,
    );
    let names: Vec<&str> = fragments.iter().map(|id| arena[*id].name()).collect();
    // Fragments with a single site are gone
    assert!(names.contains(&"b1"));
    assert!(!names.contains(&"b2"));
    assert!(names.contains(&"b6_loop"));
    assert!(names.contains(&"y2"));
    assert!(!names.contains(&"y3"));
    assert!(names.contains(&"y7_loop"));
    assert!(names.contains(&"P_loop"));
    let whole = &arena[fragments[names.iter().position(|n| *n == "P_loop").unwrap()]];
    assert!(whole.contains_crosslinker());
    check_chains(&arena, &fragments);
}
