#![allow(clippy::missing_panics_doc, clippy::float_cmp)]
//! Integration tests for matching fragments against spectra
use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};
use xlannotate::prelude::*;
use xlcore::prelude::*;

fn peptide_fragments(text: &str) -> (Configuration, FragmentArena, Vec<FragmentId>) {
    let configuration = Configuration::parse(
        "fragment:BIon\nfragment:YIon\nfragment:PeptideIon\ntolerance:fragment:10ppm\nMATCH_MISSING_MONOISOTOPIC:false",
    )
    .unwrap();
    let sequence = Arc::new(configuration.prepare_sequence("p", text).unwrap());
    let length = sequence.len();
    let mut arena = FragmentArena::default();
    let slot = arena.add_peptide(Peptide::new(sequence, 0, length));
    let fragments =
        configuration
            .registry
            .fragment_linear(&mut arena, slot, &configuration.settings);
    (configuration, arena, fragments)
}

#[test]
fn exact_mz_matches_at_its_charge_only() {
    let (configuration, arena, fragments) = peptide_fragments("PEPTIDEKLMNQRSTVWY");
    let tolerance = configuration.settings.fragment_tolerance;
    let matcher = Matcher::new(configuration.matcher_settings());
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let id = fragments[rng.random_range(0..fragments.len())];
        let fragment = &arena[id];
        let charge = rng.random_range(1..=4);
        let mut spectrum = Spectrum::new(5, [Peak::new(fragment.mz(charge), 10.0)]);
        let mut matched = MatchedFragmentCollection::default();
        matcher.match_fragments_non_greedy(&mut spectrum, &arena, &[id], &tolerance, &mut matched);
        assert!(matched.has_matched(fragment, charge), "{} {charge}", fragment.name());
        for other in [charge - 1, charge + 1] {
            if other == 0 {
                continue;
            }
            let shifted = Peak::new(fragment.mz(charge), 1.0).neutral_mass(other);
            if !tolerance.contains(fragment.neutral_mass(), shifted) {
                assert!(!matched.has_matched(fragment, other));
            }
        }
        assert_eq!(matched.matched_non_lossy(), 1);
        assert_eq!(spectrum.peak(0).annotations.len(), 1);
        assert_eq!(spectrum.peak(0).annotations[0].fragment, id);
    }
}

#[test]
fn whole_pipeline() {
    let (configuration, arena, fragments) = peptide_fragments("PEPTIDEK");
    let named = |name: &str| {
        fragments
            .iter()
            .map(|id| &arena[*id])
            .find(|f| f.name() == name)
            .unwrap()
    };
    let (b3, y4, y5) = (named("b3"), named("y4"), named("y5"));
    let mut spectrum = Spectrum::new(
        3,
        [
            Peak::new(y5.mz(2), 30.0),
            Peak::new(b3.mz(1), 20.0),
            Peak::new(411.0, 5.0),
            Peak::new(y4.mz(1), 100.0),
            Peak::new(y4.mz(1) + C13_MASS_DIFFERENCE, 40.0),
        ],
    );
    spectrum.add_cluster(vec![3, 4], 1).unwrap();
    let mut matched = MatchedFragmentCollection::default();
    Matcher::new(configuration.matcher_settings()).match_fragments_non_greedy(
        &mut spectrum,
        &arena,
        &fragments,
        &configuration.settings.fragment_tolerance,
        &mut matched,
    );
    assert!(matched.has_matched(b3, 1));
    assert!(matched.has_matched(y4, 1));
    assert!(matched.has_matched(y5, 2));
    assert!(!matched.has_matched(y5, 1));
    assert_eq!(matched.matched_non_lossy(), 3);
    assert_eq!(spectrum.peak(3).annotations[0].cluster, Some(0));
    assert!(spectrum.peak(4).annotations.is_empty());
    assert!(spectrum.peak(2).annotations.is_empty());
    assert_eq!(spectrum.peak(0).annotations[0].charge, 2);
    assert_eq!(
        SupportLevel::classify(&arena, y4.id(), 1, &matched),
        SupportLevel::NonLossy { losses: 0 }
    );
    let single = matched.to_singly_charged();
    assert!(single.has_matched(y5, 1));
    assert_eq!(single.matched_non_lossy(), 3);
}
