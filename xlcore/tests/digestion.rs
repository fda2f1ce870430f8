#![allow(clippy::missing_panics_doc, clippy::float_cmp)]
//! Integration tests for digestion
use std::{collections::BTreeSet, sync::Arc};

use xlcore::prelude::*;

fn trypsin(settings: DigestionSettings) -> Digestion {
    Digestion::new(
        "Trypsin",
        Protease::after(vec![AminoAcid::Lysine, AminoAcid::Arginine]),
        settings,
    )
}

fn missed(max_missed_cleavages: usize) -> DigestionSettings {
    DigestionSettings {
        max_missed_cleavages,
        ..DigestionSettings::default()
    }
}

fn sequence(text: &str) -> Arc<Sequence> {
    Arc::new(Sequence::from_text("test", text, &[]).unwrap())
}

/// `(start, length, missed cleavages)` of every peptide
fn regions(peptides: &[Peptide]) -> BTreeSet<(usize, usize, usize)> {
    peptides
        .iter()
        .map(|p| (p.start(), p.len(), p.missed_cleavages()))
        .collect()
}

#[test]
fn example_sequence() {
    let sequence = sequence("MKRTESTK");
    let mut indices = PeptideIndices::default();
    let peptides = trypsin(missed(1)).digest(&sequence, f64::INFINITY, &[], &mut indices);
    let mut found: Vec<(String, usize, bool)> = peptides
        .iter()
        .map(|p| (p.to_string(), p.missed_cleavages(), p.is_n_terminal()))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("K".to_string(), 0, true),
            ("KR".to_string(), 1, true),
            ("MK".to_string(), 0, true),
            ("MKR".to_string(), 1, true),
            ("R".to_string(), 0, false),
            ("RTESTK".to_string(), 1, false),
            ("TESTK".to_string(), 0, false),
        ]
    );
    // Without cross-linkers everything longer than three residues is linear
    assert_eq!(indices.crosslinkable.len(), 0);
    assert_eq!(indices.linear.len(), 2);
}

#[test]
fn coverage() {
    let text = "GAKGGGRGGGGKGGGGGRPGGAKGG";
    let sequence = sequence(text);
    let sites: Vec<usize> = text
        .char_indices()
        .filter(|(_, c)| *c == 'K' || *c == 'R')
        .map(|(i, _)| i)
        .collect();
    let mut bounds = vec![0];
    bounds.extend(sites.iter().map(|s| s + 1));
    bounds.push(text.len());

    for k in 0..=3 {
        let mut expected = BTreeSet::new();
        for i in 0..bounds.len() - 1 {
            for j in i + 1..bounds.len().min(i + k + 2) {
                expected.insert((bounds[i], bounds[j] - bounds[i], j - i - 1));
            }
        }
        let peptides = trypsin(missed(k)).digest(
            &sequence,
            f64::INFINITY,
            &[],
            &mut PeptideIndices::default(),
        );
        assert_eq!(regions(&peptides), expected, "missed cleavages {k}");
    }
}

#[test]
fn mass_pruning() {
    let sequence = sequence("GGKWWWWWWWWKGGKGGK");
    let peptides = trypsin(missed(2)).digest(&sequence, 1000.0, &[], &mut PeptideIndices::default());
    assert!(peptides.iter().all(|p| p.mass() <= 1000.0));
    assert_eq!(
        regions(&peptides),
        BTreeSet::from([(0, 3, 0), (12, 3, 0), (15, 3, 0), (12, 6, 1)])
    );
}

#[test]
fn modification_combinatorics() {
    let phospho = ModifiedAminoAcid::new("Sph", AminoAcid::Serine, 79.96633, ModificationKind::Known);
    let acetyl = ModifiedAminoAcid::new("Sac", AminoAcid::Serine, 42.01057, ModificationKind::Known);
    let mut sequence = Sequence::from_text("test", "GSGSGSGK", &[]).unwrap();
    for position in [1, 3, 5] {
        sequence.add_expected_modification(position, phospho.clone().into());
        sequence.add_expected_modification(position, acetyl.clone().into());
    }
    let sequence = Arc::new(sequence);

    let settings = DigestionSettings {
        max_modified_peptides_per_peptide: 1000,
        ..DigestionSettings::default()
    };
    let peptides = trypsin(settings).digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default());
    // m = 3 sites with v = 2 alternatives: C(3, c) * 2^c variants with c modifications
    for (count, expected) in [(0, 0), (1, 6), (2, 12), (3, 8)] {
        assert_eq!(
            peptides
                .iter()
                .filter(|p| p.modifications().len() == count)
                .count(),
            expected,
            "{count} modifications"
        );
    }
    let unique: BTreeSet<String> = peptides.iter().map(ToString::to_string).collect();
    assert_eq!(unique.len(), 26);

    let capped = DigestionSettings {
        max_modified_peptides_per_peptide: 5,
        ..DigestionSettings::default()
    };
    let peptides = trypsin(capped).digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default());
    assert_eq!(peptides.len(), 6);
    assert!(peptides.iter().all(|p| p.modifications().len() == 1));

    let limited = DigestionSettings {
        max_modifications_per_peptide: 1,
        ..DigestionSettings::default()
    };
    let peptides = trypsin(limited).digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default());
    assert_eq!(peptides.len(), 6);
}

#[test]
fn classification() {
    let linker = CrossLinker::symmetric("BMOE", 220.04840, SiteRestriction::residues(["C"]));
    let sequence = sequence("GGGGKGGGGRGCGGGRGGGGGRGR");
    let mut indices = PeptideIndices::default();
    let peptides = trypsin(missed(0)).digest(&sequence, f64::INFINITY, &[linker], &mut indices);
    assert_eq!(peptides.len(), 5);
    let crosslinkable: Vec<String> = indices.crosslinkable.iter().map(ToString::to_string).collect();
    assert_eq!(crosslinkable, vec!["GCGGGR"]);
    assert_eq!(indices.linear.len(), 3);
    assert!(indices.linear.iter().all(|p| p.len() > 3));
}

#[test]
fn redigest_keeps_missed_cleavages() {
    let sequence = sequence("AAKGGRCCK");
    let first = trypsin(missed(1));
    let long = first
        .digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default())
        .into_iter()
        .find(|p| p.to_string() == "AAKGGR")
        .unwrap();
    assert_eq!(long.missed_cleavages(), 1);
    let lys_c = Digestion::new(
        "LysC",
        Protease::after(vec![AminoAcid::Lysine]),
        DigestionSettings::default(),
    );
    let parts = lys_c.digest_peptide(&long, f64::INFINITY, &[], &mut PeptideIndices::default());
    let found: Vec<(String, usize)> = parts
        .iter()
        .map(|p| (p.to_string(), p.missed_cleavages()))
        .collect();
    assert_eq!(
        found,
        vec![("AAK".to_string(), 1), ("GGR".to_string(), 1)]
    );
    assert_eq!(parts[1].start(), 3);
}

#[test]
fn database() {
    let sequences = vec![
        sequence("MKRTESTK"),
        sequence("GGGGKGGGGRGKGGGR"),
        sequence("PEPTIDE"),
    ];
    let linker = CrossLinker::symmetric("BS3", 138.06808, SiteRestriction::residues(["K"]));
    let method: DigestionMethod = trypsin(missed(1)).into();
    let indices = method.digest_all(&sequences, f64::INFINITY, &[linker.clone()]);
    let mut sequential = PeptideIndices::default();
    for sequence in &sequences {
        method.digest(sequence, f64::INFINITY, &[linker.clone()], &mut sequential);
    }
    assert_eq!(indices.len(), sequential.len());
    assert_eq!(indices.crosslinkable.len(), sequential.crosslinkable.len());
    let window: Vec<String> = indices
        .linear
        .in_range(0.0, f64::INFINITY)
        .map(ToString::to_string)
        .collect();
    assert!(window.contains(&"PEPTIDE".to_string()));
}

#[test]
fn settings_from_json() {
    let settings: DigestionSettings = serde_json::from_str(
        r#"{"max_missed_cleavages":2,"min_peptide_length":5,"max_modifications_per_peptide":3,"max_modified_peptides_per_peptide":20}"#,
    )
    .unwrap();
    assert_eq!(settings.max_missed_cleavages, 2);
    assert_eq!(settings.min_peptide_length, 5);
}

#[test]
fn decoy_digestion() {
    let target = Sequence::from_text("P1", "AAKGGRCCK", &[]).unwrap();
    let decoy = Arc::new(target.reverse());
    let peptides = trypsin(missed(0)).digest(&decoy, f64::INFINITY, &[], &mut PeptideIndices::default());
    assert!(peptides.iter().all(Peptide::is_decoy));
    assert_eq!(
        peptides.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["K", "CCR", "GGK", "AA"]
    );
}
