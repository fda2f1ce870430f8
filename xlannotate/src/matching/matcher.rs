use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use xlcore::{
    chemistry::{C13_MASS_DIFFERENCE, PROTON_MASS, neutral_mass},
    quantities::Tolerance,
};

use super::MatchedFragmentCollection;
use crate::{
    config::SearchSettings,
    fragment::{Fragment, FragmentArena, FragmentId},
    spectrum::{PeakAnnotation, Spectrum},
};

/// Only peaks of a monoisotopic neutral mass above this can be a second isotope
const MISSING_MONOISOTOPIC_FLOOR: f64 = 1000.0;
/// The floor for loose peaks when only losses or double fragmentations matched the peak
const MISSING_MONOISOTOPIC_FLOOR_AFTER_LOSS: f64 = 2000.0;
/// The relative intensity change that counts as a rise or drop in an isotope envelope
const ENVELOPE_STEP: f64 = 0.95;

/// The switches of the matcher
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct MatcherSettings {
    /// Try to explain peaks as the second isotope of an ion whose monoisotopic peak is missing
    pub match_missing_monoisotopic: bool,
    /// When a loss matches, look for the isotope envelope of its base fragment in the raw peaks
    pub transfer_loss_to_base: bool,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            match_missing_monoisotopic: true,
            transfer_loss_to_base: false,
        }
    }
}

impl From<&SearchSettings> for MatcherSettings {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            match_missing_monoisotopic: settings.match_missing_monoisotopic,
            transfer_loss_to_base: settings.transfer_loss_to_base,
        }
    }
}

/// Matches theoretical fragments against the isotope clusters and loose peaks of a spectrum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Matcher {
    settings: MatcherSettings,
}

/// The fragments sorted by neutral mass
struct SortedFragments<'a> {
    fragments: Vec<&'a Fragment>,
}

impl<'a> SortedFragments<'a> {
    fn new(arena: &'a FragmentArena, fragments: &[FragmentId]) -> Self {
        let mut fragments: Vec<&Fragment> = fragments.iter().map(|id| &arena[*id]).collect();
        fragments.sort_by(|a, b| a.neutral_mass().total_cmp(&b.neutral_mass()));
        Self { fragments }
    }

    /// Move the cursor down to the first fragment heavier than `max`. The cursor never moves up,
    /// so the masses searched for have to decrease.
    fn lower_cursor(&self, cursor: &mut usize, max: f64) {
        *cursor = self.fragments[..*cursor].partition_point(|f| f.neutral_mass() <= max);
    }

    /// All fragments in `[min, max]` below the cursor, heaviest first
    fn window(&self, cursor: usize, min: f64, max: f64) -> Vec<&'a Fragment> {
        let end = self.fragments[..cursor].partition_point(|f| f.neutral_mass() <= max);
        self.fragments[..end]
            .iter()
            .rev()
            .take_while(|f| f.neutral_mass() >= min)
            .copied()
            .collect()
    }
}

/// What happened in the search windows of one peak
#[derive(Clone, Copy, Debug, Default)]
struct WindowResult {
    any: bool,
    primary: bool,
}

impl Matcher {
    /// Create a matcher
    pub const fn new(settings: MatcherSettings) -> Self {
        Self { settings }
    }

    /// The settings
    pub const fn settings(&self) -> MatcherSettings {
        self.settings
    }

    /// Match the fragments against the spectrum. First every isotope cluster is matched at its
    /// own charge, then every peak outside of a cluster at every charge up to the precursor
    /// charge. Matches are annotated on the peaks and recorded in `matched`. A match always
    /// replaces an earlier match of the same fragment at the same charge, while the recovery
    /// of a missing monoisotopic peak never replaces anything. A loose peak is only tried as a
    /// second isotope when no primary fragment matched it at any charge.
    pub fn match_fragments_non_greedy(
        &self,
        spectrum: &mut Spectrum,
        arena: &FragmentArena,
        fragments: &[FragmentId],
        tolerance: &Tolerance,
        matched: &mut MatchedFragmentCollection,
    ) {
        let sorted = SortedFragments::new(arena, fragments);
        self.match_clusters(spectrum, arena, &sorted, tolerance, matched);
        self.match_peaks(spectrum, &sorted, tolerance, matched);
    }

    fn match_clusters(
        &self,
        spectrum: &mut Spectrum,
        arena: &FragmentArena,
        sorted: &SortedFragments<'_>,
        tolerance: &Tolerance,
        matched: &mut MatchedFragmentCollection,
    ) {
        let mut order: Vec<usize> = (0..spectrum.clusters().len()).collect();
        order.sort_by(|a, b| {
            spectrum
                .cluster(*b)
                .neutral_mass()
                .total_cmp(&spectrum.cluster(*a).neutral_mass())
        });
        let mut cursor = sorted.fragments.len();
        let mut envelopes: Vec<(Vec<usize>, usize)> = Vec::new();
        let before = matched.len();

        for cluster_index in order {
            let cluster = spectrum.cluster(cluster_index);
            let (peak, charge, mz) = (cluster.monoisotopic, cluster.charge, cluster.mz);
            let mass = cluster.neutral_mass();
            let charged = mz * charge as f64;
            let (min, max) = tolerance.bounds(mass, charged);
            sorted.lower_cursor(&mut cursor, max);

            let mut result = WindowResult::default();
            for fragment in sorted.window(cursor, min, max) {
                record_match(
                    spectrum,
                    matched,
                    fragment,
                    charge,
                    peak,
                    PeakAnnotation::new(fragment.id(), charge).with_cluster(cluster_index),
                );
                result.any = true;
                result.primary |= fragment.is_primary_evidence();

                if self.settings.transfer_loss_to_base
                    && fragment.is_loss()
                    && !matched.has_matched_non_lossy(fragment.base(), charge)
                {
                    let base = &arena[fragment.base()];
                    if let Some(envelope) = find_envelope(spectrum, base, charge, tolerance) {
                        let index = spectrum.clusters().len() + envelopes.len();
                        trace!(
                            fragment = fragment.name(),
                            base = base.name(),
                            peaks = envelope.len(),
                            "transferred loss to base"
                        );
                        record_match(
                            spectrum,
                            matched,
                            base,
                            charge,
                            envelope[0],
                            PeakAnnotation::new(base.id(), charge).with_cluster(index),
                        );
                        envelopes.push((envelope, charge));
                    }
                }
            }

            if self.settings.match_missing_monoisotopic
                && !result.primary
                && mass > MISSING_MONOISOTOPIC_FLOOR
            {
                let missing = mass - C13_MASS_DIFFERENCE;
                let (min, max) = tolerance.bounds(missing, charged - C13_MASS_DIFFERENCE);
                let missing_mz = mz - C13_MASS_DIFFERENCE / charge as f64;
                for fragment in sorted.window(cursor, min, max) {
                    if (result.any && !fragment.is_loss()) || matched.has_matched(fragment, charge)
                    {
                        continue;
                    }
                    trace!(
                        fragment = fragment.name(),
                        charge,
                        cluster = cluster_index,
                        "matched with a missing monoisotopic peak"
                    );
                    spectrum.annotate(
                        peak,
                        PeakAnnotation::new(fragment.id(), charge)
                            .with_cluster(cluster_index)
                            .with_missing_monoisotopic(missing_mz),
                    );
                    matched.add(fragment, charge, peak);
                }
            }
        }

        let recovered = envelopes.len();
        for (peaks, charge) in envelopes {
            spectrum.push_cluster(peaks, charge);
        }
        debug!(
            clusters = spectrum.clusters().len(),
            recovered,
            groups = matched.len().saturating_sub(before),
            "matched isotope clusters"
        );
    }

    fn match_peaks(
        &self,
        spectrum: &mut Spectrum,
        sorted: &SortedFragments<'_>,
        tolerance: &Tolerance,
        matched: &mut MatchedFragmentCollection,
    ) {
        let max_charge = spectrum.precursor_charge().max(1);
        let mut cursors = vec![sorted.fragments.len(); max_charge + 1];
        let mut searched = 0;

        for peak in (0..spectrum.peaks().len()).rev() {
            if spectrum.peak(peak).in_cluster() {
                continue;
            }
            searched += 1;
            let mz = spectrum.peak(peak).mz;
            let mut result = WindowResult::default();
            for charge in (1..=max_charge).rev() {
                let mass = neutral_mass(mz, charge);
                let (min, max) = tolerance.bounds(mass, mz * charge as f64);
                sorted.lower_cursor(&mut cursors[charge], max);
                for fragment in sorted.window(cursors[charge], min, max) {
                    record_match(
                        spectrum,
                        matched,
                        fragment,
                        charge,
                        peak,
                        PeakAnnotation::new(fragment.id(), charge),
                    );
                    result.any = true;
                    result.primary |= fragment.is_primary_evidence();
                }
            }

            if !self.settings.match_missing_monoisotopic || result.primary {
                continue;
            }
            let floor = if result.any {
                MISSING_MONOISOTOPIC_FLOOR_AFTER_LOSS
            } else {
                MISSING_MONOISOTOPIC_FLOOR
            };
            for charge in (1..=max_charge).rev() {
                let mass = neutral_mass(mz, charge);
                if mass <= floor {
                    continue;
                }
                let missing = mass - C13_MASS_DIFFERENCE;
                let missing_mz = missing / charge as f64 + PROTON_MASS;
                let (min, max) = tolerance.bounds(missing, missing_mz * charge as f64);
                for fragment in sorted.window(cursors[charge], min, max) {
                    if (result.any && !fragment.is_loss()) || matched.has_matched(fragment, charge)
                    {
                        continue;
                    }
                    trace!(
                        fragment = fragment.name(),
                        charge,
                        peak,
                        "matched with a missing monoisotopic peak"
                    );
                    spectrum.annotate(
                        peak,
                        PeakAnnotation::new(fragment.id(), charge)
                            .with_missing_monoisotopic(missing_mz),
                    );
                    matched.add(fragment, charge, peak);
                }
            }
        }
        debug!(
            peaks = searched,
            non_lossy = matched.matched_non_lossy(),
            lossy = matched.matched_lossy(),
            "matched loose peaks"
        );
    }
}

/// Record a real match, any earlier match of the fragment at this charge is dropped first
fn record_match(
    spectrum: &mut Spectrum,
    matched: &mut MatchedFragmentCollection,
    fragment: &Fragment,
    charge: usize,
    peak: usize,
    annotation: PeakAnnotation,
) {
    if let Some(previous) = matched.matched_peak(fragment, charge) {
        spectrum.remove_annotation(previous, fragment.id(), charge);
        matched.remove(fragment, charge);
    }
    spectrum.annotate(peak, annotation);
    matched.add(fragment, charge, peak);
}

/// Look for the isotope envelope of the fragment in the raw peaks. The monoisotopic peak has to
/// be known as an isotope of something else. The envelope ends when the intensity rises again
/// after having dropped. Returns the peaks when there are at least two.
fn find_envelope(
    spectrum: &Spectrum,
    fragment: &Fragment,
    charge: usize,
    tolerance: &Tolerance,
) -> Option<Vec<usize>> {
    let mz = fragment.mz(charge);
    let first = spectrum.peak_at(mz, tolerance)?;
    if !spectrum.peak(first).flags.isotope {
        return None;
    }
    let step = C13_MASS_DIFFERENCE / charge as f64;
    let mut peaks = vec![first];
    let mut previous = spectrum.peak(first).intensity;
    let mut down = false;
    for n in 1.. {
        let Some(next) = spectrum.peak_at((n as f64).mul_add(step, mz), tolerance) else {
            break;
        };
        let intensity = spectrum.peak(next).intensity;
        if previous * ENVELOPE_STEP > intensity {
            down = true;
        } else if down && previous < intensity * ENVELOPE_STEP {
            break;
        }
        peaks.push(next);
        previous = intensity;
    }
    (peaks.len() > 1).then_some(peaks)
}
