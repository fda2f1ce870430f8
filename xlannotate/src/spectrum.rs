//! The observed side: peaks, isotope clusters and the annotations the matcher leaves on them.

mod peak;

use std::ops::Range;

use serde::{Deserialize, Serialize};
use xlcore::quantities::Tolerance;

use crate::fragment::FragmentId;
pub use peak::*;

/// A fragmentation spectrum, the peaks are kept sorted by m/z.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Spectrum {
    precursor_charge: usize,
    peaks: Vec<Peak>,
    clusters: Vec<IsotopeCluster>,
}

impl Spectrum {
    /// Create a spectrum from its peaks in any order
    pub fn new(precursor_charge: usize, peaks: impl IntoIterator<Item = Peak>) -> Self {
        let mut peaks: Vec<Peak> = peaks.into_iter().collect();
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self {
            precursor_charge,
            peaks,
            clusters: Vec::new(),
        }
    }

    /// The charge of the precursor, the highest charge fragments are searched at
    pub const fn precursor_charge(&self) -> usize {
        self.precursor_charge
    }

    /// All peaks by increasing m/z
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// The peak at the index
    pub fn peak(&self, index: usize) -> &Peak {
        &self.peaks[index]
    }

    /// The isotope clusters
    pub fn clusters(&self) -> &[IsotopeCluster] {
        &self.clusters
    }

    /// The cluster at the index
    pub fn cluster(&self, index: usize) -> &IsotopeCluster {
        &self.clusters[index]
    }

    /// Register an isotope envelope found by deisotoping, the first peak is the monoisotopic
    /// one. The peaks are flagged so they are not searched on their own. Returns the index of
    /// the cluster, or `None` if there are no peaks.
    pub fn add_cluster(&mut self, peaks: Vec<usize>, charge: usize) -> Option<usize> {
        let (&monoisotopic, isotopes) = peaks.split_first()?;
        self.peaks[monoisotopic].flags.monoisotopic = true;
        for &peak in isotopes {
            self.peaks[peak].flags.isotope = true;
        }
        Some(self.push_cluster(peaks, charge))
    }

    /// Register a cluster without touching the peak flags
    pub(crate) fn push_cluster(&mut self, peaks: Vec<usize>, charge: usize) -> usize {
        let monoisotopic = peaks[0];
        self.clusters.push(IsotopeCluster {
            monoisotopic,
            mz: self.peaks[monoisotopic].mz,
            peaks,
            charge,
        });
        self.clusters.len() - 1
    }

    /// The indices of all peaks with an m/z in the inclusive range
    pub fn peaks_between(&self, min: f64, max: f64) -> Range<usize> {
        let start = self.peaks.partition_point(|p| p.mz < min);
        let end = self.peaks.partition_point(|p| p.mz <= max);
        start..end.max(start)
    }

    /// The peak closest to the m/z within the tolerance
    pub fn peak_at(&self, mz: f64, tolerance: &Tolerance) -> Option<usize> {
        let (min, max) = tolerance.bounds(mz, mz);
        self.peaks_between(min, max)
            .min_by(|a, b| {
                (self.peaks[*a].mz - mz)
                    .abs()
                    .total_cmp(&(self.peaks[*b].mz - mz).abs())
            })
    }

    /// Attach a match to a peak
    pub fn annotate(&mut self, peak: usize, annotation: PeakAnnotation) {
        self.peaks[peak].annotations.push(annotation);
    }

    /// Remove the matches of the fragment at the charge from a peak, returns if any was removed
    pub fn remove_annotation(&mut self, peak: usize, fragment: FragmentId, charge: usize) -> bool {
        let annotations = &mut self.peaks[peak].annotations;
        let before = annotations.len();
        annotations.retain(|a| a.fragment != fragment || a.charge != charge);
        annotations.len() != before
    }

    /// Remove all annotations, the spectrum can be matched again
    pub fn clear_annotations(&mut self) {
        for peak in &mut self.peaks {
            peak.annotations.clear();
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use super::*;

    fn spectrum() -> Spectrum {
        Spectrum::new(
            3,
            [
                Peak::new(500.0, 10.0),
                Peak::new(200.0, 5.0),
                Peak::new(500.004, 20.0),
                Peak::new(500.5, 8.0),
            ],
        )
    }

    #[test]
    fn lookup() {
        let spectrum = spectrum();
        assert_eq!(spectrum.peak(0).mz, 200.0);
        let tolerance = Tolerance::new_ppm(20.0);
        assert_eq!(spectrum.peaks_between(499.99, 500.01), 1..3);
        assert_eq!(spectrum.peak_at(500.003, &tolerance), Some(2));
        assert_eq!(spectrum.peak_at(500.0005, &tolerance), Some(1));
        assert_eq!(spectrum.peak_at(300.0, &tolerance), None);
        assert!(spectrum.peaks_between(600.0, 700.0).is_empty());
    }

    #[test]
    fn clusters_and_annotations() {
        let mut spectrum = spectrum();
        assert_eq!(spectrum.add_cluster(Vec::new(), 2), None);
        let cluster = spectrum.add_cluster(vec![1, 3], 2).unwrap();
        assert!(spectrum.peak(1).flags.monoisotopic);
        assert!(spectrum.peak(3).flags.isotope);
        assert!(!spectrum.peak(2).in_cluster());
        assert_eq!(spectrum.cluster(cluster).mz, 500.0);
        assert!((spectrum.cluster(cluster).neutral_mass() - 997.98545).abs() < 1e-4);

        let fragment = FragmentId::default();
        spectrum.annotate(2, PeakAnnotation::new(fragment, 1));
        spectrum.annotate(2, PeakAnnotation::new(fragment, 2).with_cluster(cluster));
        assert!(spectrum.remove_annotation(2, fragment, 1));
        assert!(!spectrum.remove_annotation(2, fragment, 1));
        assert_eq!(spectrum.peak(2).annotations.len(), 1);
        assert_eq!(spectrum.peak(2).annotations[0].cluster, Some(cluster));
        spectrum.clear_annotations();
        assert!(spectrum.peak(2).annotations.is_empty());
    }
}
