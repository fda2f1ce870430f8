use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;
use xlcore::chemistry::{PROTON_MASS, neutral_mass};

use crate::fragment::FragmentId;

/// What the deisotoping said about a peak
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PeakFlags {
    /// Part of an isotope cluster, but not its first peak
    pub isotope: bool,
    /// The first peak of an isotope cluster
    pub monoisotopic: bool,
}

/// Evidence attached to a peak by the matcher
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PeakAnnotation {
    /// The matched fragment
    pub fragment: FragmentId,
    /// The charge it matched at
    pub charge: usize,
    /// The m/z of the monoisotopic peak the match assumes, if it is missing from the spectrum
    pub missing_monoisotopic_mz: Option<f64>,
    /// The isotope cluster the match came from, if any
    pub cluster: Option<usize>,
}

impl PeakAnnotation {
    /// A match on the peak itself
    pub const fn new(fragment: FragmentId, charge: usize) -> Self {
        Self {
            fragment,
            charge,
            missing_monoisotopic_mz: None,
            cluster: None,
        }
    }

    /// The match came from an isotope cluster
    #[must_use]
    pub const fn with_cluster(self, cluster: usize) -> Self {
        Self {
            cluster: Some(cluster),
            ..self
        }
    }

    /// The match assumes a monoisotopic peak at this m/z that was not observed
    #[must_use]
    pub const fn with_missing_monoisotopic(self, mz: f64) -> Self {
        Self {
            missing_monoisotopic_mz: Some(mz),
            ..self
        }
    }

    /// If the match is a guess based on a missing monoisotopic peak
    pub const fn is_missing_monoisotopic(&self) -> bool {
        self.missing_monoisotopic_mz.is_some()
    }
}

/// An observed peak
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Peak {
    /// The mass over charge
    pub mz: f64,
    /// The intensity
    pub intensity: f64,
    /// The isotope flags
    pub flags: PeakFlags,
    /// The matches on this peak
    pub annotations: ThinVec<PeakAnnotation>,
}

impl Peak {
    /// Create a new peak without annotations
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz,
            intensity,
            flags: PeakFlags::default(),
            annotations: ThinVec::new(),
        }
    }

    /// The neutral mass if this peak has the given charge
    pub fn neutral_mass(&self, charge: usize) -> f64 {
        neutral_mass(self.mz, charge)
    }

    /// If the peak is part of an isotope cluster
    pub const fn in_cluster(&self) -> bool {
        self.flags.isotope || self.flags.monoisotopic
    }
}

/// A group of peaks recognised as the isotope envelope of one ion
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct IsotopeCluster {
    /// The index of the monoisotopic peak in the spectrum
    pub monoisotopic: usize,
    /// The indices of all peaks of the envelope, starting with the monoisotopic peak
    pub peaks: Vec<usize>,
    /// The m/z of the monoisotopic peak
    pub mz: f64,
    /// The charge
    pub charge: usize,
}

impl IsotopeCluster {
    /// The neutral mass of the monoisotopic ion
    pub fn neutral_mass(&self) -> f64 {
        neutral_mass(self.mz, self.charge)
    }

    /// The mass of the singly protonated monoisotopic ion
    pub fn singly_charged_mass(&self) -> f64 {
        self.neutral_mass() + PROTON_MASS
    }
}
