use context_error::{BoxedError, Context};
use serde::{Deserialize, Serialize};
use xlcore::{
    digest::DigestionSettings,
    error::{ConfigurationError, ConfigurationErrorKind},
    quantities::Tolerance,
};

use crate::fragment::LossLimits;

/// The numeric settings of a search
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// The tolerance for matching precursor masses
    pub precursor_tolerance: Tolerance,
    /// The tolerance for matching fragments against peaks
    pub fragment_tolerance: Tolerance,
    /// The maximal number of missed cleavages in a peptide
    pub max_missed_cleavages: usize,
    /// The minimal length of a peptide
    pub min_peptide_length: usize,
    /// The maximal mass of a peptide, unbounded if not set
    pub max_peptide_mass: Option<f64>,
    /// The maximal number of expected modifications on one peptide
    pub max_modifications_per_peptide: usize,
    /// The maximal number of modified variants of one peptide
    pub max_modified_peptides_per_peptide: usize,
    /// The maximal number of losses over a whole loss chain
    pub max_total_losses: usize,
    /// The maximal number of times one loss rule applies to one fragment
    pub max_losses: usize,
    /// Try to explain peaks as ions with a missing monoisotopic peak
    pub match_missing_monoisotopic: bool,
    /// Look for the base fragment of every matched loss in the raw peaks
    pub transfer_loss_to_base: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let digestion = DigestionSettings::default();
        let losses = LossLimits::default();
        Self {
            precursor_tolerance: Tolerance::new_ppm(6.0),
            fragment_tolerance: Tolerance::new_ppm(20.0),
            max_missed_cleavages: digestion.max_missed_cleavages,
            min_peptide_length: digestion.min_peptide_length,
            max_peptide_mass: None,
            max_modifications_per_peptide: digestion.max_modifications_per_peptide,
            max_modified_peptides_per_peptide: digestion.max_modified_peptides_per_peptide,
            max_total_losses: losses.max_total_losses,
            max_losses: losses.max_losses,
            match_missing_monoisotopic: true,
            transfer_loss_to_base: false,
        }
    }
}

impl SearchSettings {
    /// Read settings from JSON, missing fields keep their default
    /// # Errors
    /// If the text is not valid JSON for these settings.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|error| {
            BoxedError::new(
                ConfigurationErrorKind::InvalidValue,
                "Invalid settings",
                format!("The settings could not be read: {error}"),
                Context::show(text.to_string()),
            )
        })
    }

    /// The settings for digestion
    pub const fn digestion_settings(&self) -> DigestionSettings {
        DigestionSettings {
            max_missed_cleavages: self.max_missed_cleavages,
            min_peptide_length: self.min_peptide_length,
            max_modifications_per_peptide: self.max_modifications_per_peptide,
            max_modified_peptides_per_peptide: self.max_modified_peptides_per_peptide,
        }
    }

    /// The limits for loss generation
    pub const fn loss_limits(&self) -> LossLimits {
        LossLimits {
            max_losses: self.max_losses,
            max_total_losses: self.max_total_losses,
        }
    }

    /// The maximal peptide mass, infinite if not set
    pub fn max_peptide_mass(&self) -> f64 {
        self.max_peptide_mass.unwrap_or(f64::INFINITY)
    }
}
