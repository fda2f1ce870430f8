use std::fmt::Display;

use context_error::{BoxedError, Context};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{DigestionMethod, DigestionSettings};
use crate::{
    error::{ConfigurationError, ConfigurationErrorKind},
    helper_functions::str_starts_with,
    sequence::{AminoAcid, ModifiedAminoAcid, Peptide},
};

/// How the steps of a [`MultiStepDigest`] are combined
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum StepMethod {
    /// Every step digests the protein and the peptides of the previous step
    #[default]
    Full,
    /// Every step only digests the peptides of the previous step
    Consecutive,
    /// Every step digests the protein on its own
    Independent,
}

impl StepMethod {
    const ALL: [Self; 3] = [Self::Full, Self::Consecutive, Self::Independent];

    /// Find the method for the given name or prefix of a name (`cons` gives consecutive),
    /// ignoring case
    pub fn from_prefix(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|method| str_starts_with::<true>(method.name(), text))
    }

    /// The name as used in configuration
    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Consecutive => "consecutive",
            Self::Independent => "independent",
        }
    }
}

impl Display for StepMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Several digestions combined into one. Cleavage sites are those of the first step.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiStepDigest {
    name: String,
    method: StepMethod,
    steps: Vec<DigestionMethod>,
}

impl MultiStepDigest {
    /// Combine the steps with the given method
    pub fn new(method: StepMethod, steps: Vec<DigestionMethod>) -> Self {
        let name = format!(
            "{method}({})",
            steps.iter().map(DigestionMethod::name).join(",")
        );
        Self {
            name,
            method,
            steps,
        }
    }

    /// The name, built from the method and the names of the steps
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the steps are combined
    pub const fn method(&self) -> StepMethod {
        self.method
    }

    /// The steps
    pub fn steps(&self) -> &[DigestionMethod] {
        &self.steps
    }

    /// The settings of the first step
    pub fn settings(&self) -> DigestionSettings {
        self.steps
            .first()
            .map(DigestionMethod::settings)
            .unwrap_or_default()
    }

    /// Set the settings of every step, a step configured with its own missed cleavages keeps
    /// those
    pub fn apply_settings(&mut self, settings: DigestionSettings) {
        for step in &mut self.steps {
            let own = step.settings().max_missed_cleavages;
            step.apply_settings(settings);
            if own > 0 {
                step.set_max_missed_cleavages(own);
            }
        }
    }

    /// Set the missed cleavages of every step that does not allow any of its own
    pub fn set_max_missed_cleavages(&mut self, max: usize) {
        for step in &mut self.steps {
            if step.settings().max_missed_cleavages == 0 {
                step.set_max_missed_cleavages(max);
            }
        }
    }

    /// If the first step cuts after the given position
    pub fn is_cleavage_site(&self, residues: &[AminoAcid], position: usize) -> bool {
        self.steps
            .first()
            .is_some_and(|step| step.is_cleavage_site(residues, position))
    }

    /// If the peptide could come from the first step
    pub fn is_digested_peptide(&self, peptide: &Peptide) -> bool {
        self.steps
            .first()
            .is_some_and(|step| step.is_digested_peptide(peptide))
    }

    pub(crate) fn candidates(&self, base: &Peptide, max_mass: f64) -> Vec<Peptide> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Vec::new();
        };
        let mut result = first.candidates(base, max_mass);
        for step in rest {
            let redigest = |peptides: &[Peptide]| {
                peptides
                    .iter()
                    .flat_map(|peptide| step.candidates(peptide, max_mass))
                    .collect::<Vec<_>>()
            };
            match self.method {
                StepMethod::Consecutive => result = redigest(&result),
                StepMethod::Full => {
                    let mut step_result = step.candidates(base, max_mass);
                    step_result.extend(redigest(&result));
                    result.extend(step_result);
                }
                StepMethod::Independent => result.extend(step.candidates(base, max_mass)),
            }
        }
        // The same peptide from several steps keeps its highest missed cleavage count
        let mut folded: IndexMap<Peptide, usize> = IndexMap::with_capacity(result.len());
        for peptide in result {
            let missed = peptide.missed_cleavages();
            folded
                .entry(peptide)
                .and_modify(|max| *max = (*max).max(missed))
                .or_insert(missed);
        }
        folded
            .into_iter()
            .map(|(mut peptide, missed)| {
                peptide.set_missed_cleavages(missed);
                peptide
            })
            .collect()
    }

    /// `<method>|S|<Class>:<args>|S|<Class>:<args>...`, a literal `S|` or `P|` inside the
    /// arguments of a step is written as `\S|` or `\P|`.
    pub(super) fn parse_method(
        text: &str,
        known: &[ModifiedAminoAcid],
    ) -> Result<DigestionMethod, ConfigurationError> {
        let mut parts = text.split("|S|");
        let method_text = parts.next().unwrap_or_default();
        let method = StepMethod::from_prefix(method_text).ok_or_else(|| {
            BoxedError::new(
                ConfigurationErrorKind::InvalidValue,
                "Unknown step method",
                format!(
                    "The step method '{}' is not a prefix of 'full', 'consecutive' or 'independent'",
                    method_text.trim()
                ),
                Context::show(text.to_string()),
            )
        })?;
        let steps = parts
            .map(|step| {
                let (class, arguments) = step.split_once(':').unwrap_or((step, ""));
                let arguments = arguments
                    .replace("\\S|", "S|")
                    .replace("\\P|", "P|")
                    .replace("\\\\", "\\");
                DigestionMethod::parse(class, &arguments, known)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if steps.is_empty() {
            return Err(BoxedError::new(
                ConfigurationErrorKind::MissingArgument,
                "Missing digestion steps",
                "A multi step digestion needs at least one step",
                Context::show(text.to_string()),
            ));
        }
        Ok(Self::new(method, steps).into())
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        digest::{Digestion, PeptideIndices, Protease},
        sequence::Sequence,
    };

    fn step(residue: AminoAcid) -> DigestionMethod {
        Digestion::new(
            residue.to_string(),
            Protease::after(vec![residue]),
            DigestionSettings::default(),
        )
        .into()
    }

    fn digest(method: StepMethod) -> Vec<String> {
        let sequence = Arc::new(Sequence::from_text("p", "AAKGGRCCK", &[]).unwrap());
        let multi: DigestionMethod = MultiStepDigest::new(
            method,
            vec![step(AminoAcid::Lysine), step(AminoAcid::Arginine)],
        )
        .into();
        multi
            .digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default())
            .iter()
            .map(ToString::to_string)
            .sorted()
            .collect()
    }

    #[test]
    fn methods() {
        assert_eq!(digest(StepMethod::Consecutive), vec!["AAK", "CCK", "GGR"]);
        assert_eq!(
            digest(StepMethod::Independent),
            vec!["AAK", "AAKGGR", "CCK", "GGRCCK"]
        );
        assert_eq!(
            digest(StepMethod::Full),
            vec!["AAK", "AAKGGR", "CCK", "GGR", "GGRCCK"]
        );
    }

    #[test]
    fn highest_missed_cleavages_kept() {
        let sequence = Arc::new(Sequence::from_text("p", "AAKGGRCCK", &[]).unwrap());
        let both: DigestionMethod = Digestion::new(
            "KR",
            Protease::after(vec![AminoAcid::Lysine, AminoAcid::Arginine]),
            DigestionSettings {
                max_missed_cleavages: 1,
                ..DigestionSettings::default()
            },
        )
        .into();
        for method in [StepMethod::Independent, StepMethod::Full] {
            let multi: DigestionMethod =
                MultiStepDigest::new(method, vec![step(AminoAcid::Lysine), both.clone()]).into();
            let peptides: Vec<(String, usize)> = multi
                .digest(&sequence, f64::INFINITY, &[], &mut PeptideIndices::default())
                .iter()
                .map(|p| (p.to_string(), p.missed_cleavages()))
                .sorted()
                .collect();
            assert_eq!(
                peptides,
                vec![
                    ("AAK".to_string(), 0),
                    ("AAKGGR".to_string(), 1),
                    ("CCK".to_string(), 0),
                    ("GGR".to_string(), 0),
                    ("GGRCCK".to_string(), 1),
                ],
                "{method}"
            );
        }
    }

    #[test]
    fn parse() {
        let method = DigestionMethod::parse(
            "MultiStepDigest",
            "cons|S|PostAADigestion:DIGESTED:K;NAME:LysC|S|PostAAConstrainedDigestion:DIGESTED:R;CONSTRAINING:P;NAME:ArgC",
            &[],
        )
        .unwrap();
        let DigestionMethod::MultiStep(multi) = &method else {
            panic!("not a multi step digestion");
        };
        assert_eq!(multi.method(), StepMethod::Consecutive);
        assert_eq!(multi.steps().len(), 2);
        assert_eq!(multi.name(), "consecutive(LysC,ArgC)");
        assert!(DigestionMethod::parse("MultiStepDigest", "sideways|S|NoDigestion:", &[]).is_err());
        assert!(DigestionMethod::parse("MultiStepDigest", "full", &[]).is_err());
    }

    #[test]
    fn missed_cleavages_propagate() {
        let mut own = step(AminoAcid::Lysine);
        own.set_max_missed_cleavages(2);
        let mut multi = MultiStepDigest::new(StepMethod::Full, vec![own, step(AminoAcid::Arginine)]);
        multi.set_max_missed_cleavages(1);
        assert_eq!(multi.steps()[0].settings().max_missed_cleavages, 2);
        assert_eq!(multi.steps()[1].settings().max_missed_cleavages, 1);
    }
}
