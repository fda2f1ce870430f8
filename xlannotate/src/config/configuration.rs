use std::sync::Arc;

use context_error::{BoxedError, Context};
use itertools::Itertools;
use tracing::{debug, warn};
use xlcore::{
    arguments::{Arguments, parse_bool, parse_integer, parse_number},
    crosslinker::CrossLinker,
    digest::{DigestionMethod, PeptideIndices},
    error::{ConfigurationError, ConfigurationErrorKind, SequenceErrorKind},
    quantities::Tolerance,
    sequence::{AminoAcid, ModificationKind, ModifiedAminoAcid, Peptide, Sequence},
};

use super::{Registry, SearchSettings};
use crate::{
    fragment::{ION_TYPE_CLASSES, IonType},
    matching::MatcherSettings,
};

/// A run configuration: the registry, the settings and the digestion
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configuration {
    /// The cross-linkers, ion types, losses and modifications
    pub registry: Registry,
    /// The numeric settings
    pub settings: SearchSettings,
    /// The digestion, if one is configured
    pub digestion: Option<DigestionMethod>,
}

/// The modification kinds that can be configured
const MODIFICATION_KINDS: &[(&str, ModificationKind)] = &[
    ("fixed", ModificationKind::Fixed),
    ("variable", ModificationKind::Variable),
    ("known", ModificationKind::Known),
    ("linear", ModificationKind::Linear),
    ("label", ModificationKind::Label),
];

impl Configuration {
    /// Read a configuration from its text, one `key:arguments` setting per line. Lines starting
    /// with `#` and empty lines are skipped, keys are compared ignoring case and unknown keys
    /// are ignored.
    /// # Errors
    /// On the first line that cannot be read.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let mut configuration = Self::default();
        configuration.read(text)?;
        Ok(configuration)
    }

    /// Read more configuration lines into this configuration
    /// # Errors
    /// On the first line that cannot be read.
    pub fn read(&mut self, text: &str) -> Result<(), ConfigurationError> {
        for line in text.lines() {
            self.read_line(line)?;
        }
        let settings = self.settings.digestion_settings();
        if let Some(digestion) = &mut self.digestion {
            digestion.apply_settings(settings);
        }
        Ok(())
    }

    /// Read a single configuration line
    /// # Errors
    /// If the line cannot be read.
    pub fn read_line(&mut self, line: &str) -> Result<(), ConfigurationError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let Some((key, value)) = line.split_once(':') else {
            warn!(line, "ignored configuration line without a value");
            return Ok(());
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        debug!(key = key.as_str(), value, "configuration line");
        match key.as_str() {
            "crosslinker" => self.read_cross_linker(value)?,
            "digestion" => {
                let (class, arguments) = value.split_once(':').unwrap_or((value, ""));
                self.digestion = Some(DigestionMethod::parse(
                    class,
                    arguments,
                    self.registry.modifications(),
                )?);
            }
            "loss" => {
                let (class, arguments) = value
                    .find([':', ';'])
                    .map_or((value, ""), |index| (&value[..index], &value[index + 1..]));
                self.registry.parse_loss(class, arguments)?;
            }
            "fragment" => self.read_fragment(value, line)?,
            "modification" => self.read_modification(value, line)?,
            "tolerance" => self.read_tolerance(value, line)?,
            "missedcleavages" => self.settings.max_missed_cleavages = parse_integer(value, line)?,
            "minpeptidelength" => self.settings.min_peptide_length = parse_integer(value, line)?,
            "maxpeptidemass" => self.settings.max_peptide_mass = Some(parse_number(value, line)?),
            "max_modification_per_peptide" => {
                self.settings.max_modifications_per_peptide = parse_integer(value, line)?;
            }
            "max_modified_peptides_per_peptide" => {
                self.settings.max_modified_peptides_per_peptide = parse_integer(value, line)?;
            }
            "maxtotallosses" => self.settings.max_total_losses = parse_integer(value, line)?,
            "maxlosses" => self.settings.max_losses = parse_integer(value, line)?,
            "match_missing_monoisotopic" => {
                self.settings.match_missing_monoisotopic = parse_bool(value)?;
            }
            "transferlosstobase" => self.settings.transfer_loss_to_base = parse_bool(value)?,
            "custom" => {
                for custom in value.split("\\n") {
                    for inner in custom.lines() {
                        self.read_line(inner)?;
                    }
                }
            }
            _ => warn!(key = key.as_str(), "ignored unknown configuration key"),
        }
        Ok(())
    }

    fn read_cross_linker(&mut self, value: &str) -> Result<(), ConfigurationError> {
        let (class, arguments) = value.split_once(':').unwrap_or((value, ""));
        let wipe = class.trim().eq_ignore_ascii_case("wipe")
            || Arguments::parse(arguments)
                .get("NAME")
                .is_some_and(|name| name.eq_ignore_ascii_case("wipe"));
        if wipe {
            debug!("cleared cross-linkers");
            self.registry.clear_cross_linkers();
            return Ok(());
        }
        let linker = CrossLinker::parse(class, arguments, self.registry.modifications())?;
        self.registry.add_cross_linker(linker);
        Ok(())
    }

    fn read_fragment(&mut self, value: &str, line: &str) -> Result<(), ConfigurationError> {
        let (class, arguments) = value.split_once(';').unwrap_or((value, ""));
        let ion_type = IonType::from_class(class).ok_or_else(|| {
            BoxedError::new(
                ConfigurationErrorKind::UnknownClass,
                "Unknown fragment",
                format!(
                    "The fragment class '{}' is not known, use one of: {}",
                    class.trim(),
                    ION_TYPE_CLASSES.iter().map(|(name, _)| *name).join(", ")
                ),
                Context::show(line.to_string()),
            )
        })?;
        let id = Arguments::parse(arguments).integer("ID")?;
        self.registry.add_ion_type(ion_type, id);
        Ok(())
    }

    /// `fixed::SYMBOL:Ccm;MODIFIED:C;DELTAMASS:57.021464`
    fn read_modification(&mut self, value: &str, line: &str) -> Result<(), ConfigurationError> {
        let (kind, arguments) = value
            .split_once("::")
            .or_else(|| value.split_once(':'))
            .unwrap_or(("variable", value));
        let kind = MODIFICATION_KINDS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(kind.trim()))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                BoxedError::new(
                    ConfigurationErrorKind::UnknownClass,
                    "Unknown modification kind",
                    format!(
                        "The modification kind '{}' is not known, use one of: {}",
                        kind.trim(),
                        MODIFICATION_KINDS.iter().map(|(name, _)| *name).join(", ")
                    ),
                    Context::show(line.to_string()),
                )
            })?;
        let arguments = Arguments::parse(arguments);
        let symbol = arguments.require("SYMBOL")?;
        let base = arguments.require("MODIFIED")?;
        let base = AminoAcid::try_from(base.trim()).map_err(|()| {
            BoxedError::new(
                ConfigurationErrorKind::InvalidResidue,
                "Invalid modified residue",
                format!("'{base}' is not an amino acid"),
                Context::show(line.to_string()),
            )
        })?;
        let delta = parse_number(arguments.require("DELTAMASS")?, line)?;
        self.registry
            .add_modification(ModifiedAminoAcid::new(symbol, base, delta, kind));
        Ok(())
    }

    fn read_tolerance(&mut self, value: &str, line: &str) -> Result<(), ConfigurationError> {
        let (target, tolerance) = value.split_once(':').unwrap_or((value, ""));
        let tolerance = tolerance.parse::<Tolerance>()?;
        match target.trim().to_ascii_lowercase().as_str() {
            "precursor" => self.settings.precursor_tolerance = tolerance,
            "fragment" => self.settings.fragment_tolerance = tolerance,
            _ => {
                return Err(BoxedError::new(
                    ConfigurationErrorKind::InvalidValue,
                    "Invalid tolerance",
                    "A tolerance is set for either 'precursor' or 'fragment'",
                    Context::show(line.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Read a sequence using the configured modifications and apply the fixed modifications
    /// # Errors
    /// If the sequence contains an unknown residue or no residues at all.
    pub fn prepare_sequence(
        &self,
        header: &str,
        text: &str,
    ) -> Result<Sequence, BoxedError<'static, SequenceErrorKind>> {
        let mut sequence = Sequence::from_text(header, text, self.registry.modifications())?;
        sequence.apply_fixed_modifications(self.registry.modifications());
        Ok(sequence)
    }

    /// The settings for the matcher
    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings::from(&self.settings)
    }

    /// Digest the sequence with the configured digestion, without a digestion the whole
    /// sequence is the only peptide
    pub fn digest(&self, sequence: &Arc<Sequence>, indices: &mut PeptideIndices) -> Vec<Peptide> {
        let linkers = self.registry.cross_linkers().linkers();
        let max_mass = self.settings.max_peptide_mass();
        if let Some(digestion) = &self.digestion {
            digestion.digest(sequence, max_mass, linkers, indices)
        } else {
            let peptide = Peptide::new(sequence.clone(), 0, sequence.len());
            if peptide.mass() > max_mass || !peptide.is_valid() {
                return Vec::new();
            }
            indices.add(&peptide, linkers);
            vec![peptide]
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::fragment::{IonSeries, LossRule};

    const CONFIG: &str = "# a comment
crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:BS3;MASS:138.06807;LINKEDAMINOACIDS:K,S(0.2),nterm
digestion:PostAAConstrainedDigestion:DIGESTED:K,R;CONSTRAINING:P;NAME:Trypsin
modification:fixed::SYMBOL:Ccm;MODIFIED:C;DELTAMASS:57.021464
modification:variable::SYMBOL:Mox;MODIFIED:M;DELTAMASS:15.99491
fragment:BIon
fragment:YIon;ID:7
fragment:PeptideIon

loss:AminoAcidRestrictedLoss:NAME:H20;aminoacids:S,T,D,E;MASS:18.01056027;cterm;ID:1
loss:CrosslinkerModified
tolerance:precursor:5ppm
tolerance:FRAGMENT:0.02da
MissedCleavages:3
MAXTOTALLOSSES:6
TransferLossToBase:yes
something:unknown";

    #[test]
    fn full() {
        let configuration = Configuration::parse(CONFIG).unwrap();
        let registry = &configuration.registry;
        assert_eq!(registry.cross_linkers().len(), 1);
        assert!(registry.cross_linkers().get("bs3").is_some());
        assert_eq!(registry.ion_types().len(), 3);
        assert_eq!(
            registry.ion_types().id(IonType::Series(IonSeries::Y)),
            Some(7)
        );
        assert_eq!(registry.loss_rules().len(), 2);
        assert!(matches!(
            registry.loss_rules()[1],
            LossRule::CrossLinkerModified { .. }
        ));
        assert!(
            registry
                .modifications()
                .iter()
                .any(|m| m.kind() == ModificationKind::Fixed)
        );

        let settings = configuration.settings;
        assert_eq!(settings.precursor_tolerance, Tolerance::new_ppm(5.0));
        assert_eq!(settings.fragment_tolerance, Tolerance::new_absolute(0.02));
        assert_eq!(settings.max_missed_cleavages, 3);
        assert_eq!(settings.max_total_losses, 6);
        assert!(settings.transfer_loss_to_base);
        assert!(configuration.matcher_settings().transfer_loss_to_base);

        let digestion = configuration.digestion.as_ref().unwrap();
        assert_eq!(digestion.name(), "Trypsin");
        assert_eq!(digestion.settings().max_missed_cleavages, 3);
    }

    #[test]
    fn sequences() {
        let configuration = Configuration::parse(CONFIG).unwrap();
        let sequence = configuration.prepare_sequence("p", "PEPCMoxK").unwrap();
        assert_eq!(sequence.residue_at(3).to_string(), "Ccm");
        assert_eq!(sequence.residue_at(4).to_string(), "Mox");
        assert!(configuration.prepare_sequence("p", "PEPMbK").is_err());

        let sequence = Arc::new(configuration.prepare_sequence("p", "AAKAAARPAAK").unwrap());
        let mut indices = PeptideIndices::default();
        let peptides = configuration.digest(&sequence, &mut indices);
        assert!(!peptides.is_empty());
        assert!(peptides.iter().any(|p| p.to_string() == "AAKAAARPAAK"));

        let whole = Configuration::parse("fragment:BIon").unwrap();
        let mut indices = PeptideIndices::default();
        assert_eq!(whole.digest(&sequence, &mut indices).len(), 1);
    }

    #[test]
    fn wipe_and_custom() {
        let configuration = Configuration::parse(
            "crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:BS3;MASS:138.06807;LINKEDAMINOACIDS:K
crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:wipe
custom:crosslinker:SymetricSingleAminoAcidRestrictedCrossLinker:NAME:DSS;MASS:138.06807;LINKEDAMINOACIDS:K\\nfragment:BLikeDoubleFragmentation",
        )
        .unwrap();
        let registry = &configuration.registry;
        assert_eq!(registry.cross_linkers().len(), 1);
        assert!(registry.cross_linkers().get("DSS").is_some());
        assert!(registry.double_fragmentation());
    }

    #[test]
    fn errors() {
        for (line, kind) in [
            ("fragment:ZIon", ConfigurationErrorKind::UnknownClass),
            ("loss:Evaporation:MASS:1", ConfigurationErrorKind::UnknownClass),
            ("digestion:Pepsin", ConfigurationErrorKind::UnknownClass),
            ("crosslinker:Glue:NAME:x", ConfigurationErrorKind::UnknownClass),
            ("modification:sometimes::SYMBOL:Mox;MODIFIED:M;DELTAMASS:16", ConfigurationErrorKind::UnknownClass),
            ("modification:fixed::SYMBOL:Bx;MODIFIED:B;DELTAMASS:16", ConfigurationErrorKind::InvalidResidue),
            ("modification:fixed::SYMBOL:Mox;MODIFIED:M", ConfigurationErrorKind::MissingArgument),
            ("missedcleavages:many", ConfigurationErrorKind::InvalidNumber),
            ("maxpeptidemass:heavy", ConfigurationErrorKind::InvalidNumber),
            ("transferlosstobase:maybe", ConfigurationErrorKind::InvalidValue),
            ("tolerance:precursor:5", ConfigurationErrorKind::InvalidValue),
            ("tolerance:product:5ppm", ConfigurationErrorKind::InvalidValue),
        ] {
            let error = Configuration::parse(line).unwrap_err();
            assert_eq!(format!("{:?}", error.get_kind()), format!("{kind:?}"), "{line}");
        }
    }
}
