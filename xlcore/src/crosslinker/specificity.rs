use std::{borrow::Cow, collections::BTreeMap};

use context_error::{BoxedError, Context};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, ConfigurationErrorKind},
    helper_functions::split_list,
    sequence::{IsAminoAcid, ModificationKind, ModifiedAminoAcid, Peptide, Residue},
};

/// Anything a cross-linker can be placed on: a peptide or a fragment of one.
pub trait LinkableSequence {
    /// The number of residues
    fn link_len(&self) -> usize;
    /// The residue at the given position
    fn link_residue(&self, site: usize) -> &Residue;
    /// If the first residue carries the protein N-terminus
    fn link_n_terminal(&self) -> bool;
    /// If the last residue carries the protein C-terminus
    fn link_c_terminal(&self) -> bool;
}

impl LinkableSequence for Peptide {
    fn link_len(&self) -> usize {
        self.len()
    }
    fn link_residue(&self, site: usize) -> &Residue {
        self.residue_at(site)
    }
    fn link_n_terminal(&self) -> bool {
        self.is_n_terminal()
    }
    fn link_c_terminal(&self) -> bool {
        self.is_c_terminal()
    }
}

/// The symbol a residue is known as for cross-linking, isotope labels do not change reactivity.
fn link_symbol(residue: &Residue) -> Cow<'_, str> {
    match residue.modification() {
        Some(m) if m.kind() == ModificationKind::Label => m.base_amino_acid().symbol(),
        _ => residue.symbol(),
    }
}

/// The sites one end of a cross-linker can react with. Residues are identified by their symbol
/// so a modified residue only links if it is listed itself.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SiteRestriction {
    /// Reactive residue symbols with their weight, a lower weight is more likely
    residues: BTreeMap<String, OrderedFloat<f64>>,
    /// The weight of the protein N-terminus, if it reacts
    n_terminal: Option<OrderedFloat<f64>>,
    /// The weight of the protein C-terminus, if it reacts
    c_terminal: Option<OrderedFloat<f64>>,
    unrestricted: bool,
}

impl SiteRestriction {
    /// A restriction that accepts any residue
    pub fn unrestricted() -> Self {
        Self {
            unrestricted: true,
            ..Self::default()
        }
    }

    /// Accept the given residue symbols, all with weight 0
    pub fn residues<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            residues: symbols
                .into_iter()
                .map(|s| (s.into(), OrderedFloat(0.0)))
                .collect(),
            ..Self::default()
        }
    }

    /// Also accept the protein N-terminus with the given weight
    #[must_use]
    pub fn with_n_terminal(self, weight: f64) -> Self {
        Self {
            n_terminal: Some(OrderedFloat(weight)),
            ..self
        }
    }

    /// Also accept the protein C-terminus with the given weight
    #[must_use]
    pub fn with_c_terminal(self, weight: f64) -> Self {
        Self {
            c_terminal: Some(OrderedFloat(weight)),
            ..self
        }
    }

    /// Parse a list like `K,S(0.2),T(0.2),Y(0.2),nterm`. `*`, `ANY`, `X` or `XAA` accept
    /// everything, as does listing 20 or more residues. A weight in parentheses defaults to 0.
    /// # Errors
    /// If a weight is not a number or if none of the listed residues is known.
    pub fn parse(text: &str, known: &[ModifiedAminoAcid]) -> Result<Self, ConfigurationError> {
        let mut result = Self::default();
        let mut listed_residues = false;
        for item in split_list(text) {
            let (name, weight) = match item.split_once('(') {
                Some((name, rest)) => {
                    let weight = rest.trim_end_matches(')').trim();
                    let weight = weight.parse::<f64>().map_err(|_| {
                        BoxedError::new(
                            ConfigurationErrorKind::InvalidNumber,
                            "Invalid link weight",
                            format!("The weight '{weight}' for '{}' is not a number", name.trim()),
                            Context::show(text.to_string()),
                        )
                    })?;
                    (name.trim(), weight)
                }
                None => (item, 0.0),
            };
            if ["*", "ANY", "X", "XAA"]
                .iter()
                .any(|any| name.eq_ignore_ascii_case(any))
            {
                result.residues.clear();
                result.unrestricted = true;
                break;
            }
            match name.replace('-', "").to_ascii_lowercase().as_str() {
                "nterm" => result.n_terminal = Some(OrderedFloat(weight)),
                "cterm" => result.c_terminal = Some(OrderedFloat(weight)),
                _ => {
                    listed_residues = true;
                    if let Some(residue) = Residue::from_symbol(name, known) {
                        result
                            .residues
                            .insert(link_symbol(&residue).into_owned(), OrderedFloat(weight));
                    } else {
                        tracing::warn!("ignoring unknown linked residue '{name}' in '{text}'");
                    }
                }
            }
        }
        if listed_residues && result.residues.is_empty() && !result.unrestricted {
            return Err(BoxedError::new(
                ConfigurationErrorKind::InvalidSpecificity,
                "Invalid linker specificity",
                "None of the linked residues are recognised",
                Context::show(text.to_string()),
            ));
        }
        if result.residues.len() >= 20 {
            result.residues.clear();
            result.unrestricted = true;
        }
        Ok(result)
    }

    /// If this accepts any residue
    pub const fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// If this accepts the protein N-terminus
    pub const fn links_n_terminal(&self) -> bool {
        self.n_terminal.is_some()
    }

    /// If this accepts the protein C-terminus
    pub const fn links_c_terminal(&self) -> bool {
        self.c_terminal.is_some()
    }

    /// The accepted residue symbols with their weights
    pub fn residue_weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.residues.iter().map(|(s, w)| (s.as_str(), w.0))
    }

    /// The weight of a residue on its own: 0 when unrestricted, infinite if not accepted
    pub fn residue_weight(&self, residue: &Residue) -> f64 {
        if self.unrestricted {
            0.0
        } else {
            self.residues
                .get(link_symbol(residue).as_ref())
                .map_or(f64::INFINITY, |w| w.0)
        }
    }

    /// Check a site. When `peptide_rule` is set the last residue of a sequence that does not
    /// end the protein never links, a protease would not have cut after a linked residue.
    pub fn allows(
        &self,
        sequence: &impl LinkableSequence,
        site: usize,
        peptide_rule: bool,
    ) -> bool {
        let last = sequence.link_len().saturating_sub(1);
        let residue = sequence.link_residue(site);
        let not_capped = !peptide_rule || site < last || sequence.link_c_terminal();
        let linear = residue
            .modification()
            .is_some_and(|m| m.kind() == ModificationKind::Linear);
        (!linear
            && not_capped
            && (self.unrestricted || self.residues.contains_key(link_symbol(residue).as_ref())))
            || (self.n_terminal.is_some() && site == 0 && sequence.link_n_terminal())
            || (self.c_terminal.is_some() && site == last && sequence.link_c_terminal())
    }

    /// The weight of linking at the site, infinite if the site is not accepted
    pub fn weight(&self, sequence: &impl LinkableSequence, site: usize) -> f64 {
        let mut weight = self.residue_weight(sequence.link_residue(site));
        if site == 0
            && sequence.link_n_terminal()
            && let Some(n) = self.n_terminal
        {
            weight = weight.min(n.0);
        }
        if site + 1 == sequence.link_len()
            && sequence.link_c_terminal()
            && let Some(c) = self.c_terminal
        {
            weight = weight.min(c.0);
        }
        weight
    }
}

/// Where a cross-linker can react.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum LinkerSpecificity {
    /// Both ends react with the same sites
    Symmetric(SiteRestriction),
    /// The first end reacts with the first sites, the second end with the second
    Asymmetric(SiteRestriction, SiteRestriction),
    /// Never links, used to search linear peptides only
    None,
}

impl LinkerSpecificity {
    /// If either end can react at the site
    pub fn allows(&self, sequence: &impl LinkableSequence, site: usize, peptide_rule: bool) -> bool {
        match self {
            Self::Symmetric(rule) => rule.allows(sequence, site, peptide_rule),
            Self::Asymmetric(first, second) => {
                let last = sequence.link_len().saturating_sub(1);
                if (first.is_unrestricted() || second.is_unrestricted())
                    && (!peptide_rule || site < last || sequence.link_c_terminal())
                {
                    true
                } else {
                    first.allows(sequence, site, peptide_rule)
                        || second.allows(sequence, site, peptide_rule)
                }
            }
            Self::None => false,
        }
    }

    /// If the two sites can be joined
    pub fn allows_pair(
        &self,
        a: &impl LinkableSequence,
        site_a: usize,
        b: &impl LinkableSequence,
        site_b: usize,
        peptide_rule: bool,
    ) -> bool {
        match self {
            Self::Symmetric(rule) => {
                rule.allows(a, site_a, peptide_rule) && rule.allows(b, site_b, peptide_rule)
            }
            Self::Asymmetric(first, second) => {
                (first.allows(a, site_a, peptide_rule) && second.allows(b, site_b, peptide_rule))
                    || (second.allows(a, site_a, peptide_rule)
                        && first.allows(b, site_b, peptide_rule))
            }
            Self::None => false,
        }
    }

    /// The lowest weight of any end at this site
    pub fn weight(&self, sequence: &impl LinkableSequence, site: usize) -> f64 {
        match self {
            Self::Symmetric(rule) => rule.weight(sequence, site),
            Self::Asymmetric(first, second) => {
                first.weight(sequence, site).min(second.weight(sequence, site))
            }
            Self::None => 0.0,
        }
    }

    /// All restrictions, one for a symmetric linker
    pub fn restrictions(&self) -> Vec<&SiteRestriction> {
        match self {
            Self::Symmetric(rule) => vec![rule],
            Self::Asymmetric(first, second) => vec![first, second],
            Self::None => Vec::new(),
        }
    }
}
