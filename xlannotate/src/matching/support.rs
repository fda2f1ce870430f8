use serde::{Deserialize, Serialize};

use super::MatchedFragmentCollection;
use crate::fragment::{FragmentArena, FragmentId, FragmentKind};

/// How well a matched fragment is supported by the other matches, used by scoring
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SupportLevel {
    /// A fragment that is not a loss, with the number of its matched losses
    NonLossy {
        /// The number of matched losses of this fragment
        losses: usize,
    },
    /// A loss whose base fragment matched as well
    LossySupportedByBase,
    /// A loss with more than two losses of the same base matched
    LossySupportedByLosses,
    /// A loss on its own
    Lossy,
    /// A double fragmentation with a matched primary fragment sharing one of its ends
    DoubleFragmentationSupported,
    /// A double fragmentation on its own
    DoubleFragmentation,
    /// Anything else, like cross-linker stubs and immonium ions
    Other,
}

impl SupportLevel {
    /// The weight of this level in scoring
    pub fn weight(self) -> f64 {
        match self {
            Self::NonLossy { losses } => 20.0f64.mul_add(losses as f64, 500.0),
            Self::LossySupportedByBase => 50.0,
            Self::LossySupportedByLosses => 40.0,
            Self::Lossy => 20.0,
            Self::DoubleFragmentationSupported => 30.0,
            Self::DoubleFragmentation => 15.0,
            Self::Other => 0.0,
        }
    }

    /// Classify a fragment matched at the charge
    pub fn classify(
        arena: &FragmentArena,
        fragment: FragmentId,
        charge: usize,
        matched: &MatchedFragmentCollection,
    ) -> Self {
        let record = &arena[fragment];
        let group = matched.group(record.base(), charge);
        if record.is_immonium() {
            return Self::Other;
        }
        match record.kind() {
            FragmentKind::Stub { .. } => Self::Other,
            FragmentKind::Loss(_) => match group {
                Some(group) if group.base_found() => Self::LossySupportedByBase,
                Some(group) if group.losses().len() > 2 => Self::LossySupportedByLosses,
                _ => Self::Lossy,
            },
            FragmentKind::CrossLinked { .. } if record.fragmentation_sites() > 1 => {
                Self::DoubleFragmentation
            }
            FragmentKind::DoubleFragmentation
            | FragmentKind::LoopLinked {
                second: Some(_), ..
            } => {
                if supported_double(arena, fragment, charge, matched) {
                    Self::DoubleFragmentationSupported
                } else {
                    Self::DoubleFragmentation
                }
            }
            FragmentKind::Primary(_)
            | FragmentKind::CrossLinked { .. }
            | FragmentKind::LoopLinked { .. } => Self::NonLossy {
                losses: group.map_or(0, |group| group.losses().len()),
            },
        }
    }
}

/// A primary fragment of the same peptide, matched at this or a higher charge, that starts or
/// ends where this fragment does
fn supported_double(
    arena: &FragmentArena,
    fragment: FragmentId,
    charge: usize,
    matched: &MatchedFragmentCollection,
) -> bool {
    let record = &arena[fragment];
    let span = record.span();
    matched
        .iter()
        .filter(|group| group.charge() >= charge && group.base_found() && group.base() != fragment)
        .map(|group| &arena[group.base()])
        .any(|other| {
            matches!(other.kind(), FragmentKind::Primary(_))
                && !other.is_immonium()
                && other.peptide() == record.peptide()
                && (other.start() == span.start || other.span().end == span.end)
        })
}
