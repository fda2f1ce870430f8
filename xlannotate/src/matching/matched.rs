use context_error::{BoxedError, Context};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{BookkeepingError, BookkeepingErrorKind},
    fragment::{Fragment, FragmentId},
};

/// The matches of one base fragment and the losses derived from it at one charge.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct MatchedBaseFragment {
    base: FragmentId,
    charge: usize,
    base_peak: Option<usize>,
    losses: IndexMap<FragmentId, usize>,
}

impl MatchedBaseFragment {
    /// An empty group
    pub fn new(base: FragmentId, charge: usize) -> Self {
        Self {
            base,
            charge,
            base_peak: None,
            losses: IndexMap::new(),
        }
    }

    /// The base fragment
    pub const fn base(&self) -> FragmentId {
        self.base
    }

    /// The charge
    pub const fn charge(&self) -> usize {
        self.charge
    }

    /// The peak the base fragment matched, if it did
    pub const fn base_peak(&self) -> Option<usize> {
        self.base_peak
    }

    /// If the base fragment itself was matched
    pub const fn base_found(&self) -> bool {
        self.base_peak.is_some()
    }

    /// The matched losses with their peak, in the order they were matched
    pub const fn losses(&self) -> &IndexMap<FragmentId, usize> {
        &self.losses
    }

    /// The peak a fragment of this group matched
    pub fn peak(&self, fragment: FragmentId) -> Option<usize> {
        if fragment == self.base {
            self.base_peak
        } else {
            self.losses.get(&fragment).copied()
        }
    }

    /// All matched fragments with their peak, the base first
    pub fn fragments(&self) -> impl Iterator<Item = (FragmentId, usize)> + '_ {
        self.base_peak
            .map(|peak| (self.base, peak))
            .into_iter()
            .chain(self.losses.iter().map(|(id, peak)| (*id, *peak)))
    }

    /// If nothing is matched
    pub fn is_empty(&self) -> bool {
        self.base_peak.is_none() && self.losses.is_empty()
    }
}

/// All matched fragments of one spectrum, grouped per charge by base fragment. The counters of
/// matched lossy and non-lossy fragments always agree with the content.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct MatchedFragmentCollection {
    /// Indexed by charge, index 0 stays empty
    charges: Vec<IndexMap<FragmentId, MatchedBaseFragment>>,
    matched_non_lossy: usize,
    matched_lossy: usize,
}

impl Default for MatchedFragmentCollection {
    fn default() -> Self {
        Self::new(10)
    }
}

impl MatchedFragmentCollection {
    /// An empty collection with room for the given maximal charge, higher charges are added
    /// when needed
    pub fn new(max_charge: usize) -> Self {
        Self {
            charges: vec![IndexMap::new(); max_charge + 1],
            matched_non_lossy: 0,
            matched_lossy: 0,
        }
    }

    fn charge_mut(
        charges: &mut Vec<IndexMap<FragmentId, MatchedBaseFragment>>,
        charge: usize,
    ) -> &mut IndexMap<FragmentId, MatchedBaseFragment> {
        if charges.len() <= charge {
            charges.resize_with(charge + 1, IndexMap::new);
        }
        &mut charges[charge]
    }

    /// Record a match of the fragment at the charge on a peak. Returns if this is a new match,
    /// matching an already matched fragment again only moves it to the new peak.
    pub fn add(&mut self, fragment: &Fragment, charge: usize, peak: usize) -> bool {
        let base = fragment.base();
        let group = Self::charge_mut(&mut self.charges, charge)
            .entry(base)
            .or_insert_with(|| MatchedBaseFragment::new(base, charge));
        let new = if fragment.is_loss() {
            let new = group.losses.insert(fragment.id(), peak).is_none();
            if new {
                self.matched_lossy += 1;
            }
            new
        } else {
            let new = group.base_peak.replace(peak).is_none();
            if new {
                self.matched_non_lossy += 1;
            } else {
                warn!(
                    fragment = fragment.name(),
                    charge, peak, "fragment was already matched, moved to the new peak"
                );
            }
            new
        };
        self.debug_check();
        new
    }

    /// Merge a whole group into the collection. The base counts as found if it was found in
    /// either, losses that were already matched keep their peak.
    pub fn add_group(&mut self, group: MatchedBaseFragment) {
        let existing = Self::charge_mut(&mut self.charges, group.charge)
            .entry(group.base)
            .or_insert_with(|| MatchedBaseFragment::new(group.base, group.charge));
        if existing.base_peak.is_none()
            && let Some(peak) = group.base_peak
        {
            existing.base_peak = Some(peak);
            self.matched_non_lossy += 1;
        }
        for (loss, peak) in group.losses {
            if !existing.losses.contains_key(&loss) {
                existing.losses.insert(loss, peak);
                self.matched_lossy += 1;
            }
        }
        if existing.is_empty() {
            let (base, charge) = (existing.base, existing.charge);
            self.charges[charge].shift_remove(&base);
        }
        self.debug_check();
    }

    /// Forget the match of the fragment at the charge, returns if it was matched. A group
    /// without matches is removed.
    pub fn remove(&mut self, fragment: &Fragment, charge: usize) -> bool {
        let base = fragment.base();
        let Some(group) = self
            .charges
            .get_mut(charge)
            .and_then(|groups| groups.get_mut(&base))
        else {
            return false;
        };
        let removed = if fragment.is_loss() {
            let removed = group.losses.shift_remove(&fragment.id()).is_some();
            if removed {
                self.matched_lossy -= 1;
            }
            removed
        } else {
            let removed = group.base_peak.take().is_some();
            if removed {
                self.matched_non_lossy -= 1;
            }
            removed
        };
        if group.is_empty() {
            self.charges[charge].shift_remove(&base);
        }
        self.debug_check();
        removed
    }

    /// Remove the group of the base fragment at the charge
    pub fn remove_group(&mut self, base: FragmentId, charge: usize) -> Option<MatchedBaseFragment> {
        let group = self.charges.get_mut(charge)?.shift_remove(&base)?;
        self.matched_lossy -= group.losses.len();
        if group.base_found() {
            self.matched_non_lossy -= 1;
        }
        self.debug_check();
        Some(group)
    }

    /// The peak the fragment matched at the charge
    pub fn matched_peak(&self, fragment: &Fragment, charge: usize) -> Option<usize> {
        self.group(fragment.base(), charge)
            .and_then(|group| group.peak(fragment.id()))
    }

    /// The group of the base fragment at the charge
    pub fn group(&self, base: FragmentId, charge: usize) -> Option<&MatchedBaseFragment> {
        self.charges.get(charge).and_then(|groups| groups.get(&base))
    }

    /// The groups of the base fragment at every charge
    pub fn groups_for(&self, base: FragmentId) -> impl Iterator<Item = &MatchedBaseFragment> + '_ {
        self.charges.iter().filter_map(move |groups| groups.get(&base))
    }

    /// If anything derived from the base fragment matched at the charge
    pub fn has_group(&self, base: FragmentId, charge: usize) -> bool {
        self.group(base, charge).is_some()
    }

    /// If anything derived from the base fragment matched at any charge
    pub fn has_group_any(&self, base: FragmentId) -> bool {
        self.groups_for(base).next().is_some()
    }

    /// If the fragment matched at the charge
    pub fn has_matched(&self, fragment: &Fragment, charge: usize) -> bool {
        self.matched_peak(fragment, charge).is_some()
    }

    /// If the fragment matched at any charge
    pub fn has_matched_any(&self, fragment: &Fragment) -> bool {
        self.groups_for(fragment.base())
            .any(|group| group.peak(fragment.id()).is_some())
    }

    /// If the base fragment itself matched at the charge
    pub fn has_matched_non_lossy(&self, base: FragmentId, charge: usize) -> bool {
        self.group(base, charge)
            .is_some_and(MatchedBaseFragment::base_found)
    }

    /// All groups, by increasing charge
    pub fn iter(&self) -> impl Iterator<Item = &MatchedBaseFragment> + '_ {
        self.charges.iter().flat_map(IndexMap::values)
    }

    /// The number of groups
    pub fn len(&self) -> usize {
        self.charges.iter().map(IndexMap::len).sum()
    }

    /// If nothing matched
    pub fn is_empty(&self) -> bool {
        self.charges.iter().all(IndexMap::is_empty)
    }

    /// Forget all matches
    pub fn clear(&mut self) {
        for groups in &mut self.charges {
            groups.clear();
        }
        self.matched_lossy = 0;
        self.matched_non_lossy = 0;
    }

    /// The highest charge anything matched at, 0 if nothing matched
    pub fn max_charge(&self) -> usize {
        self.charges
            .iter()
            .rposition(|groups| !groups.is_empty())
            .unwrap_or_default()
    }

    /// All matches as `(fragment, charge, peak)`
    pub fn fragments(&self) -> Vec<(FragmentId, usize, usize)> {
        self.iter()
            .flat_map(|group| {
                group
                    .fragments()
                    .map(move |(fragment, peak)| (fragment, group.charge, peak))
            })
            .collect()
    }

    /// Fold all charges into one singly charged view, a fragment matched at several charges
    /// keeps the peak of its lowest charge
    pub fn to_singly_charged(&self) -> Self {
        self.to_singly_charged_min_losses(0)
    }

    /// Fold all charges into one singly charged view, leaving out groups without a matched
    /// base fragment that have fewer than `min_losses` matched losses
    pub fn to_singly_charged_min_losses(&self, min_losses: usize) -> Self {
        let mut result = Self::new(1);
        for group in self
            .iter()
            .filter(|group| group.base_found() || group.losses.len() >= min_losses)
        {
            let mut folded = group.clone();
            folded.charge = 1;
            result.add_group(folded);
        }
        result
    }

    /// The number of matched fragments that are not losses
    pub const fn matched_non_lossy(&self) -> usize {
        self.matched_non_lossy
    }

    /// The number of matched losses
    pub const fn matched_lossy(&self) -> usize {
        self.matched_lossy
    }

    /// Count the matched `(non lossy, lossy)` fragments from the content
    pub fn recount(&self) -> (usize, usize) {
        self.iter().fold((0, 0), |(non_lossy, lossy), group| {
            (
                non_lossy + usize::from(group.base_found()),
                lossy + group.losses.len(),
            )
        })
    }

    /// Check that the counters agree with the content and that every group sits under its own
    /// base and charge and has at least one match.
    /// # Errors
    /// If any of these do not hold.
    pub fn check_consistency(&self) -> Result<(), BookkeepingError> {
        let (non_lossy, lossy) = self.recount();
        if non_lossy != self.matched_non_lossy || lossy != self.matched_lossy {
            return Err(BoxedError::new(
                BookkeepingErrorKind::InternalInconsistency,
                "Counters out of sync",
                format!(
                    "The collection counts {} non lossy and {} lossy matches but contains {non_lossy} non lossy and {lossy} lossy matches",
                    self.matched_non_lossy, self.matched_lossy
                ),
                Context::none(),
            ));
        }
        for (charge, groups) in self.charges.iter().enumerate() {
            for (base, group) in groups {
                if group.base != *base || group.charge != charge || group.is_empty() {
                    return Err(BoxedError::new(
                        BookkeepingErrorKind::InternalInconsistency,
                        "Misplaced group",
                        format!(
                            "The group of fragment {} at charge {} is stored under fragment {} at charge {charge}{}",
                            group.base.index(),
                            group.charge,
                            base.index(),
                            if group.is_empty() { " and is empty" } else { "" }
                        ),
                        Context::none(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check the consistency of the collection.
    /// # Panics
    /// If the collection is not consistent, this is always a programming error.
    pub fn assert_consistent(&self) {
        if let Err(error) = self.check_consistency() {
            panic!("{error}");
        }
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            self.assert_consistent();
        }
    }
}
