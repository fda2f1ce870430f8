use xlcore::crosslinker::CrossLinker;

use super::{FragmentArena, FragmentId, FragmentKind, NewFragment};

/// The ion types used for fragments made from two fragments
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct DoubleFragmentation {
    /// If fragments with two broken sides are allowed
    pub(crate) enabled: bool,
    /// The ion type id for these fragments
    pub(crate) ion_type: Option<usize>,
}

/// Link every fragment of one peptide to every fragment of the other. Each pair is named after
/// the side covering the smaller part of its peptide. Without double fragmentation one side has
/// to be the whole peptide. With known link sites both sides have to contain their site.
pub(crate) fn combine(
    arena: &mut FragmentArena,
    first: &[FragmentId],
    second: &[FragmentId],
    linker: &CrossLinker,
    double: DoubleFragmentation,
    sites: Option<(usize, usize)>,
) -> Vec<FragmentId> {
    let mut pairs = Vec::new();
    for &a in first {
        if arena[a].is_cross_linker_modified() || arena[a].is_immonium() {
            continue;
        }
        for &b in second {
            if arena[b].is_cross_linker_modified() || arena[b].is_immonium() {
                continue;
            }
            if !double.enabled && !arena[a].is_peptide_ion() && !arena[b].is_peptide_ion() {
                continue;
            }
            let (span_a, span_b) = (arena.span(a), arena.span(b));
            if !linker.can_cross_link_spans(&span_a, &span_b) {
                continue;
            }
            if let Some((site_a, site_b)) = sites
                && !(span_a.contains(site_a) && span_b.contains(site_b))
            {
                continue;
            }
            pairs.push((a, b));
        }
    }
    pairs
        .into_iter()
        .map(|(a, b)| {
            let relative = |id: FragmentId| {
                let fragment = &arena[id];
                fragment.length() as f64 / arena.peptide(fragment.peptide()).len() as f64
            };
            let (base, other) = if relative(a) <= relative(b) {
                (a, b)
            } else {
                (b, a)
            };
            let (base_fragment, other_fragment) = (&arena[base], &arena[other]);
            let new = NewFragment {
                peptide: base_fragment.peptide(),
                start: base_fragment.start(),
                length: base_fragment.length(),
                neutral_mass: base_fragment.neutral_mass()
                    + other_fragment.neutral_mass()
                    + linker.cross_linked_mass(),
                kind: FragmentKind::CrossLinked { base, other },
                name: format!("{}+{}", base_fragment.name(), other_fragment.name()),
                ion_type: if other_fragment.is_peptide_ion() {
                    base_fragment.ion_type()
                } else {
                    double.ion_type
                },
            };
            arena.push(new)
        })
        .collect()
}

/// Turn the fragments of a peptide linked to itself at the two (relative) sites into the
/// fragments that can exist. A fragment containing both sites carries the linker, one
/// containing neither stays as is and one containing a single site cannot exist. With double
/// fragmentation an N-terminal fragment with the first site and a C-terminal fragment with the
/// second site can stay together through the linker.
pub(crate) fn loop_link(
    arena: &mut FragmentArena,
    fragments: &[FragmentId],
    linker: &CrossLinker,
    sites: (usize, usize),
    double: DoubleFragmentation,
) -> Vec<FragmentId> {
    let (low, high) = if sites.0 <= sites.1 {
        sites
    } else {
        (sites.1, sites.0)
    };
    let mut result = Vec::new();
    let mut n_terminal = Vec::new();
    let mut c_terminal = Vec::new();
    for &id in fragments {
        let span = arena.span(id);
        match (span.contains(low), span.contains(high)) {
            (true, true) => {
                let fragment = &arena[id];
                let new = NewFragment {
                    peptide: fragment.peptide(),
                    start: fragment.start(),
                    length: fragment.length(),
                    neutral_mass: fragment.neutral_mass() + linker.cross_linked_mass(),
                    kind: FragmentKind::LoopLinked {
                        first: id,
                        second: None,
                    },
                    name: format!("{}_loop", fragment.name()),
                    ion_type: fragment.ion_type(),
                };
                result.push(arena.push(new));
            }
            (false, false) => result.push(id),
            (true, false) => {
                if arena[id].is_n_terminal() && !arena[id].is_loss() && !arena[id].is_immonium() {
                    n_terminal.push(id);
                }
            }
            (false, true) => {
                if arena[id].is_c_terminal() && !arena[id].is_loss() && !arena[id].is_immonium() {
                    c_terminal.push(id);
                }
            }
        }
    }
    if double.enabled {
        for &first in &n_terminal {
            for &second in &c_terminal {
                let (f, g) = (&arena[first], &arena[second]);
                // Two breaks are needed, the residues in between are lost
                if f.start() + f.length() >= g.start() {
                    continue;
                }
                let new = NewFragment {
                    peptide: f.peptide(),
                    start: f.start(),
                    length: f.length(),
                    neutral_mass: f.neutral_mass() + g.neutral_mass() + linker.cross_linked_mass(),
                    kind: FragmentKind::LoopLinked {
                        first,
                        second: Some(second),
                    },
                    name: format!("loop_{}_{}", f.name(), g.name()),
                    ion_type: double.ion_type,
                };
                result.push(arena.push(new));
            }
        }
    }
    result
}
