use crate::config::Limits;
use crate::extract::Candidate;
use crate::snapshot::{Node, NodeId, Snapshot};
use regex::Regex;
use std::sync::OnceLock;

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)\b\d{1,2}\s*(?:de\s+|[/.\-]\s*)?",
            r"(?:jan(?:eiro|uary)?|fev(?:ereiro)?|feb(?:ruary)?|mar(?:ço|co|ch)?|abr(?:il)?|apr(?:il)?",
            r"|mai(?:o)?|may|jun(?:ho|e)?|jul(?:ho|y)?|ago(?:sto)?|aug(?:ust)?|set(?:embro)?",
            r"|sep(?:tember)?|out(?:ubro)?|oct(?:ober)?|nov(?:embro|ember)?|dez(?:embro)?|dec(?:ember)?)\b",
            r"|\b\d{1,2}h\s?\d{2}\b",
        ))
        .expect("date pattern compiles")
    })
}

/// True for text shaped like `12 mar`, `03 de abr`, `7/Out` or `14h30`.
pub fn looks_like_date(text: &str) -> bool {
    date_pattern().is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateVia {
    /// Marker rect ends before the candidate on an overlapping row.
    Geometry,
    /// Marker is one of the candidate's preceding siblings.
    Sibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateEvidence {
    pub marker: NodeId,
    pub via: DateVia,
}

fn is_date_marker(node: &Node, max_len: usize) -> bool {
    let len = node.text_len();
    len > 0 && len <= max_len && looks_like_date(node.text())
}

/// Finds the first date marker to the left of `candidate`, if any.
pub fn find_date_to_left(
    snapshot: &Snapshot,
    candidate: &Candidate,
    limits: &Limits,
) -> Option<DateEvidence> {
    let id = candidate.node;
    let node = snapshot.node(id)?;

    if let Some(target) = node.rect() {
        let scope = snapshot
            .ancestors(id, limits.date_ancestor_levels)
            .last()
            .copied()
            .unwrap_or(id);
        for other in snapshot.descendants(scope, limits.date_scope_nodes) {
            if other == id {
                continue;
            }
            let Some(marker) = snapshot.node(other) else {
                continue;
            };
            if !is_date_marker(marker, limits.max_date_text) {
                continue;
            }
            let Some(rect) = marker.rect() else {
                continue;
            };
            if rect.right <= target.left + limits.left_tolerance_px
                && rect.overlaps_vertically(target)
            {
                return Some(DateEvidence {
                    marker: other,
                    via: DateVia::Geometry,
                });
            }
        }
    }

    // Flex/grid reflow can break rect overlap, so accept a nearby preceding sibling too.
    for sibling in snapshot.preceding_siblings(id, limits.preceding_siblings) {
        let Some(marker) = snapshot.node(sibling) else {
            continue;
        };
        if marker.text_len() < limits.max_sibling_date_text && looks_like_date(marker.text()) {
            return Some(DateEvidence {
                marker: sibling,
                via: DateVia::Sibling,
            });
        }
    }

    None
}

pub fn has_date_to_left(snapshot: &Snapshot, candidate: &Candidate, limits: &Limits) -> bool {
    find_date_to_left(snapshot, candidate, limits).is_some()
}
