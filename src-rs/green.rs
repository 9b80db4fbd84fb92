use crate::color::{greenness, is_green_dominant, Color, GreenTier};
use crate::config::Limits;
use crate::extract::Candidate;
use crate::snapshot::{Node, NodeId, Snapshot};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorChannel {
    Text,
    Background,
    Fill,
    Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreenEvidence {
    pub source: NodeId,
    pub channel: ColorChannel,
    pub color: Color,
}

fn check(
    id: NodeId,
    channel: ColorChannel,
    color: Option<Color>,
    tier: GreenTier,
) -> Option<GreenEvidence> {
    let color = color?;
    is_green_dominant(color, tier).then_some(GreenEvidence {
        source: id,
        channel,
        color,
    })
}

fn check_any(id: NodeId, node: &Node, tier: GreenTier) -> Option<GreenEvidence> {
    let style = node.style();
    check(id, ColorChannel::Background, style.background_color, tier)
        .or_else(|| check(id, ColorChannel::Text, style.color, tier))
        .or_else(|| check(id, ColorChannel::Fill, node.fill(), tier))
        .or_else(|| check(id, ColorChannel::Stroke, node.stroke(), tier))
}

/// Own text color first, then the candidate and its ancestors, each with a
/// capped descendant scan.
pub fn find_green(
    snapshot: &Snapshot,
    candidate: &Candidate,
    tier: GreenTier,
    limits: &Limits,
) -> Option<GreenEvidence> {
    let id = candidate.node;
    let node = snapshot.node(id)?;
    if let Some(hit) = check(id, ColorChannel::Text, node.style().color, tier) {
        return Some(hit);
    }

    let mut scopes = vec![id];
    scopes.extend(snapshot.ancestors(id, limits.color_ancestor_levels));
    for scope in scopes {
        let Some(scope_node) = snapshot.node(scope) else {
            continue;
        };
        let style = scope_node.style();
        let own = check(scope, ColorChannel::Text, style.color, tier)
            .or_else(|| check(scope, ColorChannel::Background, style.background_color, tier));
        if own.is_some() {
            return own;
        }
        for inner in snapshot.descendants(scope, limits.color_scope_nodes) {
            if let Some(hit) = snapshot.node(inner).and_then(|n| check_any(inner, n, tier)) {
                return Some(hit);
            }
        }
    }
    None
}

pub fn is_active_by_color(snapshot: &Snapshot, candidate: &Candidate, limits: &Limits) -> bool {
    find_green(snapshot, candidate, GreenTier::Strict, limits).is_some()
}

/// Ranking score from the candidate's own text color only.
pub fn green_score(snapshot: &Snapshot, candidate: &Candidate) -> Option<f64> {
    snapshot
        .node(candidate.node)?
        .style()
        .color
        .map(greenness)
}

/// Picks the greenest candidate. Candidates without an own color rank last;
/// ties keep the earlier candidate.
pub fn rank_by_greenness<'a>(
    snapshot: &Snapshot,
    candidates: &[&'a Candidate],
) -> Option<&'a Candidate> {
    let mut best: Option<(&'a Candidate, Option<f64>)> = None;
    for &cand in candidates {
        let score = green_score(snapshot, cand);
        let better = match best {
            None => true,
            Some((_, best_score)) => match (score, best_score) {
                (Some(s), Some(b)) => s > b,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if better {
            best = Some((cand, score));
        }
    }
    best.map(|(cand, _)| cand)
}
