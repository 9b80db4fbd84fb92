use crate::config::Limits;
use crate::snapshot::{NodeId, Snapshot};
use crate::status::{normalize, StatusLabel};

/// A short-text node whose text contains a known status keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    pub keyword: &'static str,
    pub label: StatusLabel,
}

/// Scans the whole snapshot, in document order, for status keyword nodes.
///
/// Keywords are checked in the given order and the first hit wins, so every
/// node yields at most one candidate. Nodes with empty text or text longer
/// than `limits.max_candidate_text` characters are skipped.
pub fn extract_candidates(
    snapshot: &Snapshot,
    keywords: &[&'static str],
    limits: &Limits,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for id in snapshot.preorder() {
        let Some(node) = snapshot.node(id) else {
            continue;
        };
        let len = node.text_len();
        if len == 0 || len > limits.max_candidate_text {
            continue;
        }
        let lower = node.text().to_lowercase();
        let Some(keyword) = keywords.iter().copied().find(|kw| lower.contains(kw)) else {
            continue;
        };
        let label = normalize(keyword);
        if label == StatusLabel::Unknown {
            continue;
        }
        log::debug!("candidate {:?} {:?} -> {}", id, node.text(), label);
        out.push(Candidate {
            node: id,
            keyword,
            label,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NodeData;
    use crate::status::KEYWORDS;

    #[test]
    fn finds_short_keyword_nodes_in_order() {
        let mut snap = Snapshot::new();
        let root = snap.add_node(None, NodeData::new("ul", ""));
        let a = snap.add_node(Some(root), NodeData::new("li", "Objeto ENTREGUE ao destinatário"));
        snap.add_node(Some(root), NodeData::new("li", "Postado"));
        let c = snap.add_node(Some(root), NodeData::new("li", "Em transito para Unidade"));

        let found = extract_candidates(&snap, KEYWORDS, &Limits::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].node, a);
        assert_eq!(found[0].label, StatusLabel::Delivered);
        assert_eq!(found[1].node, c);
        assert_eq!(found[1].keyword, "em transito");
        assert_eq!(found[1].label, StatusLabel::InTransit);
    }

    #[test]
    fn skips_long_containers_and_empty_text() {
        let mut snap = Snapshot::new();
        let long = format!("Em espera {}", "x".repeat(80));
        snap.add_node(None, NodeData::new("div", &long));
        snap.add_node(None, NodeData::new("div", "   "));
        assert!(extract_candidates(&snap, KEYWORDS, &Limits::default()).is_empty());

        // limit counts characters, not bytes
        let exact = format!("Em trânsito{}", "ã".repeat(69));
        snap.add_node(None, NodeData::new("div", &exact));
        assert_eq!(extract_candidates(&snap, KEYWORDS, &Limits::default()).len(), 1);
    }

    #[test]
    fn first_keyword_in_priority_order_wins() {
        let mut snap = Snapshot::new();
        snap.add_node(None, NodeData::new("span", "Em espera / entregue"));
        let found = extract_candidates(&snap, KEYWORDS, &Limits::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, StatusLabel::Delivered);
    }

    #[test]
    fn empty_snapshot_has_no_candidates() {
        assert!(extract_candidates(&Snapshot::new(), KEYWORDS, &Limits::default()).is_empty());
    }
}
