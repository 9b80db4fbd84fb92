use crate::color::GreenTier;
use crate::config::{ClassifierConfig, Policy};
use crate::extract::{extract_candidates, Candidate};
use crate::geometry::has_date_to_left;
use crate::green::{find_green, rank_by_greenness};
use crate::snapshot::Snapshot;
use crate::status::{StatusLabel, KEYWORDS};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// The arbitration step that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    NoCandidates,
    DateToLeft,
    StrictGreen,
    SoftGreen,
    ActiveClass,
    SoleCandidate,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Winner {
    pub node: usize,
    pub keyword: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: StatusLabel,
    pub rule: Rule,
    pub candidate_count: usize,
    pub winner: Option<Winner>,
}

impl ClassificationResult {
    pub fn unknown(rule: Rule, candidate_count: usize) -> ClassificationResult {
        ClassificationResult {
            label: StatusLabel::Unknown,
            rule,
            candidate_count,
            winner: None,
        }
    }
}

fn active_class_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[\s_-])(?:active|current|selected|ativo|ativa|atual)(?:$|[\s_-])")
            .expect("active class pattern compiles")
    })
}

pub fn is_active_class(class_name: &str) -> bool {
    active_class_pattern().is_match(class_name)
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Classifier {
        Classifier { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, snapshot: &Snapshot) -> ClassificationResult {
        let candidates = extract_candidates(snapshot, KEYWORDS, &self.config.limits);
        let count = candidates.len();
        if candidates.is_empty() {
            log::debug!("no status keyword found in {} nodes", snapshot.len());
            return ClassificationResult::unknown(Rule::NoCandidates, 0);
        }

        let primary = match self.config.policy {
            Policy::DateFirst => self
                .by_date(snapshot, &candidates)
                .or_else(|| self.by_color(snapshot, &candidates)),
            Policy::ColorFirst => self
                .by_color(snapshot, &candidates)
                .or_else(|| self.by_date(snapshot, &candidates)),
        };

        let decided = primary
            .or_else(|| self.by_active_class(snapshot, &candidates))
            .or_else(|| match candidates.as_slice() {
                [only] => Some((only, Rule::SoleCandidate)),
                _ => None,
            });

        let Some((winner, rule)) = decided else {
            log::debug!("{count} candidates, no distinguishing signal");
            return ClassificationResult::unknown(Rule::Ambiguous, count);
        };

        log::debug!("{:?} won by {:?}", winner.label, rule);
        ClassificationResult {
            label: winner.label,
            rule,
            candidate_count: count,
            winner: Some(Winner {
                node: winner.node.0,
                keyword: winner.keyword,
                text: snapshot
                    .node(winner.node)
                    .map(|n| n.text().to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    fn by_date<'a>(
        &self,
        snapshot: &Snapshot,
        candidates: &'a [Candidate],
    ) -> Option<(&'a Candidate, Rule)> {
        candidates
            .iter()
            .find(|c| has_date_to_left(snapshot, c, &self.config.limits))
            .map(|c| (c, Rule::DateToLeft))
    }

    fn by_color<'a>(
        &self,
        snapshot: &Snapshot,
        candidates: &'a [Candidate],
    ) -> Option<(&'a Candidate, Rule)> {
        for (tier, rule) in [
            (GreenTier::Strict, Rule::StrictGreen),
            (GreenTier::Soft, Rule::SoftGreen),
        ] {
            let active: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| find_green(snapshot, c, tier, &self.config.limits).is_some())
                .collect();
            if let Some(best) = rank_by_greenness(snapshot, &active) {
                log::debug!("{} {} green candidates", active.len(), tier.as_str());
                return Some((best, rule));
            }
        }
        None
    }

    fn by_active_class<'a>(
        &self,
        snapshot: &Snapshot,
        candidates: &'a [Candidate],
    ) -> Option<(&'a Candidate, Rule)> {
        let levels = self.config.limits.class_ancestor_levels;
        candidates
            .iter()
            .find(|c| {
                std::iter::once(c.node)
                    .chain(snapshot.ancestors(c.node, levels))
                    .filter_map(|id| snapshot.node(id))
                    .any(|n| is_active_class(n.class_name()))
            })
            .map(|c| (c, Rule::ActiveClass))
    }
}

/// Classifies with the default configuration.
pub fn classify(snapshot: &Snapshot) -> ClassificationResult {
    Classifier::default().classify(snapshot)
}
