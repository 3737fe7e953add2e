//! Type Detector — classifies extracted contract text into a [`ContractType`].
//!
//! Default: `KeywordTypeDetector` (pure-Rust, deterministic, no external call).
//! `AppState` holds an `Arc<dyn TypeDetector>` so a model-backed detector can
//! replace it without touching the pipeline.

use serde::{Deserialize, Serialize};

use crate::models::contract::ContractType;

/// Best guess plus how sure the detector is about it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub contract_type: ContractType,
    /// 0.0 – 1.0
    pub confidence: f32,
}

pub trait TypeDetector: Send + Sync {
    fn detect(&self, text: &str) -> Detection;
}

/// Indicative phrases per type with their weights. Order matters for ties.
const SIGNALS: &[(ContractType, &[(&str, f32)])] = &[
    (
        ContractType::Employment,
        &[
            ("employment agreement", 3.0),
            ("employment contract", 3.0),
            ("offer of employment", 2.5),
            ("termination of employment", 2.0),
            ("probationary period", 2.0),
            ("at-will", 2.0),
            ("employer", 1.5),
            ("employee", 1.0),
            ("salary", 1.5),
            ("job title", 1.5),
            ("working hours", 1.5),
            ("paid time off", 1.5),
            ("compensation", 1.0),
            ("benefits", 0.5),
        ],
    ),
    (
        ContractType::Nda,
        &[
            ("non-disclosure agreement", 3.0),
            ("nondisclosure agreement", 3.0),
            ("confidentiality agreement", 3.0),
            ("disclosing party", 2.5),
            ("receiving party", 2.5),
            ("confidential information", 2.0),
            ("proprietary information", 1.5),
            ("trade secret", 1.5),
        ],
    ),
    (
        ContractType::Sales,
        &[
            ("sales agreement", 3.0),
            ("purchase agreement", 3.0),
            ("bill of sale", 3.0),
            ("purchase price", 2.0),
            ("title to the goods", 2.0),
            ("buyer", 1.5),
            ("seller", 1.5),
            ("goods", 1.0),
            ("warranty", 0.5),
            ("delivery", 0.5),
        ],
    ),
    (
        ContractType::Lease,
        &[
            ("lease agreement", 3.0),
            ("rental agreement", 3.0),
            ("landlord", 2.0),
            ("tenant", 2.0),
            ("lessor", 2.0),
            ("lessee", 2.0),
            ("security deposit", 2.0),
            ("monthly rent", 2.0),
            ("premises", 1.5),
            ("rent", 0.5),
        ],
    ),
    (
        ContractType::Services,
        &[
            ("service agreement", 3.0),
            ("services agreement", 3.0),
            ("statement of work", 2.5),
            ("independent contractor", 2.0),
            ("service provider", 2.0),
            ("scope of services", 2.0),
            ("deliverables", 1.5),
            ("consulting", 1.0),
            ("client", 0.5),
        ],
    ),
];

/// Characters treated as the document heading; hits there count double.
const HEADING_CHARS: usize = 600;
/// Repeated boilerplate should not drown out everything else.
const MAX_HITS_PER_PHRASE: usize = 5;
/// Below this much total evidence the confidence is scaled down.
const MIN_EVIDENCE: f32 = 6.0;

pub struct KeywordTypeDetector {
    threshold: f32,
}

impl KeywordTypeDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl TypeDetector for KeywordTypeDetector {
    fn detect(&self, text: &str) -> Detection {
        let scores = score_types(text);
        let total: f32 = scores.iter().map(|(_, s)| s).sum();

        // Strict `>` keeps the earliest type on ties.
        let mut best = (ContractType::Other, 0.0_f32);
        for &(ty, score) in &scores {
            if score > best.1 {
                best = (ty, score);
            }
        }

        if total <= 0.0 {
            return Detection {
                contract_type: ContractType::Other,
                confidence: 0.0,
            };
        }

        let share = best.1 / total;
        let evidence = (best.1 / MIN_EVIDENCE).min(1.0);
        let confidence = (share * evidence).clamp(0.0, 1.0);

        if confidence < self.threshold {
            return Detection {
                contract_type: ContractType::Other,
                confidence,
            };
        }

        Detection {
            contract_type: best.0,
            confidence,
        }
    }
}

fn score_types(text: &str) -> Vec<(ContractType, f32)> {
    let body = text.to_lowercase();
    let heading: String = body.chars().take(HEADING_CHARS).collect();

    SIGNALS
        .iter()
        .map(|(ty, phrases)| {
            let score = phrases
                .iter()
                .map(|(phrase, weight)| {
                    let hits = count_phrase(&body, phrase).min(MAX_HITS_PER_PHRASE)
                        + count_phrase(&heading, phrase).min(MAX_HITS_PER_PHRASE);
                    hits as f32 * weight
                })
                .sum();
            (*ty, score)
        })
        .collect()
}

/// Counts whole-word occurrences of `phrase`, allowing a plural `s`.
fn count_phrase(haystack: &str, phrase: &str) -> usize {
    let bytes = haystack.as_bytes();
    let is_word = |b: &u8| b.is_ascii_alphanumeric();

    haystack
        .match_indices(phrase)
        .filter(|(start, _)| {
            let end = start + phrase.len();
            let left_ok = *start == 0 || !is_word(&bytes[start - 1]);
            let right_ok = match bytes.get(end) {
                None => true,
                Some(b's') => bytes.get(end + 1).map_or(true, |b| !is_word(b)),
                Some(b) => !is_word(b),
            };
            left_ok && right_ok
        })
        .count()
}
