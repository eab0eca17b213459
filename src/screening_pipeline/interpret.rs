//! Turns a raw score vector into the ranked, labelled, severity-tagged list
//! shown to the user.

use std::fmt;

use tracing::{debug, warn};

use crate::screening_pipeline::inference::ScoreVector;
use crate::screening_pipeline::labels::ClassLabelTable;

/// Above this spread a vector cannot be a probability distribution.
const LOGIT_RANGE_THRESHOLD: f32 = 10.0;

/// How the classifier's raw output should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Guess from the values: any of `range > 10`, `max > 1`, `min < 0`
    /// means logits. Wrong for logits that happen to lie in `[0, 1]`.
    #[default]
    Auto,
    Logits,
    Probabilities,
}

/// What a score vector turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreInterpretation {
    Logits,
    Probabilities,
}

pub fn classify_distribution(scores: &[f32]) -> ScoreInterpretation {
    let finite = || scores.iter().copied().filter(|v| v.is_finite());
    let max = finite().fold(f32::NEG_INFINITY, f32::max);
    let min = finite().fold(f32::INFINITY, f32::min);
    let range = max - min;

    if range > LOGIT_RANGE_THRESHOLD || max > 1.0 || min < 0.0 {
        ScoreInterpretation::Logits
    } else {
        ScoreInterpretation::Probabilities
    }
}

/// Numerically stable softmax: `exp(x - max) / Σ exp(x - max)`.
///
/// Non-finite logits come out as NaN and take no part in the sum.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits
        .iter()
        .map(|&x| if x.is_finite() { (x - max).exp() } else { f32::NAN })
        .collect();
    let sum: f32 = exps.iter().filter(|e| !e.is_nan()).sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Mild,
    Moderate,
    High,
}

impl Severity {
    /// Generic confidence buckets: `> 0.8` High, `> 0.6` Moderate, `> 0.4` Mild.
    pub fn from_confidence(probability: f32) -> Self {
        if probability > 0.8 {
            Severity::High
        } else if probability > 0.6 {
            Severity::Moderate
        } else if probability > 0.4 {
            Severity::Mild
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
        };
        f.write_str(name)
    }
}

/// Condition-aware severity floor applied to the top-ranked prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityPolicy {
    /// Never reported below Moderate.
    pub always_moderate: Vec<String>,
    /// High above `escalation_threshold`, otherwise at least Moderate.
    pub escalated: Vec<String>,
    pub escalation_threshold: f32,
}

impl SeverityPolicy {
    pub fn reference() -> Self {
        Self {
            always_moderate: vec![
                "Psoriasis pictures Lichen Planus and related diseases".to_string(),
                "Atopic Dermatitis".to_string(),
            ],
            escalated: vec!["Melanoma".to_string(), "Basal Cell Carcinoma (BCC)".to_string()],
            escalation_threshold: 0.7,
        }
    }

    /// Severity for the top-ranked condition.
    pub fn top_severity(&self, label: &str, probability: f32) -> Severity {
        let generic = Severity::from_confidence(probability);
        let floor = if self.escalated.iter().any(|name| name == label) {
            if probability > self.escalation_threshold {
                Severity::High
            } else {
                Severity::Moderate
            }
        } else if self.always_moderate.iter().any(|name| name == label) {
            Severity::Moderate
        } else {
            Severity::Low
        };
        generic.max(floor)
    }
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self::reference()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPrediction {
    pub class_index: usize,
    pub label: String,
    pub probability: f32,
    pub severity: Severity,
}

pub struct OutputInterpreter<'a> {
    labels: &'a ClassLabelTable,
    output_kind: OutputKind,
    top_k: usize,
    severity: &'a SeverityPolicy,
}

impl<'a> OutputInterpreter<'a> {
    pub fn new(
        labels: &'a ClassLabelTable,
        output_kind: OutputKind,
        top_k: usize,
        severity: &'a SeverityPolicy,
    ) -> Self {
        Self {
            labels,
            output_kind,
            top_k,
            severity,
        }
    }

    /// Probabilities for `scores`, softmaxed if they are read as logits.
    pub fn probabilities(&self, scores: &[f32]) -> Vec<f32> {
        let interpretation = match self.output_kind {
            OutputKind::Logits => ScoreInterpretation::Logits,
            OutputKind::Probabilities => ScoreInterpretation::Probabilities,
            OutputKind::Auto => classify_distribution(scores),
        };
        debug!(?interpretation, kind = ?self.output_kind, "Interpreting scores");

        match interpretation {
            ScoreInterpretation::Logits => softmax(scores),
            ScoreInterpretation::Probabilities => scores.to_vec(),
        }
    }

    /// Ranks the scores and keeps the top `top_k`.
    ///
    /// An absent or empty vector is a valid "no result" and yields an empty list.
    pub fn interpret(&self, scores: Option<&ScoreVector>) -> Vec<RankedPrediction> {
        let scores = match scores {
            Some(scores) if !scores.is_empty() => scores.as_slice(),
            _ => return Vec::new(),
        };

        // NaN has no rank; such entries are dropped rather than shown.
        let mut ranked: Vec<(usize, f32)> = self
            .probabilities(scores)
            .into_iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .collect();
        if ranked.len() < scores.len() {
            warn!(dropped = scores.len() - ranked.len(), "Ignoring non-finite scores");
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.top_k);

        ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (class_index, probability))| {
                let label = self.labels.label_for(class_index).into_owned();
                let severity = if rank == 0 {
                    self.severity.top_severity(&label, probability)
                } else {
                    Severity::from_confidence(probability)
                };
                RankedPrediction {
                    class_index,
                    label,
                    probability,
                    severity,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_labels() -> ClassLabelTable {
        ClassLabelTable::new("toy", vec!["A".into(), "B".into(), "C".into()])
    }

    fn interpret_with(labels: &ClassLabelTable, kind: OutputKind, scores: Vec<f32>) -> Vec<RankedPrediction> {
        let policy = SeverityPolicy::reference();
        OutputInterpreter::new(labels, kind, 3, &policy).interpret(Some(&ScoreVector::new(scores)))
    }

    #[test]
    fn heuristic_detects_logits() {
        assert_eq!(classify_distribution(&[0.0, 0.0, 0.0]), ScoreInterpretation::Probabilities);
        assert_eq!(classify_distribution(&[0.7, 0.2, 0.1]), ScoreInterpretation::Probabilities);
        assert_eq!(classify_distribution(&[1.5, 0.2]), ScoreInterpretation::Logits);
        assert_eq!(classify_distribution(&[-0.1, 0.5]), ScoreInterpretation::Logits);
        assert_eq!(classify_distribution(&[5.0, 1.0, 1.0]), ScoreInterpretation::Logits);
    }

    #[test]
    fn softmax_of_equal_logits_is_uniform() {
        let probs = softmax(&[0.0, 0.0, 0.0]);
        for p in probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn forced_logits_softmax_uniform_toy_case() {
        let ranked = interpret_with(&toy_labels(), OutputKind::Logits, vec![0.0, 0.0, 0.0]);
        assert_eq!(ranked.len(), 3);
        for p in &ranked {
            assert!((p.probability - 1.0 / 3.0).abs() < 1e-6);
        }
        // ties keep class order
        let order: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn probabilities_pass_through() {
        let ranked = interpret_with(&toy_labels(), OutputKind::Auto, vec![0.7, 0.2, 0.1]);
        let got: Vec<(&str, f32)> = ranked.iter().map(|p| (p.label.as_str(), p.probability)).collect();
        assert_eq!(got, vec![("A", 0.7), ("B", 0.2), ("C", 0.1)]);
    }

    #[test]
    fn ranking_is_descending() {
        let ranked = interpret_with(&toy_labels(), OutputKind::Auto, vec![0.1, 0.3, 0.6]);
        let order: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn equal_probabilities_rank_by_class_index() {
        let labels = ClassLabelTable::reference();
        let ranked = interpret_with(
            &labels,
            OutputKind::Probabilities,
            vec![0.05, 0.3, 0.05, 0.05, 0.3, 0.05, 0.05, 0.05, 0.05, 0.05],
        );
        let order: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![1, 4, 0]);
    }

    #[test]
    fn truncates_to_top_k() {
        let labels = ClassLabelTable::reference();
        let ranked = interpret_with(&labels, OutputKind::Auto, vec![0.1; 10]);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn empty_or_absent_scores_yield_no_result() {
        let labels = toy_labels();
        let policy = SeverityPolicy::reference();
        let interpreter = OutputInterpreter::new(&labels, OutputKind::Auto, 3, &policy);
        assert!(interpreter.interpret(None).is_empty());
        assert!(interpreter.interpret(Some(&ScoreVector::default())).is_empty());
    }

    #[test]
    fn index_past_table_gets_unknown_label() {
        let labels = ClassLabelTable::new("short", vec!["A".into()]);
        let ranked = interpret_with(&labels, OutputKind::Probabilities, vec![0.1, 0.9]);
        assert_eq!(ranked[0].label, "Unknown Class 1");
        assert_eq!(ranked[1].label, "A");
    }

    #[test]
    fn generic_severity_buckets() {
        assert_eq!(Severity::from_confidence(0.81), Severity::High);
        assert_eq!(Severity::from_confidence(0.8), Severity::Moderate);
        assert_eq!(Severity::from_confidence(0.61), Severity::Moderate);
        assert_eq!(Severity::from_confidence(0.6), Severity::Mild);
        assert_eq!(Severity::from_confidence(0.41), Severity::Mild);
        assert_eq!(Severity::from_confidence(0.4), Severity::Low);
        assert_eq!(Severity::from_confidence(0.0), Severity::Low);
    }

    #[test]
    fn escalated_condition_on_top() {
        let policy = SeverityPolicy::reference();
        assert_eq!(policy.top_severity("Melanoma", 0.75), Severity::High);
        assert_eq!(policy.top_severity("Melanoma", 0.5), Severity::Moderate);
        assert_eq!(policy.top_severity("Basal Cell Carcinoma (BCC)", 0.2), Severity::Moderate);
    }

    #[test]
    fn always_moderate_condition_never_below_moderate() {
        let policy = SeverityPolicy::reference();
        assert_eq!(policy.top_severity("Atopic Dermatitis", 0.3), Severity::Moderate);
        assert_eq!(policy.top_severity("Atopic Dermatitis", 0.9), Severity::High);
        assert_eq!(policy.top_severity("Eczema", 0.3), Severity::Low);
    }

    #[test]
    fn override_only_applies_to_top_prediction() {
        let labels = ClassLabelTable::reference();
        // Melanoma (index 2) ranked second at 0.5
        let mut scores = vec![0.0; 10];
        scores[0] = 0.5;
        scores[2] = 0.45;
        let ranked = interpret_with(&labels, OutputKind::Probabilities, scores);

        assert_eq!(ranked[0].label, "Eczema");
        assert_eq!(ranked[0].severity, Severity::Mild);
        assert_eq!(ranked[1].label, "Melanoma");
        assert_eq!(ranked[1].severity, Severity::Mild);
    }

    #[test]
    fn top_melanoma_is_escalated_in_ranking() {
        let labels = ClassLabelTable::reference();
        let mut scores = vec![0.0; 10];
        scores[2] = 0.75;
        scores[5] = 0.25;
        let ranked = interpret_with(&labels, OutputKind::Probabilities, scores);
        assert_eq!(ranked[0].label, "Melanoma");
        assert_eq!(ranked[0].severity, Severity::High);
        assert_eq!(ranked[1].severity, Severity::Low);
    }

    #[test]
    fn nan_scores_do_not_displace_the_top_class() {
        let labels = ClassLabelTable::reference();
        let scores = vec![0.05, f32::NAN, 0.05, f32::NAN, 0.05, 0.05, 0.05, 0.6, 0.05, 0.05];
        let ranked = interpret_with(&labels, OutputKind::Probabilities, scores);

        let picked: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(picked, vec![7, 0, 2]);
        assert!(ranked.iter().all(|p| (0.0..=1.0).contains(&p.probability)));
    }

    #[test]
    fn nan_is_ignored_by_the_heuristic_and_ranking() {
        let labels = ClassLabelTable::reference();
        let mut scores = vec![0.05; 10];
        scores[0] = f32::NAN;
        scores[9] = 0.9;
        assert_eq!(classify_distribution(&scores), ScoreInterpretation::Probabilities);

        let ranked = interpret_with(&labels, OutputKind::Auto, scores);
        let picked: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(picked, vec![9, 1, 2]);
    }

    #[test]
    fn softmax_skips_non_finite_logits() {
        let probs = softmax(&[2.0, f32::NAN, 2.0]);
        assert!(probs[1].is_nan());
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs[2] - 0.5).abs() < 1e-6);
    }
}
