//! Result summary handed to the presentation layer: confidence badges and
//! condition-specific guidance for the most likely condition.

use crate::screening_pipeline::interpret::{RankedPrediction, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_probability(probability: f32) -> Self {
        if probability > 0.7 {
            ConfidenceLevel::High
        } else if probability > 0.3 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recommendation {
    pub key_findings: &'static [&'static str],
    pub next_steps: &'static [&'static str],
}

const ECZEMA: Recommendation = Recommendation {
    key_findings: &[
        "Redness and inflammation detected",
        "Dry, scaly patches identified",
        "Pattern consistent with eczema",
        "No signs of infection present",
    ],
    next_steps: &[
        "Consult with a dermatologist for professional diagnosis",
        "Apply fragrance-free moisturizer twice daily",
        "Avoid known triggers (harsh soaps, certain fabrics)",
        "Consider over-the-counter hydrocortisone cream",
        "Track symptoms and potential triggers",
    ],
};

const MELANOMA: Recommendation = Recommendation {
    key_findings: &[
        "Irregular pigmentation detected",
        "Asymmetric features observed",
        "Border irregularity noted",
        "Requires immediate medical evaluation",
    ],
    next_steps: &[
        "Schedule an urgent dermatologist appointment",
        "Avoid sun exposure on the affected area",
        "Document any changes in size or color",
        "Do not attempt self-treatment",
        "Prepare medical history for consultation",
    ],
};

const GENERAL: Recommendation = Recommendation {
    key_findings: &[
        "Skin abnormality detected",
        "Further evaluation recommended",
        "Pattern requires professional assessment",
        "Monitor for changes",
    ],
    next_steps: &[
        "Consult with a dermatologist for accurate diagnosis",
        "Keep the area clean and dry",
        "Avoid scratching or irritating the area",
        "Document any changes with photos",
        "Note any associated symptoms",
    ],
};

impl Recommendation {
    pub fn for_condition(label: &str) -> Self {
        match label {
            "Eczema" => ECZEMA,
            "Melanoma" => MELANOMA,
            _ => GENERAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub prediction: RankedPrediction,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub entries: Vec<ReportEntry>,
    /// Guidance for the top condition; `None` when there is no result.
    pub recommendation: Option<Recommendation>,
}

impl AnalysisReport {
    pub fn from_predictions(predictions: &[RankedPrediction]) -> Self {
        let entries = predictions
            .iter()
            .map(|prediction| ReportEntry {
                prediction: prediction.clone(),
                confidence: ConfidenceLevel::from_probability(prediction.probability),
            })
            .collect();
        let recommendation = predictions
            .first()
            .map(|top| Recommendation::for_condition(&top.label));

        Self {
            entries,
            recommendation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self) -> Option<&ReportEntry> {
        self.entries.first()
    }

    pub fn top_severity(&self) -> Option<Severity> {
        self.top().map(|entry| entry.prediction.severity)
    }
}
