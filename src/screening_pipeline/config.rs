//! Classifier build configuration

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::interpret::{OutputKind, SeverityPolicy};
use crate::screening_pipeline::labels::ClassLabelTable;
use crate::screening_pipeline::normalize::NormalizationProfile;
use crate::screening_pipeline::tensor::TensorLayout;

/// Square input side of the reference classifier.
pub const REFERENCE_INPUT_SIZE: usize = 224;
/// Output length of the reference classifier.
pub const REFERENCE_NUM_CLASSES: usize = 10;
/// Number of predictions surfaced to the user.
pub const DEFAULT_TOP_K: usize = 3;

/// Everything the pipeline needs to know about the bundled classifier.
///
/// Fixed per classifier build; the label table, input size and normalization
/// profile must all match the weights they ship with.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Side of the square input tensor
    pub input_size: usize,
    /// Length of the score vector
    pub num_classes: usize,
    /// Input distribution the classifier was trained under
    pub profile: NormalizationProfile,
    /// Tensor layout the inference boundary consumes
    pub layout: TensorLayout,
    /// Whether the classifier emits logits or probabilities
    pub output_kind: OutputKind,
    pub labels: ClassLabelTable,
    pub top_k: usize,
    pub severity_policy: SeverityPolicy,
    /// Whether to reject degenerate decoded images before resizing
    pub validate_dimensions: bool,
    /// Largest accepted decoded side, if any
    pub max_dimension: Option<usize>,
}

impl ClassifierConfig {
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder::default()
    }

    /// The bundled reference build: 224×224 ImageNet-normalized input,
    /// ten skin conditions.
    pub fn reference() -> Self {
        Self {
            input_size: REFERENCE_INPUT_SIZE,
            num_classes: REFERENCE_NUM_CLASSES,
            profile: NormalizationProfile::ImageNetMeanStd,
            layout: TensorLayout::Interleaved,
            output_kind: OutputKind::Auto,
            labels: ClassLabelTable::reference(),
            top_k: DEFAULT_TOP_K,
            severity_policy: SeverityPolicy::reference(),
            validate_dimensions: true,
            max_dimension: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(PipelineError::ConfigError("input size must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(PipelineError::ConfigError("top_k must be positive".to_string()));
        }
        if self.labels.len() != self.num_classes {
            return Err(PipelineError::ConfigError(format!(
                "label table '{}' has {} entries but the classifier emits {} classes",
                self.labels.version(),
                self.labels.len(),
                self.num_classes
            )));
        }
        Ok(())
    }
}

/// Builder for ClassifierConfig
#[derive(Default)]
pub struct ClassifierConfigBuilder {
    input_size: Option<usize>,
    num_classes: Option<usize>,
    profile: Option<NormalizationProfile>,
    layout: Option<TensorLayout>,
    output_kind: Option<OutputKind>,
    labels: Option<ClassLabelTable>,
    top_k: Option<usize>,
    severity_policy: Option<SeverityPolicy>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<usize>>,
}

impl ClassifierConfigBuilder {
    pub fn input_size(mut self, size: usize) -> Self {
        self.input_size = Some(size);
        self
    }

    pub fn num_classes(mut self, classes: usize) -> Self {
        self.num_classes = Some(classes);
        self
    }

    pub fn profile(mut self, profile: NormalizationProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn output_kind(mut self, kind: OutputKind) -> Self {
        self.output_kind = Some(kind);
        self
    }

    pub fn labels(mut self, labels: ClassLabelTable) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn severity_policy(mut self, policy: SeverityPolicy) -> Self {
        self.severity_policy = Some(policy);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<usize>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// The normalization profile has no default: it must be chosen explicitly
    /// to match the classifier's training.
    pub fn build(self) -> Result<ClassifierConfig> {
        let profile = self.profile.ok_or_else(|| {
            PipelineError::NormalizationConfigError("no normalization profile selected".to_string())
        })?;

        let default = ClassifierConfig::reference();
        let config = ClassifierConfig {
            input_size: self.input_size.unwrap_or(default.input_size),
            num_classes: self.num_classes.unwrap_or(default.num_classes),
            profile,
            layout: self.layout.unwrap_or(default.layout),
            output_kind: self.output_kind.unwrap_or(default.output_kind),
            labels: self.labels.unwrap_or(default.labels),
            top_k: self.top_k.unwrap_or(default.top_k),
            severity_policy: self.severity_policy.unwrap_or(default.severity_policy),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
        };
        config.validate()?;
        Ok(config)
    }
}
