//! Skin screening pipeline module
//!
//! Photo bytes go through decoding, geometric and statistical normalization
//! and tensor packing, are handed to an external classifier, and come back as
//! a short ranked list of candidate conditions with severity annotations.

pub mod common;
pub mod config;
pub mod decode;
pub mod geometry;
pub mod inference;
pub mod interpret;
pub mod labels;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod tensor;


pub use common::{ErrorKind, NotReadyReason, PipelineError, PipelineTimings, Result};

pub use config::{ClassifierConfig, ClassifierConfigBuilder};

pub use decode::{FormatDecoder, ImageEncoding, PixelDecoder, PixelGrid, RawImage};

pub use geometry::GeometricNormalizer;

pub use inference::{
    AdapterState, InferenceAdapter, RawOutput, ReadySignal, Readiness, ScoreVector,
    StaticScoresAdapter, readiness_channel,
};

pub use interpret::{OutputInterpreter, OutputKind, RankedPrediction, Severity, SeverityPolicy};

pub use labels::ClassLabelTable;

pub use normalize::{ChannelOrder, NormalizationProfile, StatisticalNormalizer};

pub use pipeline::{RequestState, ScreeningPipeline};

pub use report::{AnalysisReport, ConfidenceLevel, Recommendation};

pub use session::ScreeningSession;

pub use tensor::{NormalizedTensor, TensorLayout, TensorPacker};
