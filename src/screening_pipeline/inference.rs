//! Boundary to the on-device classifier.
//!
//! The classifier itself is opaque: tensor in, scores out. This module owns
//! the contract around it: the readiness gate, and the single place where the
//! engine's output shape is flattened into a [`ScoreVector`].

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::screening_pipeline::common::error::{NotReadyReason, PipelineError, Result};
use crate::screening_pipeline::tensor::NormalizedTensor;

/// Load state of a classifier handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    Loading,
    Ready,
    Failed(String),
}

/// One score per class, in class-index order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

/// Output shapes execution engines are known to hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// `[classes]`
    Flat(Vec<f32>),
    /// `[batch, classes]`; only the first row belongs to this request
    Batched(Vec<Vec<f32>>),
    /// `{ data: [classes] }` wrapper objects
    Data { data: Vec<f32> },
}

impl RawOutput {
    pub fn into_scores(self) -> ScoreVector {
        match self {
            RawOutput::Flat(scores) | RawOutput::Data { data: scores } => ScoreVector(scores),
            RawOutput::Batched(rows) => {
                if rows.len() > 1 {
                    warn!(rows = rows.len(), "Batched output for a single request, using the first row");
                }
                ScoreVector(rows.into_iter().next().unwrap_or_default())
            }
        }
    }
}

#[async_trait]
pub trait InferenceAdapter: Send + Sync {
    fn state(&self) -> AdapterState;

    /// Runs the classifier. Only called once [`state`](Self::state) is `Ready`.
    async fn run(&self, tensor: &NormalizedTensor) -> Result<RawOutput>;
}

/// Gates a call on the adapter's readiness, runs it, and flattens the output.
pub async fn infer<A>(adapter: &A, tensor: &NormalizedTensor) -> Result<ScoreVector>
where
    A: InferenceAdapter + ?Sized,
{
    match adapter.state() {
        AdapterState::Ready => {}
        AdapterState::Loading => {
            return Err(PipelineError::InferenceNotReady(NotReadyReason::StillLoading));
        }
        AdapterState::Failed(msg) => {
            return Err(PipelineError::InferenceNotReady(NotReadyReason::LoadFailed(msg)));
        }
    }

    debug!(shape = ?tensor.shape(), "Submitting tensor to classifier");
    let scores = adapter.run(tensor).await?.into_scores();
    debug!(classes = scores.len(), "Classifier returned");

    if let Some((index, value)) = scores
        .as_slice()
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(PipelineError::InferenceError(format!(
            "classifier returned non-finite score {} for class {}",
            value, index
        )));
    }
    Ok(scores)
}

/// Sending half of a readiness channel, held by whatever loads the model.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<AdapterState>,
}

impl ReadySignal {
    pub fn mark_ready(&self) {
        self.tx.send_replace(AdapterState::Ready);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.tx.send_replace(AdapterState::Failed(reason.into()));
    }
}

/// Receiving half of a readiness channel, held by the adapter.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<AdapterState>,
}

impl Readiness {
    /// A handle that is ready from the start.
    pub fn ready() -> Self {
        let (_, rx) = watch::channel(AdapterState::Ready);
        Self { rx }
    }

    pub fn current(&self) -> AdapterState {
        self.rx.borrow().clone()
    }

    /// Waits until loading finishes one way or the other.
    pub async fn wait(&self) -> AdapterState {
        let mut rx = self.rx.clone();
        match rx.wait_for(|state| *state != AdapterState::Loading).await {
            Ok(state) => state.clone(),
            Err(_) => AdapterState::Failed("loader dropped before signalling".to_string()),
        }
    }
}

pub fn readiness_channel() -> (ReadySignal, Readiness) {
    let (tx, rx) = watch::channel(AdapterState::Loading);
    (ReadySignal { tx }, Readiness { rx })
}

/// Adapter that answers every request with the same output.
///
/// Stands in for the classifier in the CLI's dry runs and in tests.
#[derive(Debug, Clone)]
pub struct StaticScoresAdapter {
    output: RawOutput,
    readiness: Readiness,
}

impl StaticScoresAdapter {
    pub fn new(scores: Vec<f32>) -> Self {
        Self::with_output(RawOutput::Flat(scores), Readiness::ready())
    }

    pub fn with_output(output: RawOutput, readiness: Readiness) -> Self {
        Self { output, readiness }
    }
}

#[async_trait]
impl InferenceAdapter for StaticScoresAdapter {
    fn state(&self) -> AdapterState {
        self.readiness.current()
    }

    async fn run(&self, _tensor: &NormalizedTensor) -> Result<RawOutput> {
        Ok(self.output.clone())
    }
}
