use tracing::{info, warn};

use crate::screening_pipeline::{
    common::error::Result,
    common::timing::PipelineTimings,
    decode::{PixelDecoder, RawImage},
    inference::InferenceAdapter,
    interpret::RankedPrediction,
    pipeline::{RequestState, ScreeningPipeline},
    report::AnalysisReport,
};

/// One user's screening flow: at most one request in flight, and the last
/// successful result kept on screen until a newer one replaces it.
///
/// `submit` takes `&mut self`, so a second request cannot start while one is
/// still running.
pub struct ScreeningSession<D: PixelDecoder, A: InferenceAdapter> {
    pipeline: ScreeningPipeline<D, A>,
    state: RequestState,
    last_result: Option<Vec<RankedPrediction>>,
    last_timings: Option<PipelineTimings>,
}

impl<D: PixelDecoder, A: InferenceAdapter> ScreeningSession<D, A> {
    pub fn new(pipeline: ScreeningPipeline<D, A>) -> Self {
        Self {
            pipeline,
            state: RequestState::Idle,
            last_result: None,
            last_timings: None,
        }
    }

    /// Classifies a new photo. On failure the previous result stays available
    /// through [`last_result`](Self::last_result).
    pub async fn submit(&mut self, image: RawImage) -> Result<&[RankedPrediction]> {
        let mut timings = PipelineTimings::new();
        let outcome = self.pipeline.run(&image, &mut self.state, &mut timings).await;

        match outcome {
            Ok(predictions) => {
                info!(count = predictions.len(), "Session result updated");
                self.last_timings = Some(timings);
                Ok(self.last_result.insert(predictions).as_slice())
            }
            Err(e) => {
                warn!(
                    kept_previous = self.last_result.is_some(),
                    "Request failed, keeping previous result"
                );
                Err(e)
            }
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn last_result(&self) -> Option<&[RankedPrediction]> {
        self.last_result.as_deref()
    }

    pub fn last_timings(&self) -> Option<&PipelineTimings> {
        self.last_timings.as_ref()
    }

    pub fn report(&self) -> Option<AnalysisReport> {
        self.last_result
            .as_deref()
            .map(AnalysisReport::from_predictions)
    }

    /// Drops the displayed result, as on a user-initiated retake.
    pub fn clear(&mut self) {
        self.state = RequestState::Idle;
        self.last_result = None;
        self.last_timings = None;
    }

    pub fn pipeline(&self) -> &ScreeningPipeline<D, A> {
        &self.pipeline
    }
}
