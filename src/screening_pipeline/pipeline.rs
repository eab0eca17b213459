use std::path::Path;

use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::screening_pipeline::{
    common::error::{ErrorKind, PipelineError, Result},
    common::timing::{PipelineTimings, Timer},
    config::ClassifierConfig,
    decode::{FormatDecoder, PixelDecoder, RawImage},
    geometry::GeometricNormalizer,
    inference::{InferenceAdapter, infer},
    interpret::{OutputInterpreter, RankedPrediction},
    normalize::StatisticalNormalizer,
    tensor::{NormalizedTensor, TensorPacker},
};

/// Progress of a single classification request.
///
/// `Failed` is absorbing: a failed request is never resumed, the caller
/// submits a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Decoding,
    Normalizing,
    AwaitingInference,
    Interpreting,
    Done,
    Failed(ErrorKind),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Done | RequestState::Failed(_))
    }

    fn advance(&mut self, next: RequestState) {
        if matches!(self, RequestState::Failed(_)) {
            warn!(?next, "Ignoring transition out of a failed request");
            return;
        }
        debug!(from = ?self, to = ?next, "Request state");
        *self = next;
    }
}

pub struct ScreeningPipeline<D: PixelDecoder, A: InferenceAdapter> {
    decoder: D,
    adapter: A,
    config: ClassifierConfig,
}

impl<A: InferenceAdapter> ScreeningPipeline<FormatDecoder, A> {
    pub fn new(adapter: A, config: ClassifierConfig) -> Result<Self> {
        Self::with_custom(FormatDecoder, adapter, config)
    }
}

impl<D: PixelDecoder, A: InferenceAdapter> ScreeningPipeline<D, A> {
    pub fn with_custom(decoder: D, adapter: A, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            decoder,
            adapter,
            config,
        })
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }

        if let Some(max) = self.config.max_dimension {
            if width > max || height > max {
                warn!("Image dimensions {}x{} exceed maximum {}", width, height, max);
                return Err(PipelineError::InvalidDimensions(width, height));
            }
        }

        Ok(())
    }

    /// Decodes, resizes, normalizes and packs a photo into the classifier's
    /// input tensor.
    pub fn preprocess(&self, image: &RawImage) -> Result<NormalizedTensor> {
        let mut state = RequestState::Idle;
        let mut timings = PipelineTimings::new();
        self.preprocess_tracked(image, &mut state, &mut timings)
    }

    fn preprocess_tracked(
        &self,
        image: &RawImage,
        state: &mut RequestState,
        timings: &mut PipelineTimings,
    ) -> Result<NormalizedTensor> {
        let size = self.config.input_size;

        state.advance(RequestState::Decoding);
        let grid = {
            let _span = info_span!("decode", encoding = ?image.encoding()).entered();
            timings.measure("decode", || self.decoder.decode(image))?
        };

        {
            let _span = info_span!("validate_dimensions", width = grid.width(), height = grid.height()).entered();
            self.validate_dimensions(grid.width(), grid.height())?;
        }

        state.advance(RequestState::Normalizing);
        let resized = {
            let _span = info_span!("resize", target = size).entered();
            timings.measure("resize", || GeometricNormalizer::new(size).apply(&grid))?
        };

        let normalized = {
            let _span = info_span!("normalize", profile = ?self.config.profile).entered();
            timings.measure("normalize", || {
                StatisticalNormalizer::new(self.config.profile).apply(&resized, size)
            })?
        };

        let _span = info_span!("pack", layout = ?self.config.layout).entered();
        timings.measure("pack", || TensorPacker::new(size, self.config.layout).pack(normalized))
    }

    fn interpreter(&self) -> OutputInterpreter<'_> {
        OutputInterpreter::new(
            &self.config.labels,
            self.config.output_kind,
            self.config.top_k,
            &self.config.severity_policy,
        )
    }

    async fn run_stages(
        &self,
        image: &RawImage,
        state: &mut RequestState,
        timings: &mut PipelineTimings,
    ) -> Result<Vec<RankedPrediction>> {
        let tensor = self.preprocess_tracked(image, state, timings)?;

        state.advance(RequestState::AwaitingInference);
        let timer = Timer::start("inference");
        let scores = infer(&self.adapter, &tensor)
            .instrument(info_span!("inference", len = tensor.len()))
            .await?;
        let (name, duration) = timer.stop();
        timings.record(name, duration);

        state.advance(RequestState::Interpreting);
        if !scores.is_empty() && scores.len() != self.config.labels.len() {
            return Err(PipelineError::UnexpectedOutputShape {
                expected: self.config.labels.len(),
                actual: scores.len(),
            });
        }
        let predictions = {
            let _span = info_span!("interpret", classes = scores.len()).entered();
            timings.measure("interpret", || self.interpreter().interpret(Some(&scores)))
        };

        state.advance(RequestState::Done);
        Ok(predictions)
    }

    /// Runs one request end to end, recording each transition in `state`.
    pub(crate) async fn run(
        &self,
        image: &RawImage,
        state: &mut RequestState,
        timings: &mut PipelineTimings,
    ) -> Result<Vec<RankedPrediction>> {
        *state = RequestState::Idle;
        let result = self.run_stages(image, state, timings).await;
        if let Err(e) = &result {
            error!(source = image.source(), "Classification failed: {}", e);
            state.advance(RequestState::Failed(e.kind()));
        }
        result
    }

    #[instrument(skip(self, image), fields(source = image.source(), input_size = image.bytes().len()))]
    pub async fn classify(&self, image: &RawImage) -> Result<Vec<RankedPrediction>> {
        self.classify_with_timings(image).await.map(|(predictions, _)| predictions)
    }

    pub async fn classify_with_timings(
        &self,
        image: &RawImage,
    ) -> Result<(Vec<RankedPrediction>, PipelineTimings)> {
        info!("Starting skin screening classification");

        let mut state = RequestState::Idle;
        let mut timings = PipelineTimings::new();
        let predictions = self.run(image, &mut state, &mut timings).await?;

        match predictions.first() {
            Some(top) => info!(
                label = %top.label,
                probability = top.probability,
                severity = %top.severity,
                ms = timings.total_duration().as_secs_f64() * 1000.0,
                "Classification complete"
            ),
            None => info!("Classification complete with no result"),
        }
        Ok((predictions, timings))
    }

    #[instrument(skip(self, input_path))]
    pub async fn classify_file<P: AsRef<Path>>(&self, input_path: P) -> Result<Vec<RankedPrediction>> {
        let input_path = input_path.as_ref();
        info!(input = %input_path.display(), "Classifying file");

        let image = {
            let _span = info_span!("read_input_file").entered();
            RawImage::from_file(input_path)?
        };

        self.classify(&image).await
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ClassifierConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_request_cannot_be_resumed() {
        let mut state = RequestState::Idle;
        state.advance(RequestState::Decoding);
        state.advance(RequestState::Failed(ErrorKind::Decode));
        assert!(state.is_terminal());

        state.advance(RequestState::Normalizing);
        state.advance(RequestState::Done);
        assert_eq!(state, RequestState::Failed(ErrorKind::Decode));
    }

    #[test]
    fn transitions_follow_the_request() {
        let mut state = RequestState::Idle;
        for next in [
            RequestState::Decoding,
            RequestState::Normalizing,
            RequestState::AwaitingInference,
            RequestState::Interpreting,
        ] {
            state.advance(next);
            assert_eq!(state, next);
            assert!(!state.is_terminal());
        }
        state.advance(RequestState::Done);
        assert!(state.is_terminal());
    }
}
