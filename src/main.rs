use anyhow::{Context, bail};
use skinscan_rs::logger;
use skinscan_rs::screening_pipeline::{
    AnalysisReport, ClassifierConfig, NormalizationProfile, RawImage, ScreeningPipeline,
    StaticScoresAdapter, TensorLayout,
};

use tracing::info;

const USAGE: &str = "usage: skinscan <image> [--profile imagenet|caffe-bgr] [--layout interleaved|planar] [--scores s0,s1,...]";

struct Args {
    image: String,
    profile: NormalizationProfile,
    layout: TensorLayout,
    scores: Option<Vec<f32>>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut image = None;
    let mut profile = NormalizationProfile::ImageNetMeanStd;
    let mut layout = TensorLayout::Interleaved;
    let mut scores = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--profile" => {
                let name = args.next().context("--profile needs a value")?;
                profile = name.parse()?;
            }
            "--layout" => {
                layout = match args.next().as_deref() {
                    Some("interleaved") => TensorLayout::Interleaved,
                    Some("planar") => TensorLayout::Planar,
                    other => bail!("unknown layout {:?}", other),
                };
            }
            "--scores" => {
                let list = args.next().context("--scores needs a value")?;
                let parsed = list
                    .split(',')
                    .map(|s| s.trim().parse::<f32>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("scores must be comma-separated numbers")?;
                scores = Some(parsed);
            }
            _ if image.is_none() => image = Some(arg),
            _ => bail!("unexpected argument '{}'\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        image: image.context(USAGE)?,
        profile,
        layout,
        scores,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    info!("Starting skinscan...");

    let args = parse_args()?;
    let config = ClassifierConfig::builder()
        .profile(args.profile)
        .layout(args.layout)
        .build()?;

    info!("Profile: {:?}", config.profile);
    info!("Layout: {:?}", config.layout);
    info!("Labels: {} ({} classes)", config.labels.version(), config.labels.len());

    let dry_run = args.scores.is_none();
    let adapter = StaticScoresAdapter::new(args.scores.unwrap_or_default());
    let pipeline = ScreeningPipeline::new(adapter, config)?;
    let image = RawImage::from_file(&args.image)?;

    if dry_run {
        let tensor = pipeline.preprocess(&image)?;
        let values = tensor.as_slice();
        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        info!(
            shape = ?tensor.shape(),
            min, max, mean,
            "Preprocessed tensor (no scores supplied, classifier skipped)"
        );
        return Ok(());
    }

    // Failures are already logged by the pipeline.
    let (predictions, timings) = pipeline.classify_with_timings(&image).await?;
    timings.log_summary();

    let report = AnalysisReport::from_predictions(&predictions);
    if report.is_empty() {
        info!("No results found");
    }
    for (rank, entry) in report.entries.iter().enumerate() {
        info!(
            "#{} {} {:.1}% ({:?} confidence, severity {})",
            rank + 1,
            entry.prediction.label,
            entry.prediction.probability * 100.0,
            entry.confidence,
            entry.prediction.severity
        );
    }
    if let Some(recommendation) = report.recommendation {
        for step in recommendation.next_steps {
            info!("Next step: {}", step);
        }
    }

    Ok(())
}
