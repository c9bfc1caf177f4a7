//! Monitor a recorded pose stream.

use std::path::PathBuf;

use fallwatch_common::clock::caption_timestamp;
use fallwatch_common::config::{AppConfig, ScoringStrategy};
use fallwatch_monitor::{
    BlankFrameSource, DecisionLogHeader, DecisionRecorder, FrameSource, ImageDirFrameSource,
    JsonlPoseSource, MonitorSession, PoseSource,
};
use fallwatch_notify::{build_sinks, AlertDispatcher};

pub struct RunOptions {
    pub poses: PathBuf,
    pub frames: Option<PathBuf>,
    pub strategy: Option<ScoringStrategy>,
    pub save_evidence: Option<PathBuf>,
    pub dry_run: bool,
    pub realtime: bool,
    pub fps: Option<u32>,
    pub decisions: Option<PathBuf>,
}

pub async fn run(mut config: AppConfig, options: RunOptions) -> anyhow::Result<()> {
    if let Some(strategy) = options.strategy {
        config.detection.strategy = strategy;
    }
    if options.save_evidence.is_some() {
        config.evidence.save_dir = options.save_evidence.clone();
    }
    config.validate()?;

    let mut poses = JsonlPoseSource::open(&options.poses)
        .map_err(|e| anyhow::anyhow!("Failed to open pose stream: {e}"))?;

    let mut frames: Box<dyn FrameSource> = match &options.frames {
        Some(dir) => {
            let source = ImageDirFrameSource::open(dir)
                .map_err(|e| anyhow::anyhow!("Failed to open frame directory: {e}"))?;
            println!("  Frames: {} images in {}", source.len(), dir.display());
            Box::new(source)
        }
        None => Box::new(BlankFrameSource::default()),
    };

    let pace_fps = if options.realtime {
        let fps = options
            .fps
            .or_else(|| poses.header().map(|h| h.fps))
            .unwrap_or(30);
        Some(fps)
    } else {
        None
    };

    println!("Monitoring {}", options.poses.display());
    if let Some(header) = poses.header() {
        println!(
            "  Stream: {} ({}x{} @ {}fps)",
            header.source, header.width, header.height, header.fps
        );
    }
    println!("  Strategy: {:?}", config.detection.strategy);
    if let Some(fps) = pace_fps {
        println!("  Pacing: {fps}fps");
    }
    if options.dry_run {
        println!("  Dry run: alerts are logged only");
    }
    println!();

    let sinks = build_sinks(&config.notify, options.dry_run)?;
    let dispatcher = AlertDispatcher::spawn(sinks, &config.notify);
    let mut session = MonitorSession::from_config(&config, dispatcher)?;

    if let Some(path) = &options.decisions {
        let header = DecisionLogHeader::new(session.engine().scorer_name(), caption_timestamp());
        let recorder = DecisionRecorder::create(path, &header)
            .map_err(|e| anyhow::anyhow!("Failed to create decision log: {e}"))?;
        session = session.with_recorder(recorder);
    }

    let summary = session
        .run(&mut poses, frames.as_mut(), pace_fps)
        .await?;

    println!("Summary:");
    println!("  Frames: {} ({} skipped)", summary.frames, summary.skipped);
    println!("  No detection: {}", summary.no_detection);
    println!("  Falls: {}", summary.alerts);
    println!("  Recoveries: {}", summary.recoveries);
    if summary.evidence_failures > 0 {
        println!("  Alerts without photo: {}", summary.evidence_failures);
    }
    println!(
        "  Alerts delivered: {}, failed: {}, dropped: {}",
        summary.dispatch.delivered, summary.dispatch.failed, summary.dispatch.dropped
    );
    if let Some(path) = &options.decisions {
        println!("  Decision log: {}", path.display());
    }

    Ok(())
}
