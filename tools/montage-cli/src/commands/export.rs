//! Export a project to video.

use std::path::PathBuf;

use montage_common::AppConfig;
use montage_project_model::Rgba;
use montage_render_engine::export::{
    export_timeline, ExportInputs, ExportJob, ExportProgress, FfmpegSink, ProgressCallback,
};
use montage_render_engine::{Compositor, FfmpegFrameDecoder, FontBook, RenderLoop, StillImageCache};

use super::load_project;

/// Command-line overrides on top of the configured export defaults.
#[derive(Debug, Default)]
pub struct ExportOptions {
    pub output: Option<PathBuf>,
    pub codec: Option<String>,
    pub fps: Option<u32>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub overwrite: bool,
}

pub fn run(path: PathBuf, options: ExportOptions, config: &AppConfig) -> anyhow::Result<()> {
    println!("Exporting project at: {}", path.display());

    let project = load_project(&path)?;
    let doc = &project.document;
    let catalog = doc.catalog();

    let output_path = options
        .output
        .unwrap_or_else(|| path.join("exports").join("output.mp4"));
    let mut job = ExportJob::new(&output_path, &config.export);
    job.fps = options.fps.unwrap_or(doc.settings.fps);
    if let Some(codec) = options.codec {
        job.video_codec = codec;
    }
    job.start_secs = options.start;
    job.end_secs = options.end;

    let (start, end) = job.range(doc.timeline.duration);
    println!("  Output: {}", output_path.display());
    println!("  Codec: {}", job.video_codec);
    println!(
        "  Frame: {}x{} @ {}fps",
        doc.settings.width, doc.settings.height, job.fps
    );
    println!("  Range: {start:.2}s - {end:.2}s");

    let compositor = Compositor::for_project(
        &doc.settings,
        FontBook::system(),
        config.playback.transition_steps,
    );
    let background = Rgba::parse_hex(&doc.settings.background).unwrap_or(Rgba::BLACK);
    let mut sink = FfmpegSink::new(&job)
        .with_background(background)
        .with_overwrite(options.overwrite);

    let mut stills = StillImageCache::with_root(&project.root);
    stills.preload(&catalog);
    let mut pictures = FfmpegFrameDecoder::new(stills, job.fps);
    let mut render_loop = RenderLoop::new(&config.playback);

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
    });

    let result = export_timeline(
        &job,
        ExportInputs {
            state: &doc.timeline,
            catalog: &catalog,
            compositor: &compositor,
            pictures: &mut pictures,
        },
        &mut render_loop,
        &mut sink,
        Some(progress_cb),
    );

    match result {
        Ok(summary) => {
            println!(
                "\nExport complete: {} ({} frames)",
                output_path.display(),
                summary.frames
            );
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
