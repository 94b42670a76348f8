//! Headless playback and single-frame snapshots.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use montage_common::{AppConfig, Clock, MonotonicClock};
use montage_project_model::{LoadedProject, MediaCatalog};
use montage_render_engine::{
    ClockedFactory, Compositor, FfmpegFrameDecoder, FontBook, FrameScheduler, RenderLoop,
    StillImageCache,
};

use super::load_project;

pub async fn run(
    path: PathBuf,
    from: f64,
    seconds: Option<f64>,
    snapshot: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let catalog = project.document.catalog();

    if let Some(output) = snapshot {
        return write_snapshot(&project, &catalog, from, &output, config);
    }

    let state = &project.document.timeline;
    if state.is_empty() {
        println!("Timeline is empty; nothing to play.");
        return Ok(());
    }

    let clock = MonotonicClock::start();
    let mut factory = ClockedFactory::new(clock.clone());
    let mut render_loop = RenderLoop::new(&config.playback);
    let sync = render_loop.sync(state, &catalog, &mut factory);
    for id in &sync.failed {
        println!("  [WARN] no decoder for clip {id}; it will play silent");
    }

    let start = render_loop.seek(from, state);
    let budget = seconds.unwrap_or(state.duration - start).max(0.0);
    println!(
        "Playing {} from {:.2}s for {:.2}s ({} decoder(s), Ctrl-C to stop)",
        project.document.name,
        start,
        budget,
        render_loop.decoders().len()
    );

    let mut scheduler = FrameScheduler::new(config.playback.tick_hz);
    let stop = scheduler.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.store(true, Ordering::SeqCst);
        }
    });

    let began = clock.now_secs();
    render_loop.play(began, state);
    let ticks = scheduler
        .run(|_| {
            let now = clock.now_secs();
            let report = render_loop.tick(now, state);
            if let Some(t) = report.notify {
                print!(
                    "\r  {:>8.2}s / {:.2}s  layers: {:<3}",
                    t,
                    state.duration,
                    report.visible.len()
                );
            }
            if report.wrapped {
                tracing::debug!("Preview looped");
            }
            if report.ended || now - began >= budget {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

    render_loop.pause();
    println!(
        "\nStopped at {:.2}s after {ticks} ticks.",
        render_loop.time()
    );
    Ok(())
}

fn write_snapshot(
    project: &LoadedProject,
    catalog: &MediaCatalog,
    at: f64,
    output: &Path,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let doc = &project.document;
    let compositor = Compositor::for_project(
        &doc.settings,
        FontBook::system(),
        config.playback.transition_steps,
    );

    let mut stills = StillImageCache::with_root(&project.root);
    stills.preload(catalog);
    let mut pictures = FfmpegFrameDecoder::new(stills, doc.settings.fps);

    let t = at.clamp(0.0, doc.timeline.duration.max(0.0));
    let frame = compositor.render(&doc.timeline, catalog, t, &mut pictures);
    frame
        .save(output)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;

    println!(
        "Wrote {}x{} frame at {:.2}s to {}",
        frame.width(),
        frame.height(),
        t,
        output.display()
    );
    Ok(())
}
