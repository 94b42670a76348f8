//! Show project information.

use std::path::PathBuf;

use montage_project_model::{EntityRef, TrackKind};

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let doc = &project.document;
    let timeline = &doc.timeline;

    println!("Project: {}", doc.name);
    println!("  ID: {}", doc.id);
    println!("  Created: {}", doc.created_at);
    println!("  Modified: {}", doc.modified_at);
    println!();

    println!("Settings:");
    println!(
        "  Frame: {}x{} @ {}fps",
        doc.settings.width, doc.settings.height, doc.settings.fps
    );
    println!("  Background: {}", doc.settings.background);
    println!();

    println!("Assets ({}):", doc.assets.len());
    for asset in &doc.assets {
        println!(
            "  {} {:?} {} ({:.1}s, {}x{}{})",
            asset.id,
            asset.kind,
            asset.source.display(),
            asset.duration_seconds,
            asset.width,
            asset.height,
            if asset.metadata_probed { "" } else { ", unprobed" }
        );
    }
    println!();

    println!("Timeline ({:.2}s):", timeline.duration);
    for entity in timeline.layers() {
        match entity {
            EntityRef::Clip(clip) => println!(
                "  {} z={} {:?} [{:.2}, {:.2}) source [{:.2}, {:.2}) {}{}",
                clip.id,
                clip.z_index,
                clip.kind,
                clip.start,
                clip.end,
                clip.trim_start,
                clip.trim_end,
                clip.asset_id,
                hidden(clip.visible)
            ),
            EntityRef::Text(text) => println!(
                "  {} z={} Text [{:.2}, {:.2}) {:?}{}",
                text.id,
                text.z_index,
                text.start,
                text.end,
                text.text,
                hidden(text.visible)
            ),
        }
    }
    println!();

    if !timeline.transitions.is_empty() {
        println!("Transitions:");
        for t in &timeline.transitions {
            println!(
                "  {} {} {}ms {} -> {}",
                t.id,
                t.kind.name(),
                t.duration_ms,
                t.from,
                t.to
            );
        }
        println!();
    }

    println!("Tracks:");
    for track in [TrackKind::Video, TrackKind::Audio, TrackKind::Image, TrackKind::Text] {
        let mix = timeline.track_mix(track);
        println!(
            "  {:?}: {} entities, ends at {:.2}s, volume {:.2}{}",
            track,
            timeline.track_ids(track, None).len(),
            timeline.track_end(track),
            mix.volume,
            if mix.muted { " (muted)" } else { "" }
        );
    }

    Ok(())
}

fn hidden(visible: bool) -> &'static str {
    if visible {
        ""
    } else {
        " (hidden)"
    }
}
