//! Import media files into a project.

use std::path::PathBuf;

use montage_common::AppConfig;
use montage_editing::{EditOp, TimelineStore};
use montage_render_engine::{import_batch, SystemProbe};

use super::{load_project, save_project};

pub fn run(path: PathBuf, files: Vec<PathBuf>, add: bool, config: &AppConfig) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;
    let mut catalog = project.document.catalog();

    let files: Vec<PathBuf> = files
        .into_iter()
        .map(|f| std::fs::canonicalize(&f).unwrap_or(f))
        .collect();
    let results = import_batch(
        &mut catalog,
        files.iter().map(|f| (f.as_path(), None)),
        &SystemProbe,
    );

    let mut store = TimelineStore::with_state(project.document.timeline.clone(), &config.editor);
    let mut imported = 0;
    for (file, result) in files.iter().zip(results) {
        let id = match result {
            Ok(id) => id,
            Err(e) => {
                println!("  [SKIP] {}: {e}", file.display());
                continue;
            }
        };
        let Some(asset) = catalog.get(id) else {
            continue;
        };
        imported += 1;
        println!(
            "  [OK] {} {:?} {:.1}s {}x{}{}",
            id,
            asset.kind,
            asset.duration_seconds,
            asset.width,
            asset.height,
            if asset.metadata_probed { "" } else { " (defaults)" }
        );
        if add {
            if let Err(e) = store.execute(EditOp::AddClip {
                asset: asset.clone(),
            }) {
                println!("  [WARN] could not place {id} on the timeline: {e}");
            }
        }
    }

    project.document.set_catalog(&catalog);
    project.document.timeline = store.state().clone();
    save_project(&mut project)?;

    println!(
        "\nImported {imported} of {} file(s). Timeline is {:.2}s long.",
        files.len(),
        project.document.timeline.duration
    );
    Ok(())
}
