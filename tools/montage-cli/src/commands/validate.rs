//! Validate a Montage project.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project = load_project(&path)?;
    let doc = &project.document;

    println!("  Name: {}", doc.name);
    println!("  Version: {}", doc.version);
    println!("  Frame: {}x{}", doc.settings.width, doc.settings.height);
    println!("  FPS: {}", doc.settings.fps);
    println!("  Assets: {}", doc.assets.len());
    println!("  Entities: {}", doc.timeline.entity_count());

    let mut errors = project.validate_sources();
    errors.extend(doc.timeline.check_invariants());
    if errors.is_empty() {
        println!("  Sources: All present");
        println!("  Timeline: Consistent");
        println!("\nProject is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Project may not be fully usable.",
            errors.len()
        );
    }

    Ok(())
}
