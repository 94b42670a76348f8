//! Check system capabilities.

use montage_render_engine::{command_exists, FontBook};

pub fn run() -> anyhow::Result<()> {
    println!("Montage System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = command_exists("ffmpeg");
    let ffprobe = command_exists("ffprobe");
    report(ffmpeg, "ffmpeg", "required for video decoding and export");
    report(ffprobe, "ffprobe", "used to read media duration and size");

    let fonts = FontBook::system();
    report(
        fonts.has_glyphs(),
        "system font",
        "text overlays render without glyphs when missing",
    );

    let config_path = montage_common::config_file_path();
    println!(
        "[INFO] Config: {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (not found, using defaults)" }
    );

    println!();
    if ffmpeg {
        println!("All required capabilities are available. Montage is ready.");
    } else {
        println!("ffmpeg is missing. Install it to preview video and export.");
    }

    Ok(())
}

fn report(ok: bool, name: &str, note: &str) {
    if ok {
        println!("[OK] {name}");
    } else {
        println!("[WARN] {name}: {note}");
    }
}
