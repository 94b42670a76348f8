//! Asset import and metadata probing.
//!
//! Import never fails because a probe failed: the asset is kept with
//! conservative default metadata and marked as unprobed.

use std::path::{Path, PathBuf};
use std::process::Command;

use montage_common::{MontageError, MontageResult};
use montage_project_model::{AssetId, MediaAsset, MediaCatalog, MediaKind};

/// Metadata a probe could determine. Missing fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbedMetadata {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Reads duration and pixel size from a media file.
pub trait MetadataProbe {
    fn probe(&self, path: &Path, kind: MediaKind) -> MontageResult<ProbedMetadata>;
}

/// `ffprobe` for audio/video, image header decoding for stills.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl MetadataProbe for SystemProbe {
    fn probe(&self, path: &Path, kind: MediaKind) -> MontageResult<ProbedMetadata> {
        match kind {
            MediaKind::Image => {
                let (width, height) = image::image_dimensions(path)
                    .map_err(|e| MontageError::import(format!("{}: {e}", path.display())))?;
                Ok(ProbedMetadata {
                    duration_seconds: None,
                    width: Some(width),
                    height: Some(height),
                })
            }
            MediaKind::Video | MediaKind::Audio => ffprobe(path),
        }
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

fn ffprobe(path: &Path) -> MontageResult<ProbedMetadata> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| MontageError::import(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MontageError::import(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_ffprobe_json(&out.stdout)
}

/// Extract metadata from `ffprobe -print_format json` output.
pub fn parse_ffprobe_json(raw: &[u8]) -> MontageResult<ProbedMetadata> {
    let parsed: ProbeOut = serde_json::from_slice(raw)?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let parse_secs = |s: &Option<String>| {
        s.as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };
    let duration_seconds = parsed
        .format
        .as_ref()
        .and_then(|f| parse_secs(&f.duration))
        .or_else(|| parsed.streams.iter().find_map(|s| parse_secs(&s.duration)));

    Ok(ProbedMetadata {
        duration_seconds,
        width: video.and_then(|v| v.width).filter(|w| *w > 0),
        height: video.and_then(|v| v.height).filter(|h| *h > 0),
    })
}

/// Media family from the declared MIME type, falling back to the extension.
pub fn detect_kind(path: &Path, mime: Option<&str>) -> Option<MediaKind> {
    mime.and_then(MediaKind::from_mime)
        .or_else(|| MediaKind::from_extension(path))
}

/// Build an asset for `path`, substituting defaults for anything the probe
/// could not determine.
pub fn probe_asset(id: AssetId, kind: MediaKind, path: PathBuf, probe: &dyn MetadataProbe) -> MediaAsset {
    let mut asset = MediaAsset::with_fallback_metadata(id, kind, path);
    match probe.probe(&asset.source, kind) {
        Ok(meta) => {
            if kind != MediaKind::Image {
                if let Some(d) = meta.duration_seconds {
                    asset.duration_seconds = d;
                }
            }
            if let (Some(w), Some(h)) = (meta.width, meta.height) {
                asset.width = w;
                asset.height = h;
            }
            asset.metadata_probed = kind == MediaKind::Image || meta.duration_seconds.is_some();
            if !asset.metadata_probed {
                tracing::warn!(path = %asset.source.display(), "Probe returned no duration; using defaults");
            }
        }
        Err(err) => {
            tracing::warn!(
                path = %asset.source.display(),
                error = %err,
                duration = asset.duration_seconds,
                "Metadata probe failed; using defaults"
            );
        }
    }
    asset
}

/// Import one file into `catalog`. A file already in the catalog returns
/// its existing id.
pub fn import_asset(
    catalog: &mut MediaCatalog,
    path: &Path,
    mime: Option<&str>,
    probe: &dyn MetadataProbe,
) -> MontageResult<AssetId> {
    if !path.exists() {
        return Err(MontageError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let kind = detect_kind(path, mime).ok_or_else(|| {
        MontageError::unsupported(format!("unrecognized media type: {}", path.display()))
    })?;
    if let Some(existing) = catalog.find_by_source(path) {
        tracing::debug!(asset = %existing.id, "Asset already imported");
        return Ok(existing.id);
    }

    let id = catalog.allocate_id();
    let asset = probe_asset(id, kind, path.to_path_buf(), probe);
    tracing::info!(
        asset = %id,
        kind = ?kind,
        duration = asset.duration_seconds,
        width = asset.width,
        height = asset.height,
        probed = asset.metadata_probed,
        "Asset imported"
    );
    Ok(catalog.insert(asset))
}

/// Import several files; one bad file does not abort the batch.
pub fn import_batch<'a>(
    catalog: &mut MediaCatalog,
    files: impl IntoIterator<Item = (&'a Path, Option<&'a str>)>,
    probe: &dyn MetadataProbe,
) -> Vec<MontageResult<AssetId>> {
    files
        .into_iter()
        .map(|(path, mime)| import_asset(catalog, path, mime, probe))
        .collect()
}
