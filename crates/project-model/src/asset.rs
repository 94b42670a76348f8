//! Imported source media and the catalog that owns it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Duration assumed for audio/video whose metadata probe failed.
pub const DEFAULT_PLAYABLE_DURATION_SECS: f64 = 10.0;
/// Duration assumed for still images.
pub const DEFAULT_IMAGE_DURATION_SECS: f64 = 5.0;
/// Pixel size assumed for images whose dimensions could not be read.
pub const DEFAULT_IMAGE_WIDTH: u32 = 800;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 600;

/// Catalog-scoped asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Media family of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Map a declared MIME type (`video/mp4`, `image/png`, ...) to its family.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let family = mime.trim().split('/').next()?.to_ascii_lowercase();
        match family.as_str() {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "image" => Some(Self::Image),
            _ => None,
        }
    }

    /// Guess the family from a file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "mp4" | "mov" | "mkv" | "webm" | "avi" | "m4v" => Some(Self::Video),
            "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" | "opus" => Some(Self::Audio),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }

    /// Whether clips of this kind are driven by a decode handle.
    pub fn is_playable(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// Whether clips of this kind contribute pixels to the frame.
    pub fn has_picture(self) -> bool {
        matches!(self, Self::Video | Self::Image)
    }
}

/// An imported source asset. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: AssetId,
    pub kind: MediaKind,

    /// Display name (file name by default).
    pub name: String,

    /// Handle to the underlying source (a file path for local media).
    pub source: PathBuf,

    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,

    /// False when the values above are fallback defaults.
    #[serde(default = "default_true")]
    pub metadata_probed: bool,
}

fn default_true() -> bool {
    true
}

impl MediaAsset {
    /// Build an asset carrying the conservative defaults used when probing fails.
    pub fn with_fallback_metadata(id: AssetId, kind: MediaKind, source: PathBuf) -> Self {
        let (duration_seconds, width, height) = match kind {
            MediaKind::Image => (
                DEFAULT_IMAGE_DURATION_SECS,
                DEFAULT_IMAGE_WIDTH,
                DEFAULT_IMAGE_HEIGHT,
            ),
            MediaKind::Video | MediaKind::Audio => (DEFAULT_PLAYABLE_DURATION_SECS, 0, 0),
        };
        Self {
            id,
            kind,
            name: display_name(&source),
            source,
            duration_seconds,
            width,
            height,
            metadata_probed: false,
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Owns every imported asset. Lookup only; no behavior beyond bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaCatalog {
    assets: BTreeMap<AssetId, MediaAsset>,
    next_id: u64,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a catalog from persisted assets.
    pub fn from_assets(assets: impl IntoIterator<Item = MediaAsset>) -> Self {
        let mut catalog = Self::new();
        for asset in assets {
            catalog.next_id = catalog.next_id.max(asset.id.0 + 1);
            catalog.assets.insert(asset.id, asset);
        }
        catalog
    }

    /// Reserve the id for the next imported asset.
    pub fn allocate_id(&mut self) -> AssetId {
        let id = AssetId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert an asset, replacing any previous asset with the same id.
    pub fn insert(&mut self, asset: MediaAsset) -> AssetId {
        let id = asset.id;
        self.next_id = self.next_id.max(id.0 + 1);
        self.assets.insert(id, asset);
        id
    }

    pub fn get(&self, id: AssetId) -> Option<&MediaAsset> {
        self.assets.get(&id)
    }

    /// Remove an asset from the catalog. The caller owns revocation of the
    /// returned source handle.
    pub fn evict(&mut self, id: AssetId) -> Option<MediaAsset> {
        self.assets.remove(&id)
    }

    pub fn find_by_source(&self, source: &Path) -> Option<&MediaAsset> {
        self.assets.values().find(|a| a.source == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Assets in id order, for persistence.
    pub fn to_vec(&self) -> Vec<MediaAsset> {
        self.assets.values().cloned().collect()
    }
}
