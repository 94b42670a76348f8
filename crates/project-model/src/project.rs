//! Project documents and on-disk layout.
//!
//! A project is a directory:
//!
//! ```text
//! <root>/
//!   sources/         imported media copied or linked here
//!   meta/project.json
//!   cache/
//!   exports/
//! ```
//!
//! `project.json` carries the project metadata, the media catalog, and the
//! timeline (`clips`, `textOverlays`, `transitions`, `audioTracks`,
//! `duration`) at the top level.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::asset::{MediaAsset, MediaCatalog};
use crate::geometry::FrameSize;
use crate::timeline::TimelineState;

pub const PROJECT_SCHEMA_VERSION: &str = "1.0";

/// Top-level project file (`meta/project.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Unique project identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    #[serde(default)]
    pub settings: ProjectSettings,

    #[serde(default)]
    pub assets: Vec<MediaAsset>,

    #[serde(flatten)]
    pub timeline: TimelineState,
}

/// Output frame settings for preview and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Canvas color behind all layers, as hex (`#000000`).
    pub background: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            background: "#000000".to_string(),
        }
    }
}

impl ProjectSettings {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

impl ProjectDocument {
    /// Create an empty project.
    pub fn new(name: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: PROJECT_SCHEMA_VERSION.to_string(),
            name: name.into(),
            id: project_id(),
            created_at: now.clone(),
            modified_at: now,
            settings: ProjectSettings {
                width,
                height,
                fps,
                ..ProjectSettings::default()
            },
            assets: Vec::new(),
            timeline: TimelineState::new(),
        }
    }

    pub fn catalog(&self) -> MediaCatalog {
        MediaCatalog::from_assets(self.assets.iter().cloned())
    }

    pub fn set_catalog(&mut self, catalog: &MediaCatalog) {
        self.assets = catalog.to_vec();
    }

    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    pub document: ProjectDocument,
}

impl LoadedProject {
    pub fn project_file(root: &Path) -> PathBuf {
        root.join("meta").join("project.json")
    }

    /// Load a project from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        let project_path = Self::project_file(&root);

        let json = std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
            path: project_path.clone(),
            source: e,
        })?;

        let mut document: ProjectDocument =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;
        document.timeline.normalize_ids();
        document.timeline.recompute_duration();

        Ok(Self { root, document })
    }

    /// Write the project document to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        let project_path = meta_dir.join("project.json");
        let json =
            serde_json::to_string_pretty(&self.document).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, json).map_err(|e| ProjectError::IoError {
            path: project_path,
            source: e,
        })?;

        Ok(())
    }

    /// Create a new project on disk with the standard directory structure.
    pub fn create(
        root: impl AsRef<Path>,
        name: impl Into<String>,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        if Self::project_file(&root).exists() {
            return Err(ProjectError::ValidationError {
                message: format!("a project already exists at {}", root.display()),
            });
        }

        for subdir in &["sources", "meta", "cache", "exports"] {
            std::fs::create_dir_all(root.join(subdir)).map_err(|e| ProjectError::IoError {
                path: root.join(subdir),
                source: e,
            })?;
        }

        let loaded = Self {
            root,
            document: ProjectDocument::new(name, width, height, fps),
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Absolute path of an asset source; relative sources resolve against
    /// the project root.
    pub fn resolve_source(&self, source: &Path) -> PathBuf {
        if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.root.join(source)
        }
    }

    /// Report referenced media that is missing, plus timeline inconsistencies.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        for asset in &self.document.assets {
            let path = self.resolve_source(&asset.source);
            if !path.exists() {
                errors.push(format!(
                    "{} source missing: {}",
                    asset.name,
                    asset.source.display()
                ));
            }
        }

        let known: std::collections::HashSet<_> =
            self.document.assets.iter().map(|a| a.id).collect();
        for clip in &self.document.timeline.clips {
            if !known.contains(&clip.asset_id) {
                errors.push(format!(
                    "clip {} references unknown {}",
                    clip.id, clip.asset_id
                ));
            }
        }

        errors.extend(self.document.timeline.check_invariants());
        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

/// Time-seeded identifier in UUID v4 layout.
fn project_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (seed & 0xFFFF_FFFF) as u32,
        ((seed >> 32) & 0xFFFF) as u16,
        ((seed >> 48) & 0x0FFF) as u16,
        (((seed >> 60) & 0x3F) | 0x80) as u16,
        (seed >> 64) & 0xFFFF_FFFF_FFFF,
    )
}
