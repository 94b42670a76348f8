//! Apply one timeline edit to a project.
//!
//! Each invocation runs a single [`EditOp`] through the timeline store and
//! saves the result. A rejected edit leaves the project untouched.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use montage_common::AppConfig;
use montage_editing::ops::{LayerDirection, TextPatch};
use montage_editing::{EditOp, TimelineStore};
use montage_project_model::{
    AssetId, EntityId, Filter, FilterKind, MediaCatalog, TextAnimation, TimelineState, TrackKind,
    TransitionKind,
};
use serde::de::DeserializeOwned;

use super::{load_project, save_project};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Subcommand)]
pub enum EditAction {
    /// Place an imported asset at the end of its track
    AddClip {
        /// Asset id (see `montage info`)
        asset: u64,
    },

    /// Add a text overlay
    AddText {
        text: String,

        /// Start time; defaults to after the last overlay
        #[arg(long)]
        at: Option<f64>,

        #[arg(long, default_value = "3.0")]
        duration: f64,
    },

    /// Split an entity in two at a time
    Split { id: u64, at: f64 },

    /// Copy an entity to right after itself
    Duplicate { id: u64 },

    /// Move an entity to a new start time
    Move { id: u64, start: f64 },

    /// Trim one edge of an entity
    Trim {
        id: u64,

        /// New start time (left edge)
        #[arg(long, conflicts_with = "end")]
        start: Option<f64>,

        /// New end time (right edge)
        #[arg(long)]
        end: Option<f64>,
    },

    /// Resize the end and shift everything after it on the same track
    Ripple { id: u64, end: f64 },

    /// Resize the end and move only the adjacent neighbor
    Roll { id: u64, end: f64 },

    /// Move an entity, adjusting its neighbors to keep the track length
    Slide { id: u64, start: f64 },

    /// Swap layer order with the nearest overlapping entity
    Layer {
        id: u64,
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Delete an entity
    Delete {
        id: u64,

        /// Close the gap left behind
        #[arg(long)]
        ripple: bool,
    },

    /// Replace a clip's filters, e.g. `--set brightness=120 --set blur=2`
    Filters {
        id: u64,

        #[arg(long = "set", value_name = "KIND=VALUE")]
        set: Vec<String>,

        /// Remove all filters
        #[arg(long)]
        clear: bool,
    },

    /// Change a clip's geometric transform
    Transform {
        id: u64,
        #[arg(long)]
        rotation: Option<f64>,
        #[arg(long)]
        x: Option<f64>,
        #[arg(long)]
        y: Option<f64>,
        #[arg(long)]
        flip_h: Option<bool>,
        #[arg(long)]
        flip_v: Option<bool>,
    },

    /// Crop a clip's source, in percent
    Crop {
        id: u64,
        #[arg(long)]
        x: Option<f64>,
        #[arg(long)]
        y: Option<f64>,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },

    /// Set a clip's volume (0.0 - 1.0)
    Volume { id: u64, volume: f64 },

    /// Set a clip's playback rate
    Speed { id: u64, speed: f64 },

    /// Show or hide an entity
    Visible {
        id: u64,
        #[arg(action = clap::ArgAction::Set)]
        visible: bool,
    },

    /// Change a text overlay's content or style
    Text {
        id: u64,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        size: Option<f64>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        opacity: Option<f64>,
        /// none, fade-in, slide-up, typewriter, pop
        #[arg(long)]
        animation: Option<String>,
    },

    /// Move a text overlay, in percent of the frame
    Position { id: u64, x: f64, y: f64 },

    /// Add a transition between two entities
    Transition {
        from: u64,
        to: u64,
        #[arg(long, default_value = "fade")]
        kind: String,
        #[arg(long, default_value = "500")]
        duration_ms: u32,
    },

    /// Remove a transition
    RemoveTransition { id: u64 },

    /// Set a track's volume or mute state
    Mix {
        /// video, audio, image, text
        track: String,
        #[arg(long)]
        volume: Option<f64>,
        #[arg(long)]
        muted: Option<bool>,
    },
}

pub fn run(path: PathBuf, action: EditAction, config: &AppConfig) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;
    let catalog = project.document.catalog();
    let mut store = TimelineStore::with_state(project.document.timeline.clone(), &config.editor);

    let op = action.into_op(store.state(), &catalog)?;
    let label = op.label();
    if let Err(e) = store.execute(op) {
        println!("{label}: {e}. Project unchanged.");
        return Ok(());
    }

    project.document.timeline = store.state().clone();
    save_project(&mut project)?;
    println!(
        "{label}: done. Timeline is {:.2}s with {} entities.",
        store.state().duration,
        store.state().entity_count()
    );
    Ok(())
}

impl EditAction {
    fn into_op(self, state: &TimelineState, catalog: &MediaCatalog) -> anyhow::Result<EditOp> {
        let op = match self {
            Self::AddClip { asset } => {
                let asset = catalog
                    .get(AssetId(asset))
                    .ok_or_else(|| anyhow::anyhow!("no asset with id {asset}"))?;
                EditOp::AddClip {
                    asset: asset.clone(),
                }
            }
            Self::AddText { text, at, duration } => EditOp::AddText { text, at, duration },
            Self::Split { id, at } => EditOp::Split { id: EntityId(id), at },
            Self::Duplicate { id } => EditOp::Duplicate { id: EntityId(id) },
            Self::Move { id, start } => EditOp::Move {
                id: EntityId(id),
                start,
            },
            Self::Trim { id, start, end } => match (start, end) {
                (Some(at), None) => EditOp::TrimStart { id: EntityId(id), at },
                (None, Some(at)) => EditOp::TrimEnd { id: EntityId(id), at },
                _ => anyhow::bail!("trim needs exactly one of --start or --end"),
            },
            Self::Ripple { id, end } => EditOp::RippleTrimEnd {
                id: EntityId(id),
                at: end,
            },
            Self::Roll { id, end } => EditOp::RollingTrimEnd {
                id: EntityId(id),
                at: end,
            },
            Self::Slide { id, start } => EditOp::Slide {
                id: EntityId(id),
                start,
            },
            Self::Layer { id, direction } => EditOp::Layer {
                id: EntityId(id),
                direction: match direction {
                    Direction::Up => LayerDirection::Up,
                    Direction::Down => LayerDirection::Down,
                },
            },
            Self::Delete { id, ripple: false } => EditOp::Delete { id: EntityId(id) },
            Self::Delete { id, ripple: true } => EditOp::RippleDelete { id: EntityId(id) },
            Self::Filters { id, set, clear } => {
                let mut filters = if clear {
                    Vec::new()
                } else {
                    clip(state, id)?.filters.clone()
                };
                for entry in &set {
                    let filter = parse_filter(entry)?;
                    filters.retain(|f| f.kind != filter.kind);
                    filters.push(filter);
                }
                EditOp::SetFilters {
                    id: EntityId(id),
                    filters,
                }
            }
            Self::Transform {
                id,
                rotation,
                x,
                y,
                flip_h,
                flip_v,
            } => {
                let mut transform = clip(state, id)?.transform;
                transform.rotation = rotation.unwrap_or(transform.rotation);
                transform.x = x.unwrap_or(transform.x);
                transform.y = y.unwrap_or(transform.y);
                transform.flip_h = flip_h.unwrap_or(transform.flip_h);
                transform.flip_v = flip_v.unwrap_or(transform.flip_v);
                EditOp::SetTransform {
                    id: EntityId(id),
                    transform,
                }
            }
            Self::Crop {
                id,
                x,
                y,
                width,
                height,
            } => {
                let mut crop = clip(state, id)?.crop;
                crop.x = x.unwrap_or(crop.x);
                crop.y = y.unwrap_or(crop.y);
                crop.width = width.unwrap_or(crop.width);
                crop.height = height.unwrap_or(crop.height);
                EditOp::SetCrop {
                    id: EntityId(id),
                    crop,
                }
            }
            Self::Volume { id, volume } => EditOp::SetVolume {
                id: EntityId(id),
                volume,
            },
            Self::Speed { id, speed } => EditOp::SetSpeed {
                id: EntityId(id),
                speed,
            },
            Self::Visible { id, visible } => EditOp::SetVisible {
                id: EntityId(id),
                visible,
            },
            Self::Text {
                id,
                content,
                size,
                color,
                background,
                opacity,
                animation,
            } => EditOp::UpdateText {
                id: EntityId(id),
                patch: TextPatch {
                    text: content,
                    font_size: size,
                    color,
                    background_color: background
                        .map(|b| Some(b).filter(|b| !b.is_empty() && b != "none")),
                    opacity,
                    animation: animation
                        .map(|a| parse_named::<TextAnimation>(&a))
                        .transpose()?,
                    ..TextPatch::default()
                },
            },
            Self::Position { id, x, y } => EditOp::SetTextPosition {
                id: EntityId(id),
                x,
                y,
            },
            Self::Transition {
                from,
                to,
                kind,
                duration_ms,
            } => EditOp::AddTransition {
                kind: TransitionKind::parse(&kind),
                duration_ms,
                from: EntityId(from),
                to: EntityId(to),
            },
            Self::RemoveTransition { id } => EditOp::RemoveTransition { id: EntityId(id) },
            Self::Mix {
                track,
                volume,
                muted,
            } => {
                let track: TrackKind = parse_named(&track)?;
                let mut mix = state.track_mix(track);
                mix.volume = volume.unwrap_or(mix.volume);
                mix.muted = muted.unwrap_or(mix.muted);
                EditOp::SetTrackMix { mix }
            }
        };
        Ok(op)
    }
}

fn clip(state: &TimelineState, id: u64) -> anyhow::Result<&montage_project_model::Clip> {
    state
        .clip(EntityId(id))
        .ok_or_else(|| anyhow::anyhow!("no clip with id {id}"))
}

/// Parse `kind=value`, e.g. `hue-rotate=90`.
fn parse_filter(entry: &str) -> anyhow::Result<Filter> {
    let (name, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KIND=VALUE, got '{entry}'"))?;
    let name = name.trim();
    let kind: FilterKind = parse_named(name)?;
    if kind == FilterKind::Unknown {
        anyhow::bail!("unknown filter '{name}'");
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("bad value in '{entry}': {e}"))?;
    Ok(Filter::new(kind, value))
}

/// Parse a unit enum from its serialized name.
fn parse_named<T: DeserializeOwned>(name: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(name.to_ascii_lowercase()))
        .map_err(|_| anyhow::anyhow!("unrecognized value '{name}'"))
}
