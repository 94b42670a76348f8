//! Decode Handle Cache.
//!
//! One persistent decode handle per playable clip, keyed by clip id. The
//! cache is reconciled incrementally against the timeline: handles for new
//! clips are opened, handles for removed clips are torn down, and everything
//! else is left running so no decoder restarts without reason.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::RgbaImage;
use montage_common::{Clock, MontageError};
use montage_project_model::{AssetId, Clip, EntityId, MediaAsset, MediaCatalog, MediaKind, TimelineState};

/// Errors raised while opening or driving a decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{asset} is not in the media catalog")]
    MissingAsset { asset: AssetId },

    #[error("{kind:?} media has no decoder")]
    NotPlayable { kind: MediaKind },

    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("decoder backend failed: {0}")]
    Backend(String),
}

impl From<DecodeError> for MontageError {
    fn from(err: DecodeError) -> Self {
        MontageError::playback(err.to_string())
    }
}

/// A live, seekable playback handle for one clip.
///
/// Handles run on their own clock; the render loop only reads their position
/// and corrects it when it drifts too far.
pub trait DecodeHandle {
    /// Position inside the source, in seconds.
    fn current_time(&self) -> f64;
    fn seek(&mut self, secs: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    /// Playback rate multiplier (clip speed).
    fn set_rate(&mut self, rate: f64);
    /// Pause and release the source. The handle is not used again.
    fn teardown(&mut self);
}

/// Opens decode handles for clips.
pub trait DecoderFactory {
    fn open(&mut self, clip: &Clip, asset: &MediaAsset) -> Result<Box<dyn DecodeHandle>, DecodeError>;
}

/// Global output level broadcast to every handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterMix {
    pub volume: f64,
    pub muted: bool,
}

impl Default for MasterMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

/// What one [`DecodeCache::sync`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub failed: Vec<EntityId>,
    pub kept: usize,
}

impl SyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

struct CachedHandle {
    asset: AssetId,
    handle: Box<dyn DecodeHandle>,
}

/// Arena of decode handles keyed by clip id.
#[derive(Default)]
pub struct DecodeCache {
    handles: BTreeMap<EntityId, CachedHandle>,
    mix: MasterMix,
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeCache")
            .field("clips", &self.handles.keys().collect::<Vec<_>>())
            .field("mix", &self.mix)
            .finish()
    }
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.handles.keys().copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&dyn DecodeHandle> {
        self.handles.get(&id).map(|c| c.handle.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut (dyn DecodeHandle + 'static)> {
        self.handles.get_mut(&id).map(|c| c.handle.as_mut())
    }

    pub fn mix(&self) -> MasterMix {
        self.mix
    }

    /// Reconcile the cache with the playable clips of `state`.
    pub fn sync(
        &mut self,
        state: &TimelineState,
        catalog: &MediaCatalog,
        factory: &mut dyn DecoderFactory,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        let wanted: HashMap<EntityId, &Clip> = state
            .clips
            .iter()
            .filter(|c| c.is_playable())
            .map(|c| (c.id, c))
            .collect();

        let stale: Vec<EntityId> = self
            .handles
            .iter()
            .filter(|(id, cached)| match wanted.get(*id) {
                Some(clip) => clip.asset_id != cached.asset,
                None => true,
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(mut cached) = self.handles.remove(&id) {
                cached.handle.teardown();
                tracing::debug!(clip = %id, "Decode handle torn down");
                report.removed.push(id);
            }
        }

        for clip in &state.clips {
            if !clip.is_playable() {
                continue;
            }
            if self.handles.contains_key(&clip.id) {
                report.kept += 1;
                continue;
            }
            let opened = catalog
                .get(clip.asset_id)
                .ok_or(DecodeError::MissingAsset {
                    asset: clip.asset_id,
                })
                .and_then(|asset| factory.open(clip, asset));
            match opened {
                Ok(mut handle) => {
                    handle.pause();
                    handle.seek(clip.trim_start);
                    self.handles.insert(
                        clip.id,
                        CachedHandle {
                            asset: clip.asset_id,
                            handle,
                        },
                    );
                    tracing::debug!(clip = %clip.id, asset = %clip.asset_id, "Decode handle created");
                    report.created.push(clip.id);
                }
                Err(err) => {
                    tracing::warn!(clip = %clip.id, error = %err, "Could not open decoder");
                    report.failed.push(clip.id);
                }
            }
        }

        self.apply_settings(state);

        if !report.is_unchanged() {
            tracing::info!(
                created = report.created.len(),
                removed = report.removed.len(),
                failed = report.failed.len(),
                kept = report.kept,
                "Decode cache synchronized"
            );
        }
        report
    }

    /// Change the global volume and broadcast it.
    pub fn set_volume(&mut self, volume: f64, state: &TimelineState) {
        self.mix.volume = volume.clamp(0.0, 1.0);
        self.apply_settings(state);
    }

    /// Change the global mute and broadcast it.
    pub fn set_muted(&mut self, muted: bool, state: &TimelineState) {
        self.mix.muted = muted;
        self.apply_settings(state);
    }

    /// Push rate and effective volume to every handle.
    pub fn apply_settings(&mut self, state: &TimelineState) {
        for (id, cached) in self.handles.iter_mut() {
            let Some(clip) = state.clip(*id) else {
                continue;
            };
            let track = state.track_mix(clip.track());
            cached.handle.set_rate(clip.speed);
            cached
                .handle
                .set_volume(self.mix.volume * track.gain() * clip.volume.max(0.0));
            cached.handle.set_muted(self.mix.muted || track.muted);
        }
    }

    pub fn pause_all(&mut self) {
        for cached in self.handles.values_mut() {
            if !cached.handle.is_paused() {
                cached.handle.pause();
            }
        }
    }

    /// Tear down every handle and empty the cache.
    pub fn clear(&mut self) {
        for (id, mut cached) in std::mem::take(&mut self.handles) {
            cached.handle.teardown();
            tracing::debug!(clip = %id, "Decode handle torn down");
        }
    }

    pub(crate) fn handles_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Box<dyn DecodeHandle>)> {
        self.handles.iter_mut().map(|(id, c)| (*id, &mut c.handle))
    }
}

impl Drop for DecodeCache {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A handle that plays by following a [`Clock`]. Used for headless preview,
/// where there is no real decoder to report a position.
#[derive(Debug)]
pub struct ClockedHandle<C: Clock> {
    clock: C,
    position: f64,
    playing_since: Option<f64>,
    rate: f64,
    limit: f64,
    volume: f64,
    muted: bool,
}

impl<C: Clock> ClockedHandle<C> {
    pub fn new(clock: C, limit: f64) -> Self {
        Self {
            clock,
            position: 0.0,
            playing_since: None,
            rate: 1.0,
            limit: limit.max(0.0),
            volume: 1.0,
            muted: false,
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn settle(&mut self) {
        if let Some(since) = self.playing_since {
            let now = self.clock.now_secs();
            self.position = (self.position + (now - since) * self.rate).min(self.limit);
            self.playing_since = Some(now);
        }
    }
}

impl<C: Clock> DecodeHandle for ClockedHandle<C> {
    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some(since) => {
                (self.position + (self.clock.now_secs() - since) * self.rate).min(self.limit)
            }
            None => self.position,
        }
    }

    fn seek(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.limit);
        if self.playing_since.is_some() {
            self.playing_since = Some(self.clock.now_secs());
        }
    }

    fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(self.clock.now_secs());
        }
    }

    fn pause(&mut self) {
        self.settle();
        self.playing_since = None;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_rate(&mut self, rate: f64) {
        self.settle();
        self.rate = rate;
    }

    fn teardown(&mut self) {
        self.pause();
        self.position = 0.0;
    }
}

/// Opens a [`ClockedHandle`] per clip, all sharing one clock.
#[derive(Debug, Clone)]
pub struct ClockedFactory<C: Clock + Clone> {
    clock: C,
}

impl<C: Clock + Clone> ClockedFactory<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock + Clone + 'static> DecoderFactory for ClockedFactory<C> {
    fn open(&mut self, clip: &Clip, asset: &MediaAsset) -> Result<Box<dyn DecodeHandle>, DecodeError> {
        if !asset.kind.is_playable() {
            return Err(DecodeError::NotPlayable { kind: asset.kind });
        }
        Ok(Box::new(ClockedHandle::new(
            self.clock.clone(),
            clip.source_duration.max(asset.duration_seconds),
        )))
    }
}

/// Supplies the picture a clip shows at a source time.
pub trait PictureSource {
    fn picture(&mut self, clip: &Clip, asset: &MediaAsset, local_time: f64) -> Option<Arc<RgbaImage>>;
}

#[derive(Debug, Clone)]
enum StillState {
    Ready(Arc<RgbaImage>),
    Failed,
}

/// Decoded still images at their natural pixel size.
///
/// An image that is not loaded yet, or failed to load, contributes nothing.
#[derive(Debug, Default)]
pub struct StillImageCache {
    root: Option<PathBuf>,
    images: HashMap<AssetId, StillState>,
}

impl StillImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative asset paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            images: HashMap::new(),
        }
    }

    /// Provide a decoded image directly.
    pub fn insert(&mut self, asset: AssetId, image: RgbaImage) {
        self.images.insert(asset, StillState::Ready(Arc::new(image)));
    }

    pub fn get(&self, asset: AssetId) -> Option<Arc<RgbaImage>> {
        match self.images.get(&asset) {
            Some(StillState::Ready(img)) => Some(Arc::clone(img)),
            _ => None,
        }
    }

    pub fn evict(&mut self, asset: AssetId) {
        self.images.remove(&asset);
    }

    /// Decode every image asset in `catalog` that is not loaded yet.
    /// Returns how many loaded successfully.
    pub fn preload(&mut self, catalog: &MediaCatalog) -> usize {
        catalog
            .iter()
            .filter(|a| a.kind == MediaKind::Image)
            .filter(|a| self.load(a).is_some())
            .count()
    }

    fn resolve(&self, source: &Path) -> PathBuf {
        match &self.root {
            Some(root) if source.is_relative() => root.join(source),
            _ => source.to_path_buf(),
        }
    }

    fn load(&mut self, asset: &MediaAsset) -> Option<Arc<RgbaImage>> {
        if let Some(state) = self.images.get(&asset.id) {
            return match state {
                StillState::Ready(img) => Some(Arc::clone(img)),
                StillState::Failed => None,
            };
        }
        let path = self.resolve(&asset.source);
        match image::open(&path) {
            Ok(decoded) => {
                let img = Arc::new(decoded.to_rgba8());
                tracing::debug!(
                    asset = %asset.id,
                    width = img.width(),
                    height = img.height(),
                    "Still image loaded"
                );
                self.images.insert(asset.id, StillState::Ready(Arc::clone(&img)));
                Some(img)
            }
            Err(err) => {
                tracing::warn!(asset = %asset.id, path = %path.display(), error = %err, "Still image failed to load");
                self.images.insert(asset.id, StillState::Failed);
                None
            }
        }
    }
}

impl PictureSource for StillImageCache {
    fn picture(&mut self, clip: &Clip, asset: &MediaAsset, _local_time: f64) -> Option<Arc<RgbaImage>> {
        if clip.kind != MediaKind::Image {
            return None;
        }
        self.load(asset)
    }
}

/// Frames kept per asset by [`FfmpegFrameDecoder`].
const FRAME_CACHE_PER_ASSET: usize = 8;

/// Pulls single RGBA frames out of video files with the `ffmpeg` binary.
/// Used for offline rendering; stills are delegated to a [`StillImageCache`].
#[derive(Debug, Default)]
pub struct FfmpegFrameDecoder {
    stills: StillImageCache,
    frames: HashMap<AssetId, Vec<(i64, Arc<RgbaImage>)>>,
    fps: u32,
}

impl FfmpegFrameDecoder {
    pub fn new(stills: StillImageCache, fps: u32) -> Self {
        Self {
            stills,
            frames: HashMap::new(),
            fps: fps.max(1),
        }
    }

    fn decode_frame(&self, asset: &MediaAsset, secs: f64) -> Result<RgbaImage, DecodeError> {
        if asset.width == 0 || asset.height == 0 {
            return Err(DecodeError::Backend(format!(
                "{} has unknown dimensions",
                asset.id
            )));
        }
        let path = self.stills.resolve(&asset.source);
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{secs:.6}")])
            .arg("-i")
            .arg(&path)
            .args([
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", asset.width, asset.height),
                "pipe:1",
            ])
            .output()
            .map_err(|e| DecodeError::Open {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DecodeError::Backend(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        RgbaImage::from_raw(asset.width, asset.height, output.stdout).ok_or_else(|| {
            DecodeError::Backend(format!("short frame read from {}", path.display()))
        })
    }
}

impl PictureSource for FfmpegFrameDecoder {
    fn picture(&mut self, clip: &Clip, asset: &MediaAsset, local_time: f64) -> Option<Arc<RgbaImage>> {
        match clip.kind {
            MediaKind::Image => self.stills.picture(clip, asset, local_time),
            MediaKind::Audio => None,
            MediaKind::Video => {
                let index = (local_time * self.fps as f64).floor() as i64;
                if let Some(hit) = self
                    .frames
                    .get(&asset.id)
                    .and_then(|cached| cached.iter().find(|(i, _)| *i == index))
                {
                    return Some(Arc::clone(&hit.1));
                }
                let secs = index as f64 / self.fps as f64;
                match self.decode_frame(asset, secs) {
                    Ok(frame) => {
                        let frame = Arc::new(frame);
                        let cached = self.frames.entry(asset.id).or_default();
                        if cached.len() >= FRAME_CACHE_PER_ASSET {
                            cached.remove(0);
                        }
                        cached.push((index, Arc::clone(&frame)));
                        Some(frame)
                    }
                    Err(err) => {
                        tracing::warn!(clip = %clip.id, at = secs, error = %err, "Frame decode failed");
                        None
                    }
                }
            }
        }
    }
}
