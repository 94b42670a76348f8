//! Montage Render Engine
//!
//! Playback scheduling, decoding, compositing and export for a timeline.
//!
//! # Pipeline Architecture
//!
//! ```text
//! FrameScheduler ── tick ──► RenderLoop ──► MasterClock (virtual time)
//!                                │
//!                                ├── DecodeCache (resync handles to local time)
//!                                │
//!                                ▼
//!                           Compositor
//!                                │  plan_frame: visible entities, paint order
//!                                ├── FilterChain ► MediaPlacement (clips)
//!                                ├── draw_text (overlays)
//!                                ├── TransitionEngine (quantised blends)
//!                                ▼
//!                            RgbaImage ──► ExportSink (ffmpeg / memory)
//! ```
//!
//! Everything here runs on one cooperative thread. Decode handles advance on
//! their own; the render loop corrects them against the master clock.

pub mod compositor;
pub mod decode;
pub mod export;
pub mod filters;
pub mod import;
pub mod playback;
pub mod scheduler;
pub mod surface;
pub mod transition;

pub use compositor::{plan_frame, Compositor, DrawKind, DrawOp, FramePlan};
pub use decode::{
    ClockedFactory, ClockedHandle, DecodeCache, DecodeError, DecodeHandle, DecoderFactory,
    FfmpegFrameDecoder, PictureSource, StillImageCache, SyncReport,
};
pub use export::*;
pub use filters::FilterChain;
pub use import::{import_asset, import_batch, MetadataProbe, ProbedMetadata, SystemProbe};
pub use playback::{ClockState, MasterClock, PlaybackCursor, RenderLoop, TickReport};
pub use scheduler::FrameScheduler;
pub use surface::{FontBook, MediaPlacement, Surface};
pub use transition::{TransitionEngine, TransitionFrame};
