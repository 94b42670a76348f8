//! Frame compositor: paints every visible entity of one timeline instant.
//!
//! Planning and painting are separate. [`plan_frame`] is a pure function of
//! the timeline that decides what is drawn, in which order, and at which
//! source time; [`Compositor::render`] turns a plan into pixels.

use image::RgbaImage;
use montage_project_model::{
    AnimationFrame, Clip, EntityId, EntityRef, FrameSize, MediaCatalog, ProjectSettings, Rgba,
    TimelineState, TransitionSpec,
};

use crate::decode::PictureSource;
use crate::filters::FilterChain;
use crate::surface::{FontBook, MediaPlacement, Surface};
use crate::transition::{TransitionEngine, TransitionFrame};

/// How far before its end an outgoing entity is held during a transition.
const HOLD_BEFORE_END_SECS: f64 = 1e-3;

/// What to draw for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawKind {
    /// A picture clip at a source time.
    Media { local_time: f64 },
    Text { anim: AnimationFrame },
}

/// An active transition into the entity being drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionStep {
    pub spec: TransitionSpec,
    /// Quantised progress in `[0, 1)`.
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawOp {
    pub id: EntityId,
    pub kind: DrawKind,
    pub transition: Option<TransitionStep>,
}

/// Draw operations for one instant, in paint order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramePlan {
    pub time: f64,
    pub ops: Vec<DrawOp>,
}

impl FramePlan {
    pub fn ids(&self) -> Vec<EntityId> {
        self.ops.iter().map(|op| op.id).collect()
    }
}

/// Decide what is drawn at `t`: visible entities lowest layer first. Audio
/// clips have no picture and are left out.
pub fn plan_frame(state: &TimelineState, t: f64, transitions: &TransitionEngine) -> FramePlan {
    let ops = state
        .visible_at(t)
        .into_iter()
        .filter_map(|entity| {
            let kind = match entity {
                EntityRef::Clip(clip) if clip.kind.has_picture() => DrawKind::Media {
                    local_time: clip.local_time(t),
                },
                EntityRef::Clip(_) => return None,
                EntityRef::Text(overlay) => DrawKind::Text {
                    anim: overlay.animation_at(t),
                },
            };
            let transition = state.transition_into(entity.id()).and_then(|spec| {
                transitions
                    .progress(spec, entity.start(), t)
                    .map(|progress| TransitionStep {
                        spec: spec.clone(),
                        progress,
                    })
            });
            Some(DrawOp {
                id: entity.id(),
                kind,
                transition,
            })
        })
        .collect();
    FramePlan { time: t, ops }
}

/// Renders frames for a fixed output size.
#[derive(Debug, Clone)]
pub struct Compositor {
    frame: FrameSize,
    background: Rgba,
    fonts: FontBook,
    transitions: TransitionEngine,
}

impl Compositor {
    pub fn new(frame: FrameSize, background: Rgba, fonts: FontBook, transition_steps: u32) -> Self {
        Self {
            frame,
            background,
            fonts,
            transitions: TransitionEngine::new(transition_steps),
        }
    }

    /// Output size and background from project settings.
    pub fn for_project(settings: &ProjectSettings, fonts: FontBook, transition_steps: u32) -> Self {
        let background = Rgba::parse_hex(&settings.background).unwrap_or_else(|| {
            tracing::warn!(background = %settings.background, "Invalid background color; using black");
            Rgba::BLACK
        });
        Self::new(settings.frame_size(), background, fonts, transition_steps)
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn transitions(&self) -> &TransitionEngine {
        &self.transitions
    }

    pub fn plan(&self, state: &TimelineState, t: f64) -> FramePlan {
        plan_frame(state, t, &self.transitions)
    }

    /// Composite the timeline at `t`.
    pub fn render(
        &self,
        state: &TimelineState,
        catalog: &MediaCatalog,
        t: f64,
        pictures: &mut dyn PictureSource,
    ) -> RgbaImage {
        let plan = self.plan(state, t);
        self.render_plan(&plan, state, catalog, pictures)
    }

    pub fn render_plan(
        &self,
        plan: &FramePlan,
        state: &TimelineState,
        catalog: &MediaCatalog,
        pictures: &mut dyn PictureSource,
    ) -> RgbaImage {
        let mut surface = Surface::new(self.frame, self.background);
        let t = plan.time;

        for op in &plan.ops {
            let Some(entity) = state.entity(op.id) else {
                continue;
            };
            match &op.transition {
                None => self.draw_op(&mut surface, entity, &op.kind, catalog, pictures),
                Some(step) => {
                    let mut incoming = Surface::transparent(self.frame);
                    self.draw_op(&mut incoming, entity, &op.kind, catalog, pictures);

                    // An outgoing entity that is still visible is already on
                    // the surface; only a finished one is held.
                    let outgoing = state
                        .entity(step.spec.from)
                        .filter(|from| !from.is_visible_at(t))
                        .map(|from| {
                            let held = (from.end() - HOLD_BEFORE_END_SECS).max(from.start());
                            let mut layer = Surface::transparent(self.frame);
                            self.draw_entity_at(&mut layer, from, held, catalog, pictures);
                            layer.into_image()
                        });

                    let frame = TransitionFrame::for_kind(step.spec.kind, step.progress);
                    let layer = self.transitions.compose(
                        &frame,
                        outgoing.as_ref(),
                        incoming.image(),
                        self.frame,
                    );
                    surface.draw_layer(&layer, 1.0);
                }
            }
        }
        surface.into_image()
    }

    fn draw_entity_at(
        &self,
        surface: &mut Surface,
        entity: EntityRef<'_>,
        t: f64,
        catalog: &MediaCatalog,
        pictures: &mut dyn PictureSource,
    ) {
        let kind = match entity {
            EntityRef::Clip(clip) => DrawKind::Media {
                local_time: clip.local_time(t),
            },
            EntityRef::Text(overlay) => DrawKind::Text {
                anim: overlay.animation_at(t),
            },
        };
        self.draw_op(surface, entity, &kind, catalog, pictures);
    }

    fn draw_op(
        &self,
        surface: &mut Surface,
        entity: EntityRef<'_>,
        kind: &DrawKind,
        catalog: &MediaCatalog,
        pictures: &mut dyn PictureSource,
    ) {
        match (entity, kind) {
            (EntityRef::Clip(clip), DrawKind::Media { local_time }) => {
                self.draw_clip(surface, clip, *local_time, catalog, pictures)
            }
            (EntityRef::Text(overlay), DrawKind::Text { anim }) => {
                surface.draw_text(overlay, anim, &self.fonts)
            }
            _ => {}
        }
    }

    /// Filters first, then crop, fit and transform in one placement pass.
    fn draw_clip(
        &self,
        surface: &mut Surface,
        clip: &Clip,
        local_time: f64,
        catalog: &MediaCatalog,
        pictures: &mut dyn PictureSource,
    ) {
        if !clip.kind.has_picture() {
            return;
        }
        let Some(asset) = catalog.get(clip.asset_id) else {
            tracing::debug!(clip = %clip.id, asset = %clip.asset_id, "Clip asset missing; skipped");
            return;
        };
        let Some(picture) = pictures.picture(clip, asset, local_time) else {
            return;
        };

        let chain = FilterChain::new(&clip.filters);
        let filtered;
        let source: &RgbaImage = if chain.is_empty() {
            &picture
        } else {
            filtered = chain.apply(&picture);
            &filtered
        };

        let placement = MediaPlacement::for_clip(clip, source.width(), source.height(), self.frame);
        surface.draw_media(source, &placement, 1.0);
    }
}
