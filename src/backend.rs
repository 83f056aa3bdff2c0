// src/backend.rs
//! The rendering-backend seam.
//!
//! The culling core never owns a device. It declares, per stage, which
//! resources it reads and writes and asks the backend for passes and
//! barriers through an explicitly passed [`RenderContext`].

use crate::error::Result;
use crate::light_grid::ListKind;

// ============================================================================
// 1. STAGES & RESOURCES
// ============================================================================

/// Per-frame pipeline stages, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Counter and light-grid reset.
    Clear,
    GBuffer,
    /// Only after a resize.
    FrustumBuild,
    LightCull,
    Lighting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    TiledGlobals,
    FrustumGrid,
    PointLights,
    GBufferPosition,
    GBufferNormal,
    GBufferMaterial,
    GBufferDepth,
    LightGrid(ListKind),
    LightIndexList(ListKind),
    LightIndexCounter(ListKind),
}

use ListKind::{Opaque, Transparent};
use Resource::*;

/// Read/write declaration for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDecl {
    pub stage: Stage,
    pub reads: &'static [Resource],
    pub writes: &'static [Resource],
}

impl PassDecl {
    /// Resources this pass writes that `next` reads or writes (RAW / WAW).
    pub fn hazards(&self, next: &PassDecl) -> Vec<Resource> {
        self.writes
            .iter()
            .copied()
            .filter(|r| next.reads.contains(r) || next.writes.contains(r))
            .collect()
    }
}

impl Stage {
    pub fn decl(self) -> PassDecl {
        match self {
            Stage::Clear => PassDecl {
                stage: self,
                reads: &[],
                writes: &[
                    LightIndexCounter(Opaque),
                    LightIndexCounter(Transparent),
                    LightGrid(Opaque),
                    LightGrid(Transparent),
                ],
            },
            Stage::GBuffer => PassDecl {
                stage: self,
                reads: &[],
                writes: &[GBufferPosition, GBufferNormal, GBufferMaterial, GBufferDepth],
            },
            Stage::FrustumBuild => PassDecl {
                stage: self,
                reads: &[TiledGlobals],
                writes: &[FrustumGrid],
            },
            Stage::LightCull => PassDecl {
                stage: self,
                reads: &[TiledGlobals, FrustumGrid, GBufferDepth, PointLights],
                writes: &[
                    LightGrid(Opaque),
                    LightIndexList(Opaque),
                    LightIndexCounter(Opaque),
                    LightGrid(Transparent),
                    LightIndexList(Transparent),
                    LightIndexCounter(Transparent),
                ],
            },
            Stage::Lighting => PassDecl {
                stage: self,
                reads: &[
                    GBufferPosition,
                    GBufferNormal,
                    GBufferMaterial,
                    PointLights,
                    LightGrid(Opaque),
                    LightIndexList(Opaque),
                ],
                writes: &[],
            },
        }
    }
}

// ============================================================================
// 2. BACKEND TRAIT & CONTEXT
// ============================================================================

/// What the culling core needs from a renderer backend.
pub trait RenderBackend {
    fn begin_pass(&mut self, decl: &PassDecl);
    fn end_pass(&mut self, stage: Stage);
    /// One-directional dependency: `dst` may not touch `resources` before `src` finished.
    fn barrier(&mut self, src: Stage, dst: Stage, resources: &[Resource]);
    /// Everything before completes and is visible before anything after starts.
    fn full_barrier(&mut self);
    fn submit(&mut self, frame_index: u64) -> Result<()>;
}

/// Explicit handle threaded through every frame operation.
pub struct RenderContext<B: RenderBackend> {
    pub backend: B,
    frame_index: u64,
}

impl<B: RenderBackend> RenderContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            frame_index: 0,
        }
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Submit the recorded frame and advance the frame counter.
    pub fn submit(&mut self) -> Result<()> {
        self.backend.submit(self.frame_index)?;
        self.frame_index += 1;
        Ok(())
    }

    /// Barrier covering every hazard between two declared passes. No-op when
    /// the passes share nothing.
    pub fn barrier_between(&mut self, src: &PassDecl, dst: &PassDecl) {
        let hazards = src.hazards(dst);
        if !hazards.is_empty() {
            self.backend.barrier(src.stage, dst.stage, &hazards);
        }
    }

    /// Run `body` inside a declared pass.
    pub fn pass<T>(&mut self, stage: Stage, body: impl FnOnce() -> T) -> T {
        let decl = stage.decl();
        self.backend.begin_pass(&decl);
        let out = body();
        self.backend.end_pass(stage);
        out
    }

    /// Like [`RenderContext::pass`], but `body` records through the backend.
    pub fn pass_with<T>(&mut self, stage: Stage, body: impl FnOnce(&mut B) -> T) -> T {
        let decl = stage.decl();
        self.backend.begin_pass(&decl);
        let out = body(&mut self.backend);
        self.backend.end_pass(stage);
        out
    }
}

// ============================================================================
// 3. RECORDING BACKEND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    BeginPass(Stage),
    EndPass(Stage),
    Barrier {
        src: Stage,
        dst: Stage,
        resources: Vec<Resource>,
    },
    FullBarrier,
    Submit(u64),
}

/// Backend that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    events: Vec<BackendEvent>,
}

impl RecordingBackend {
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: &BackendEvent) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    /// Index of the first barrier from `src` to `dst` naming `resource`.
    pub fn barrier_position(&self, src: Stage, dst: Stage, resource: Resource) -> Option<usize> {
        self.events.iter().position(|e| {
            matches!(e, BackendEvent::Barrier { src: s, dst: d, resources }
                if *s == src && *d == dst && resources.contains(&resource))
        })
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_pass(&mut self, decl: &PassDecl) {
        self.events.push(BackendEvent::BeginPass(decl.stage));
    }

    fn end_pass(&mut self, stage: Stage) {
        self.events.push(BackendEvent::EndPass(stage));
    }

    fn barrier(&mut self, src: Stage, dst: Stage, resources: &[Resource]) {
        self.events.push(BackendEvent::Barrier {
            src,
            dst,
            resources: resources.to_vec(),
        });
    }

    fn full_barrier(&mut self) {
        self.events.push(BackendEvent::FullBarrier);
    }

    fn submit(&mut self, frame_index: u64) -> Result<()> {
        self.events.push(BackendEvent::Submit(frame_index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_depends_on_depth_and_clear() {
        let gbuffer = Stage::GBuffer.decl();
        let clear = Stage::Clear.decl();
        let cull = Stage::LightCull.decl();
        assert_eq!(gbuffer.hazards(&cull), vec![GBufferDepth]);
        assert_eq!(clear.hazards(&cull).len(), 4);
        let lighting = Stage::Lighting.decl();
        assert_eq!(cull.hazards(&lighting), vec![LightGrid(Opaque), LightIndexList(Opaque)]);
        assert!(lighting.hazards(&cull).is_empty());
    }

    #[test]
    fn test_context_records_and_counts_frames() {
        let mut ctx = RenderContext::new(RecordingBackend::default());
        let value = ctx.pass(Stage::GBuffer, || 7);
        let seen = ctx.pass_with(Stage::Clear, |backend| backend.events().len());
        ctx.barrier_between(&Stage::GBuffer.decl(), &Stage::LightCull.decl());
        ctx.barrier_between(&Stage::Lighting.decl(), &Stage::GBuffer.decl());
        ctx.submit().unwrap();
        assert_eq!(value, 7);
        assert_eq!(seen, 3);
        assert_eq!(ctx.frame_index(), 1);
        assert_eq!(
            ctx.backend.events(),
            &[
                BackendEvent::BeginPass(Stage::GBuffer),
                BackendEvent::EndPass(Stage::GBuffer),
                BackendEvent::BeginPass(Stage::Clear),
                BackendEvent::EndPass(Stage::Clear),
                BackendEvent::Barrier {
                    src: Stage::GBuffer,
                    dst: Stage::LightCull,
                    resources: vec![GBufferDepth],
                },
                BackendEvent::Submit(0),
            ]
        );
        assert_eq!(ctx.backend.barrier_position(Stage::GBuffer, Stage::LightCull, GBufferDepth), Some(4));
    }
}
