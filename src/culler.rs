// src/culler.rs
//! Fused depth-bounds reduction and light culling, one task per screen tile.
//!
//! Each tile is processed the way an 8×8 compute work-group would: phases run
//! across all 64 emulated threads and the end of each phase is the barrier.
//! Group-shared state lives in [`TileShared`] (atomics, so phases stay correct
//! whatever order the threads run in). Tiles run in parallel on rayon and only
//! meet at the two global bump counters.
//!
//! Depth handling is convention-agnostic: the reduced raw min/max are turned
//! into forward distances and ordered, so the nearer surface always drives the
//! opaque near-split and the farther one bounds both lists.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use glam::{Mat4, UVec2};
use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frustum_grid::FrustumGrid;
use crate::light::PointLight;
use crate::light_grid::{IndexSink, LightGridEntry, LightLists};
use crate::math::{depth_to_forward, Frustum, Plane, VIEW_FORWARD};
use crate::tiles::{TileGrid, MAX_LIGHTS_PER_TILE, THREADS_PER_TILE, TILE_SIZE};

// ---------------------------------------------------------------------------
// Configuration & statistics
// ---------------------------------------------------------------------------

/// Order in which the emulated threads of a tile execute each phase.
/// Results must not depend on it; tests flip it to prove that.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadOrder {
    #[default]
    Forward,
    Reverse,
    /// Per-tile permutation from a seeded RNG.
    Shuffled(u64),
}

impl ThreadOrder {
    fn permutation(self, tile_index: usize) -> [u32; THREADS_PER_TILE as usize] {
        let mut order = [0u32; THREADS_PER_TILE as usize];
        for (i, slot) in order.iter_mut().enumerate() {
            *slot = i as u32;
        }
        match self {
            ThreadOrder::Forward => {}
            ThreadOrder::Reverse => order.reverse(),
            ThreadOrder::Shuffled(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ tile_index as u64);
                order.shuffle(&mut rng);
            }
        }
        order
    }
}

/// Per-frame culling statistics.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct CullStats {
    pub tiles: usize,
    pub lights: usize,
    /// Entries recorded across all tiles.
    pub opaque_records: u64,
    pub transparent_records: u64,
    /// Lights that passed the test but found the tile list full.
    pub opaque_dropped: u64,
    pub transparent_dropped: u64,
    /// Entries that had a tile range but landed past the end of the global
    /// index list.
    pub global_dropped: u64,
    /// Largest per-tile count before clamping.
    pub max_tile_lights: u32,
    pub elapsed: Duration,
}

#[derive(Default, Clone, Copy)]
struct TileReport {
    opaque: u64,
    transparent: u64,
    opaque_dropped: u64,
    transparent_dropped: u64,
    global_dropped: u64,
    max_tile_lights: u32,
}

impl TileReport {
    fn merge(self, other: Self) -> Self {
        Self {
            opaque: self.opaque + other.opaque,
            transparent: self.transparent + other.transparent,
            opaque_dropped: self.opaque_dropped + other.opaque_dropped,
            transparent_dropped: self.transparent_dropped + other.transparent_dropped,
            global_dropped: self.global_dropped + other.global_dropped,
            max_tile_lights: self.max_tile_lights.max(other.max_tile_lights),
        }
    }
}

// ---------------------------------------------------------------------------
// Group-shared tile state
// ---------------------------------------------------------------------------

/// Stand-in for one work-group's shared memory.
struct TileShared {
    frustum: Frustum,
    min_depth: AtomicU32,
    max_depth: AtomicU32,
    opaque_count: AtomicU32,
    transparent_count: AtomicU32,
    opaque_offset: u32,
    transparent_offset: u32,
    opaque_list: Box<[AtomicU32]>,
    transparent_list: Box<[AtomicU32]>,
}

impl TileShared {
    fn new() -> Self {
        let list = || -> Box<[AtomicU32]> { (0..MAX_LIGHTS_PER_TILE).map(|_| AtomicU32::new(0)).collect() };
        Self {
            frustum: Frustum::default(),
            min_depth: AtomicU32::new(u32::MAX),
            max_depth: AtomicU32::new(0),
            opaque_count: AtomicU32::new(0),
            transparent_count: AtomicU32::new(0),
            opaque_offset: 0,
            transparent_offset: 0,
            opaque_list: list(),
            transparent_list: list(),
        }
    }

    /// Thread 0 prologue.
    fn reset(&mut self, frustum: Frustum) {
        self.frustum = frustum;
        *self.min_depth.get_mut() = u32::MAX;
        *self.max_depth.get_mut() = 0;
        *self.opaque_count.get_mut() = 0;
        *self.transparent_count.get_mut() = 0;
        self.opaque_offset = 0;
        self.transparent_offset = 0;
    }

    /// Atomic append guarded by the shared-array capacity.
    #[inline]
    fn append(count: &AtomicU32, list: &[AtomicU32], light: u32) {
        let slot = count.fetch_add(1, Ordering::Relaxed);
        if let Some(cell) = list.get(slot as usize) {
            cell.store(light, Ordering::Relaxed);
        }
    }
}

/// Read-only inputs shared by every tile of one frame.
struct FrameInputs<'a> {
    grid: &'a TileGrid,
    frustums: &'a [Frustum],
    inverse_projection: Mat4,
    near_clip: f32,
    depth: &'a [f32],
    lights: &'a [PointLight],
    order: ThreadOrder,
}

/// Lanes of a tile that cover on-screen pixels, densely re-indexed.
#[derive(Copy, Clone)]
struct ActiveLanes {
    extent: UVec2,
}

impl ActiveLanes {
    #[inline]
    fn count(self) -> u32 {
        self.extent.x * self.extent.y
    }

    /// Dense index of lane `thread`, or `None` if its pixel is off screen.
    #[inline]
    fn index(self, thread: u32) -> Option<u32> {
        let local = UVec2::new(thread % TILE_SIZE, thread / TILE_SIZE);
        (local.x < self.extent.x && local.y < self.extent.y).then(|| local.y * self.extent.x + local.x)
    }
}

// ---------------------------------------------------------------------------
// Culler
// ---------------------------------------------------------------------------

/// CPU light culler. Cheap to keep around; holds only config and the last stats.
pub struct LightCuller {
    order: ThreadOrder,
    stats: Mutex<CullStats>,
}

impl Default for LightCuller {
    fn default() -> Self {
        Self::new(ThreadOrder::Forward)
    }
}

impl LightCuller {
    pub fn new(order: ThreadOrder) -> Self {
        Self {
            order,
            stats: Mutex::new(CullStats::default()),
        }
    }

    pub fn set_thread_order(&mut self, order: ThreadOrder) {
        self.order = order;
    }

    /// Statistics of the most recent [`LightCuller::cull`].
    pub fn stats(&self) -> CullStats {
        self.stats.lock().clone()
    }

    /// Fill both light lists for this frame.
    ///
    /// `out` must have been cleared since the previous frame; `depth` is the
    /// GBuffer depth channel at the frustum grid's resolution; `lights` are in
    /// view space.
    #[tracing::instrument(skip_all, fields(grid = ?frustums.grid().grid_size, lights = lights.len()))]
    pub fn cull(
        &self,
        frustums: &FrustumGrid,
        depth: &[f32],
        lights: &[PointLight],
        out: &mut LightLists,
    ) -> Result<CullStats> {
        let start = Instant::now();
        let grid = frustums.grid();
        let pixels = (grid.screen_size.x * grid.screen_size.y) as usize;
        crate::ensure!(
            depth.len() == pixels,
            "depth channel has {} texels, expected {} for {}x{}",
            depth.len(),
            pixels,
            grid.screen_size.x,
            grid.screen_size.y
        );
        crate::ensure!(
            out.opaque.tile_count() == grid.tile_count() && out.transparent.tile_count() == grid.tile_count(),
            "light lists sized for {} tiles, grid has {}",
            out.opaque.tile_count(),
            grid.tile_count()
        );

        let inverse_projection = *frustums.inverse_projection();
        let near_clip = depth_to_forward(0.0, &inverse_projection).min(depth_to_forward(1.0, &inverse_projection));
        let inputs = FrameInputs {
            grid,
            frustums: frustums.frustums(),
            inverse_projection,
            near_clip,
            depth,
            lights,
            order: self.order,
        };

        let (opaque_entries, opaque_sink) = out.opaque.split_mut();
        let (transparent_entries, transparent_sink) = out.transparent.split_mut();

        let report = opaque_entries
            .par_iter_mut()
            .zip(transparent_entries.par_iter_mut())
            .enumerate()
            .map_init(TileShared::new, |shared, (tile_index, (opaque, transparent))| {
                cull_tile(
                    &inputs,
                    shared,
                    tile_index,
                    (opaque, opaque_sink),
                    (transparent, transparent_sink),
                )
            })
            .reduce(TileReport::default, TileReport::merge);

        let stats = CullStats {
            tiles: grid.tile_count(),
            lights: lights.len(),
            opaque_records: report.opaque,
            transparent_records: report.transparent,
            opaque_dropped: report.opaque_dropped,
            transparent_dropped: report.transparent_dropped,
            global_dropped: report.global_dropped,
            max_tile_lights: report.max_tile_lights,
            elapsed: start.elapsed(),
        };
        if stats.opaque_dropped + stats.transparent_dropped > 0 {
            tracing::warn!(
                opaque = stats.opaque_dropped,
                transparent = stats.transparent_dropped,
                "per-tile light lists overflowed"
            );
        }
        if stats.global_dropped > 0 {
            tracing::warn!(dropped = stats.global_dropped, "light index list full, entries dropped");
        }
        tracing::trace!(?stats, "light cull finished");
        *self.stats.lock() = stats.clone();
        Ok(stats)
    }
}

/// One work-group. Phase boundaries mark the barriers.
fn cull_tile(
    inputs: &FrameInputs<'_>,
    shared: &mut TileShared,
    tile_index: usize,
    opaque: (&mut LightGridEntry, IndexSink<'_>),
    transparent: (&mut LightGridEntry, IndexSink<'_>),
) -> TileReport {
    let grid = inputs.grid;
    let tile = grid.tile_coords(tile_index);
    let lanes = ActiveLanes {
        extent: grid.active_extent(tile),
    };
    if lanes.count() == 0 {
        return TileReport::default();
    }
    let order = inputs.order.permutation(tile_index);

    // Phase 1 (thread 0): load frustum, reset shared accumulators.
    shared.reset(inputs.frustums[tile_index]);

    // Phase 2: depth reduction on bit patterns. Valid for non-negative depth.
    for &thread in &order {
        if lanes.index(thread).is_none() {
            continue;
        }
        let pixel = tile * TILE_SIZE + UVec2::new(thread % TILE_SIZE, thread / TILE_SIZE);
        let bits = inputs.depth[(pixel.y * grid.screen_size.x + pixel.x) as usize].to_bits();
        shared.min_depth.fetch_min(bits, Ordering::Relaxed);
        shared.max_depth.fetch_max(bits, Ordering::Relaxed);
    }

    // Phase 3: depth bounds as forward distances plus the opaque near-split.
    let min_depth = f32::from_bits(*shared.min_depth.get_mut());
    let max_depth = f32::from_bits(*shared.max_depth.get_mut());
    let a = depth_to_forward(min_depth, &inputs.inverse_projection);
    let b = depth_to_forward(max_depth, &inputs.inverse_projection);
    let (near_surface, far_surface) = (a.min(b), a.max(b));
    let near_split = Plane::new(VIEW_FORWARD, near_surface);

    // Phase 4: round-robin light tests over active lanes.
    let stride = lanes.count() as usize;
    for &thread in &order {
        let Some(lane) = lanes.index(thread) else {
            continue;
        };
        for light_id in (lane as usize..inputs.lights.len()).step_by(stride) {
            let light = &inputs.lights[light_id];
            if !shared
                .frustum
                .intersects_sphere(light.position, light.radius, inputs.near_clip, far_surface)
            {
                continue;
            }
            TileShared::append(&shared.transparent_count, &shared.transparent_list, light_id as u32);
            if !near_split.sphere_outside(light.position, light.radius) {
                TileShared::append(&shared.opaque_count, &shared.opaque_list, light_id as u32);
            }
        }
    }

    // Phase 5 (thread 0): reserve global ranges for non-empty lists.
    let opaque_total = *shared.opaque_count.get_mut();
    let transparent_total = *shared.transparent_count.get_mut();
    let opaque_count = opaque_total.min(MAX_LIGHTS_PER_TILE);
    let transparent_count = transparent_total.min(MAX_LIGHTS_PER_TILE);
    let (opaque_entry, opaque_sink) = opaque;
    let (transparent_entry, transparent_sink) = transparent;
    if opaque_count > 0 {
        shared.opaque_offset = opaque_sink.reserve(opaque_count);
        *opaque_entry = LightGridEntry {
            offset: shared.opaque_offset,
            count: opaque_count,
        };
    }
    if transparent_count > 0 {
        shared.transparent_offset = transparent_sink.reserve(transparent_count);
        *transparent_entry = LightGridEntry {
            offset: shared.transparent_offset,
            count: transparent_count,
        };
    }

    // Phase 6: cooperative copy into the reserved ranges.
    let mut global_dropped = 0u64;
    for &thread in &order {
        let Some(lane) = lanes.index(thread) else {
            continue;
        };
        for i in (lane..opaque_count).step_by(stride) {
            let stored = opaque_sink.store(
                shared.opaque_offset + i,
                shared.opaque_list[i as usize].load(Ordering::Relaxed),
            );
            global_dropped += u64::from(!stored);
        }
        for i in (lane..transparent_count).step_by(stride) {
            let stored = transparent_sink.store(
                shared.transparent_offset + i,
                shared.transparent_list[i as usize].load(Ordering::Relaxed),
            );
            global_dropped += u64::from(!stored);
        }
    }

    TileReport {
        opaque: opaque_count as u64,
        transparent: transparent_count as u64,
        opaque_dropped: (opaque_total - opaque_count) as u64,
        transparent_dropped: (transparent_total - transparent_count) as u64,
        global_dropped,
        max_tile_lights: opaque_total.max(transparent_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, DepthConvention};
    use crate::light_grid::LightList;
    use glam::Vec3;
    use rand::Rng;
    use std::collections::HashSet;

    fn setup(width: u32, height: u32, depth: DepthConvention) -> (FrustumGrid, Camera) {
        let camera = Camera::new(
            Vec3::ZERO,
            0.0,
            0.0,
            90f32.to_radians(),
            width as f32 / height as f32,
            0.1,
            100.0,
            depth,
        );
        let frustums = FrustumGrid::build(TileGrid::new(width, height), camera.culling_projection(false).inverse());
        (frustums, camera)
    }

    /// Depth field alternating two values so every tile sees both.
    fn checker_depth(grid: &TileGrid, a: f32, b: f32) -> Vec<f32> {
        (0..grid.screen_size.y)
            .flat_map(|y| (0..grid.screen_size.x).map(move |x| if (x + y) % 2 == 0 { a } else { b }))
            .collect()
    }

    fn run(frustums: &FrustumGrid, depth: &[f32], lights: &[PointLight], order: ThreadOrder) -> LightLists {
        let mut lists = LightLists::new(frustums.grid());
        LightCuller::new(order).cull(frustums, depth, lights, &mut lists).unwrap();
        lists
    }

    fn assert_disjoint(lists: &LightLists) {
        for list in [&lists.opaque, &lists.transparent] {
            let mut ranges: Vec<_> = list.entries().iter().filter(|e| e.count > 0).map(|e| e.range()).collect();
            ranges.sort_by_key(|r| r.start);
            for pair in ranges.windows(2) {
                assert!(pair[0].end <= pair[1].start, "overlapping ranges {:?}", pair);
            }
            for r in &ranges {
                assert!(r.end <= list.capacity());
            }
        }
    }

    #[test]
    fn test_single_light_every_tile() {
        let (frustums, _) = setup(256, 256, DepthConvention::Standard);
        assert_eq!(frustums.grid().grid_size, UVec2::new(32, 32));
        let depth = checker_depth(frustums.grid(), 0.1, 0.9);
        let lights = [PointLight::new(Vec3::ZERO, 1.0, Vec3::ONE)];
        let lists = run(&frustums, &depth, &lights, ThreadOrder::Forward);

        for list in [&lists.opaque, &lists.transparent] {
            assert!(list.entries().iter().all(|e| e.count == 1));
            let offsets: HashSet<u32> = list.entries().iter().map(|e| e.offset).collect();
            assert_eq!(offsets.len(), 1024);
            assert!(offsets.iter().all(|&o| o < 1024));
            for tile in 0..list.tile_count() {
                assert_eq!(list.tile_lights_vec(tile), vec![0]);
            }
            assert_eq!(list.counter(), 1024);
        }
        assert_disjoint(&lists);
    }

    #[test]
    fn test_reversed_depth_gives_same_counts() {
        let (std_grid, std_cam) = setup(128, 96, DepthConvention::Standard);
        let (rev_grid, rev_cam) = setup(128, 96, DepthConvention::Reversed);
        // Same two surfaces, expressed in each convention.
        let to_ndc = |cam: &Camera, dist: f32| {
            let clip = cam.proj_matrix() * glam::Vec4::new(0.0, 0.0, -dist, 1.0);
            clip.z / clip.w
        };
        let std_depth = checker_depth(std_grid.grid(), to_ndc(&std_cam, 2.0), to_ndc(&std_cam, 6.0));
        let rev_depth = checker_depth(rev_grid.grid(), to_ndc(&rev_cam, 2.0), to_ndc(&rev_cam, 6.0));
        let lights = [
            PointLight::new(Vec3::new(0.0, 0.0, -4.0), 1.0, Vec3::ONE),
            PointLight::new(Vec3::new(1.0, 0.5, -0.5), 0.4, Vec3::ONE),
            PointLight::new(Vec3::new(-2.0, 0.0, -9.0), 1.5, Vec3::ONE),
        ];
        let a = run(&std_grid, &std_depth, &lights, ThreadOrder::Forward);
        let b = run(&rev_grid, &rev_depth, &lights, ThreadOrder::Forward);
        for t in 0..a.opaque.tile_count() {
            assert_eq!(a.opaque.entry(t).count, b.opaque.entry(t).count);
            assert_eq!(a.transparent.entry(t).count, b.transparent.entry(t).count);
        }
    }

    #[test]
    fn test_near_split_only_affects_opaque() {
        let (frustums, camera) = setup(64, 64, DepthConvention::Reversed);
        let clip = camera.proj_matrix() * glam::Vec4::new(0.0, 0.0, -10.0, 1.0);
        let depth = vec![clip.z / clip.w; 64 * 64];
        // Between camera and the wall: transparent only.
        let lights = [PointLight::new(Vec3::new(0.0, 0.0, -3.0), 1.0, Vec3::ONE)];
        let lists = run(&frustums, &depth, &lights, ThreadOrder::Forward);
        let center = frustums.grid().tile_index(UVec2::new(3, 3));
        assert_eq!(lists.transparent.entry(center).count, 1);
        assert_eq!(lists.opaque.entry(center).count, 0);
        assert_eq!(lists.opaque.counter(), 0);
    }

    #[test]
    fn test_light_outside_planes_absent_and_centered_light_everywhere() {
        let (frustums, _) = setup(128, 128, DepthConvention::Standard);
        let depth = checker_depth(frustums.grid(), 0.95, 0.99);
        // Far off to the right, but inside the depth range.
        let off = PointLight::new(Vec3::new(40.0, 0.0, -5.0), 1.0, Vec3::ONE);
        // Large sphere straddling the camera axis.
        let big = PointLight::new(Vec3::new(0.0, 0.0, -2.0), 50.0, Vec3::ONE);
        let lists = run(&frustums, &depth, &[off, big], ThreadOrder::Forward);
        for t in 0..lists.opaque.tile_count() {
            assert_eq!(lists.opaque.tile_lights_vec(t), vec![1]);
            assert_eq!(lists.transparent.tile_lights_vec(t), vec![1]);
        }
    }

    #[test]
    fn test_light_culled_per_tile_plane() {
        let (frustums, _) = setup(64, 64, DepthConvention::Standard);
        let depth = vec![0.999; 64 * 64];
        // Small light right of center: only right-half tiles may contain it.
        let light = PointLight::new(Vec3::new(3.0, 0.0, -5.0), 0.2, Vec3::ONE);
        let lists = run(&frustums, &depth, &[light], ThreadOrder::Forward);
        let grid = frustums.grid();
        let mut hits = 0;
        for t in 0..grid.tile_count() {
            let tile = grid.tile_coords(t);
            let entry = lists.transparent.entry(t);
            if tile.x < 4 {
                assert_eq!(entry.count, 0, "tile {tile} left of center");
            }
            for p in &frustums.frustum(tile).planes {
                if p.sphere_outside(light.position, light.radius) {
                    assert_eq!(entry.count, 0);
                }
            }
            hits += entry.count;
        }
        assert!(hits > 0);
    }

    #[test]
    fn test_edge_tiles_still_test_all_lights() {
        let (frustums, _) = setup(17, 9, DepthConvention::Standard);
        assert_eq!(frustums.grid().grid_size, UVec2::new(3, 2));
        let depth = vec![0.99; 17 * 9];
        // More lights than the single active lane of the corner tile.
        let lights: Vec<_> = (0..100)
            .map(|i| PointLight::new(Vec3::new(0.0, 0.0, -1.0 - i as f32 * 0.01), 100.0, Vec3::ONE))
            .collect();
        let lists = run(&frustums, &depth, &lights, ThreadOrder::Forward);
        for t in 0..6 {
            let mut got = lists.opaque.tile_lights_vec(t);
            got.sort_unstable();
            assert_eq!(got, (0..100).collect::<Vec<u32>>(), "tile {t}");
        }
    }

    #[test]
    fn test_random_lights_ranges_disjoint_and_bounded() {
        let (frustums, camera) = setup(320, 180, DepthConvention::Reversed);
        let mut rng = StdRng::seed_from_u64(7);
        let depth: Vec<f32> = (0..320 * 180)
            .map(|_| {
                let dist = rng.gen_range(1.0f32..80.0);
                let clip = camera.proj_matrix() * glam::Vec4::new(0.0, 0.0, -dist, 1.0);
                clip.z / clip.w
            })
            .collect();
        let lights: Vec<_> = (0..1000)
            .map(|_| {
                PointLight::new(
                    Vec3::new(rng.gen_range(-40.0..40.0), rng.gen_range(-25.0..25.0), rng.gen_range(-90.0..5.0)),
                    rng.gen_range(0.5..6.0),
                    Vec3::ONE,
                )
            })
            .collect();
        let mut lists = LightLists::new(frustums.grid());
        let culler = LightCuller::default();
        let stats = culler.cull(&frustums, &depth, &lights, &mut lists).unwrap();
        assert_disjoint(&lists);
        let bound = (lights.len() * frustums.grid().tile_count()) as u64;
        assert!(lists.opaque.total_count() <= bound);
        assert!(lists.opaque.total_count() <= lists.transparent.total_count());
        assert_eq!(stats.opaque_records, lists.opaque.total_count());
        assert_eq!(culler.stats(), stats);
        for t in 0..lists.opaque.tile_count() {
            let transparent: HashSet<u32> = lists.transparent.tile_lights(t).collect();
            assert!(lists.opaque.tile_lights(t).all(|l| transparent.contains(&l)));
        }
    }

    #[test]
    fn test_thread_order_does_not_change_results() {
        let (frustums, _) = setup(100, 60, DepthConvention::Standard);
        let mut rng = StdRng::seed_from_u64(99);
        let depth: Vec<f32> = (0..100 * 60).map(|_| rng.gen_range(0.9..0.9999)).collect();
        let lights: Vec<_> = (0..300)
            .map(|_| {
                PointLight::new(
                    Vec3::new(rng.gen_range(-20.0..20.0), rng.gen_range(-12.0..12.0), rng.gen_range(-30.0..0.0)),
                    rng.gen_range(0.2..3.0),
                    Vec3::ONE,
                )
            })
            .collect();
        let sorted = |lists: &LightLists, t: usize| {
            let mut o = lists.opaque.tile_lights_vec(t);
            let mut tr = lists.transparent.tile_lights_vec(t);
            o.sort_unstable();
            tr.sort_unstable();
            (o, tr)
        };
        let base = run(&frustums, &depth, &lights, ThreadOrder::Forward);
        for order in [ThreadOrder::Reverse, ThreadOrder::Shuffled(1), ThreadOrder::Shuffled(2)] {
            let other = run(&frustums, &depth, &lights, order);
            for t in 0..base.opaque.tile_count() {
                assert_eq!(sorted(&base, t), sorted(&other, t));
            }
        }
    }

    #[test]
    fn test_tile_overflow_drops_extra_lights() {
        let (frustums, _) = setup(16, 16, DepthConvention::Standard);
        let depth = vec![0.99; 16 * 16];
        let lights = vec![PointLight::new(Vec3::new(0.0, 0.0, -1.0), 1000.0, Vec3::ONE); 1500];
        let mut lists = LightLists::new(frustums.grid());
        let stats = LightCuller::default().cull(&frustums, &depth, &lights, &mut lists).unwrap();
        for t in 0..4 {
            assert_eq!(lists.opaque.entry(t).count, MAX_LIGHTS_PER_TILE);
        }
        assert_eq!(stats.opaque_dropped, 4 * 476);
        assert_eq!(stats.max_tile_lights, 1500);
        assert_eq!(lists.opaque.counter() as usize, lists.opaque.capacity());
        assert_disjoint(&lists);
    }

    #[test]
    fn test_full_index_list_drops_entries() {
        let (frustums, _) = setup(16, 16, DepthConvention::Standard);
        let depth = vec![0.99; 16 * 16];
        let light = PointLight::new(Vec3::new(0.0, 0.0, -2.0), 100.0, Vec3::ONE);
        let mut lists = LightLists {
            opaque: LightList::with_index_capacity(4, 2),
            transparent: LightList::with_index_capacity(4, 2),
        };
        let stats = LightCuller::default().cull(&frustums, &depth, &[light], &mut lists).unwrap();

        // Four tiles each reserve one slot; two of them land past the end.
        assert_eq!(stats.global_dropped, 4);
        for list in [&lists.opaque, &lists.transparent] {
            assert_eq!(list.counter(), 4);
            let mut stored = 0;
            for t in 0..list.tile_count() {
                let got = list.tile_lights_vec(t);
                assert!(got.len() <= list.entry(t).count as usize);
                assert!(got.iter().all(|&l| l == 0));
                stored += got.len();
            }
            assert_eq!(stored, list.capacity());
        }

        // A second cull without clearing keeps reserving past the end.
        let again = LightCuller::default().cull(&frustums, &depth, &[light], &mut lists).unwrap();
        assert_eq!(again.global_dropped, 8);
    }

    #[test]
    fn test_rejects_mismatched_depth() {
        let (frustums, _) = setup(16, 16, DepthConvention::Standard);
        let mut lists = LightLists::new(frustums.grid());
        assert!(LightCuller::default().cull(&frustums, &[0.5; 10], &[], &mut lists).is_err());
    }
}
