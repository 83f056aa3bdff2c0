// src/gpu/shaders.rs
//! WGSL for the two compute passes. Struct layouts match
//! `GpuTiledGlobals`, `Frustum` and `PointLight` on the Rust side.

pub const COMMON_WGSL: &str = r#"
const TILE_SIZE: u32 = 8u;
const MAX_LIGHTS_PER_TILE: u32 = 1024u;

struct TiledGlobals {
    inverse_projection: mat4x4<f32>,
    screen_size: vec2<f32>,
    grid_size: vec2<u32>,
};

struct Plane {
    normal: vec3<f32>,
    distance: f32,
};

struct Frustum {
    planes: array<Plane, 4>,
};

fn clip_to_view(clip: vec4<f32>, inverse_projection: mat4x4<f32>) -> vec4<f32> {
    let view = inverse_projection * clip;
    return view / view.w;
}

// Distance along the view direction (-Z).
fn depth_to_forward(depth: f32, inverse_projection: mat4x4<f32>) -> f32 {
    return -clip_to_view(vec4<f32>(0.0, 0.0, depth, 1.0), inverse_projection).z;
}
"#;

/// One thread per tile, 8×8 tiles per work-group.
pub const FRUSTUM_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> globals: TiledGlobals;
@group(0) @binding(1) var<storage, read_write> frustums: array<Frustum>;

fn corner(screen: vec2<f32>) -> vec3<f32> {
    let ndc = 2.0 * (screen / globals.screen_size) - vec2<f32>(1.0);
    return clip_to_view(vec4<f32>(ndc, 1.0, 1.0), globals.inverse_projection).xyz;
}

fn plane_through_origin(a: vec3<f32>, b: vec3<f32>) -> Plane {
    return Plane(normalize(cross(a, b)), 0.0);
}

@compute @workgroup_size(8, 8, 1)
fn build_frustums(@builtin(global_invocation_id) id: vec3<u32>) {
    let tile = id.xy;
    if (tile.x >= globals.grid_size.x || tile.y >= globals.grid_size.y) {
        return;
    }
    let lo = vec2<f32>(tile * TILE_SIZE);
    let hi = vec2<f32>((tile + vec2<u32>(1u)) * TILE_SIZE);

    let bottom_left = corner(lo);
    let bottom_right = corner(vec2<f32>(hi.x, lo.y));
    let top_left = corner(vec2<f32>(lo.x, hi.y));
    let top_right = corner(hi);

    var frustum: Frustum;
    frustum.planes[0] = plane_through_origin(bottom_left, top_left);
    frustum.planes[1] = plane_through_origin(top_right, bottom_right);
    frustum.planes[2] = plane_through_origin(top_left, top_right);
    frustum.planes[3] = plane_through_origin(bottom_right, bottom_left);
    frustums[tile.y * globals.grid_size.x + tile.x] = frustum;
}
"#;

/// One work-group per tile, one thread per pixel. Depth bounds and both
/// light lists are produced in a single dispatch.
pub const CULL_WGSL: &str = r#"
struct PointLight {
    color: vec3<f32>,
    _pad: u32,
    position: vec3<f32>,
    radius: f32,
};

struct Scene {
    light_count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0) var<uniform> globals: TiledGlobals;
@group(0) @binding(1) var<storage, read> frustums: array<Frustum>;
@group(0) @binding(2) var depth_texture: texture_2d<f32>;
@group(0) @binding(3) var<storage, read> lights: array<PointLight>;
@group(0) @binding(4) var<uniform> scene: Scene;
@group(0) @binding(5) var opaque_grid: texture_storage_2d<rg32uint, write>;
@group(0) @binding(6) var<storage, read_write> opaque_indices: array<u32>;
@group(0) @binding(7) var<storage, read_write> opaque_counter: atomic<u32>;
@group(0) @binding(8) var transparent_grid: texture_storage_2d<rg32uint, write>;
@group(0) @binding(9) var<storage, read_write> transparent_indices: array<u32>;
@group(0) @binding(10) var<storage, read_write> transparent_counter: atomic<u32>;

var<workgroup> min_depth_bits: atomic<u32>;
var<workgroup> max_depth_bits: atomic<u32>;
var<workgroup> tile_frustum: Frustum;
var<workgroup> opaque_count: atomic<u32>;
var<workgroup> transparent_count: atomic<u32>;
var<workgroup> opaque_offset: u32;
var<workgroup> transparent_offset: u32;
var<workgroup> opaque_list: array<u32, MAX_LIGHTS_PER_TILE>;
var<workgroup> transparent_list: array<u32, MAX_LIGHTS_PER_TILE>;

fn sphere_outside(plane: Plane, center: vec3<f32>, radius: f32) -> bool {
    return dot(plane.normal, center) - plane.distance < -radius;
}

fn sphere_in_tile(center: vec3<f32>, radius: f32, near: f32, far: f32) -> bool {
    let depth = -center.z;
    if (depth + radius < near || depth - radius > far) {
        return false;
    }
    for (var i = 0u; i < 4u; i = i + 1u) {
        if (sphere_outside(tile_frustum.planes[i], center, radius)) {
            return false;
        }
    }
    return true;
}

@compute @workgroup_size(8, 8, 1)
fn cull_lights(
    @builtin(workgroup_id) group: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
    @builtin(local_invocation_index) thread: u32,
) {
    let tile = group.xy;
    let tile_index = tile.y * globals.grid_size.x + tile.x;
    let screen = vec2<u32>(globals.screen_size);
    let origin = tile * TILE_SIZE;
    let extent = min(vec2<u32>(TILE_SIZE), screen - min(origin, screen));
    let pixel = local_id.xy;
    // Lanes past the screen edge only take part in barriers.
    let active = pixel.x < extent.x && pixel.y < extent.y;
    let stride = extent.x * extent.y;
    let lane = pixel.y * extent.x + pixel.x;

    if (thread == 0u) {
        atomicStore(&min_depth_bits, 0xffffffffu);
        atomicStore(&max_depth_bits, 0u);
        atomicStore(&opaque_count, 0u);
        atomicStore(&transparent_count, 0u);
        tile_frustum = frustums[tile_index];
    }
    workgroupBarrier();

    if (active) {
        let depth = textureLoad(depth_texture, vec2<i32>(origin + pixel), 0).r;
        let bits = bitcast<u32>(depth);
        atomicMin(&min_depth_bits, bits);
        atomicMax(&max_depth_bits, bits);
    }
    workgroupBarrier();

    let a = depth_to_forward(bitcast<f32>(atomicLoad(&min_depth_bits)), globals.inverse_projection);
    let b = depth_to_forward(bitcast<f32>(atomicLoad(&max_depth_bits)), globals.inverse_projection);
    let near_surface = min(a, b);
    let far_surface = max(a, b);
    let near_clip = min(
        depth_to_forward(0.0, globals.inverse_projection),
        depth_to_forward(1.0, globals.inverse_projection),
    );
    let near_split = Plane(vec3<f32>(0.0, 0.0, -1.0), near_surface);

    if (active) {
        for (var i = lane; i < scene.light_count; i = i + stride) {
            let light = lights[i];
            if (!sphere_in_tile(light.position, light.radius, near_clip, far_surface)) {
                continue;
            }
            let t = atomicAdd(&transparent_count, 1u);
            if (t < MAX_LIGHTS_PER_TILE) {
                transparent_list[t] = i;
            }
            if (!sphere_outside(near_split, light.position, light.radius)) {
                let o = atomicAdd(&opaque_count, 1u);
                if (o < MAX_LIGHTS_PER_TILE) {
                    opaque_list[o] = i;
                }
            }
        }
    }
    workgroupBarrier();

    if (thread == 0u) {
        let oc = min(atomicLoad(&opaque_count), MAX_LIGHTS_PER_TILE);
        let tc = min(atomicLoad(&transparent_count), MAX_LIGHTS_PER_TILE);
        opaque_offset = 0u;
        transparent_offset = 0u;
        if (oc > 0u) {
            opaque_offset = atomicAdd(&opaque_counter, oc);
        }
        if (tc > 0u) {
            transparent_offset = atomicAdd(&transparent_counter, tc);
        }
        textureStore(opaque_grid, vec2<i32>(tile), vec4<u32>(opaque_offset, oc, 0u, 0u));
        textureStore(transparent_grid, vec2<i32>(tile), vec4<u32>(transparent_offset, tc, 0u, 0u));
    }
    workgroupBarrier();

    if (active) {
        let oc = min(atomicLoad(&opaque_count), MAX_LIGHTS_PER_TILE);
        let tc = min(atomicLoad(&transparent_count), MAX_LIGHTS_PER_TILE);
        for (var i = lane; i < oc; i = i + stride) {
            let slot = opaque_offset + i;
            if (slot < arrayLength(&opaque_indices)) {
                opaque_indices[slot] = opaque_list[i];
            }
        }
        for (var i = lane; i < tc; i = i + stride) {
            let slot = transparent_offset + i;
            if (slot < arrayLength(&transparent_indices)) {
                transparent_indices[slot] = transparent_list[i];
            }
        }
    }
}
"#;

/// Full source of one pass, prefixed with the shared declarations.
pub fn module_source(body: &str) -> String {
    format!("{COMMON_WGSL}\n{body}")
}
