/// Frustum + distance culling kernel. One thread per source instance;
/// survivors are appended through an atomic counter.
pub const CULL_SHADER: &str = r#"
struct Instance {
    world: mat4x4<f32>,
    inverse_world: mat4x4<f32>,
    base_color: vec4<f32>,
    deform_impact: f32,
    hp_normalized: f32,
    death_progress: f32,
    highlight_pulse: f32,
};

struct CullUniforms {
    planes: array<vec4<f32>, 6>,
    camera_position: vec4<f32>,
    count: u32,
    bound_radius: f32,
    max_distance_sq: f32,
    _pad: u32,
};

@group(0) @binding(0) var<storage, read> source: array<Instance>;
@group(0) @binding(1) var<storage, read_write> survivors: array<Instance>;
@group(0) @binding(2) var<storage, read_write> counter: atomic<u32>;
@group(0) @binding(3) var<uniform> cull: CullUniforms;

@compute @workgroup_size(256, 1, 1)
fn cs_cull(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= cull.count) {
        return;
    }
    let inst = source[i];
    let center = inst.world[3].xyz;

    for (var p = 0u; p < 6u; p = p + 1u) {
        let plane = cull.planes[p];
        if (dot(plane.xyz, center) + plane.w < -cull.bound_radius) {
            return;
        }
    }

    let to_camera = center - cull.camera_position.xyz;
    if (dot(to_camera, to_camera) > cull.max_distance_sq) {
        return;
    }

    let slot = atomicAdd(&counter, 1u);
    survivors[slot] = inst;
}
"#;

/// Instanced jelly block shader. Reads the culled survivor array by
/// `instance_index`; the instance count comes from the indirect args.
pub const INSTANCE_SHADER: &str = r#"
struct Instance {
    world: mat4x4<f32>,
    inverse_world: mat4x4<f32>,
    base_color: vec4<f32>,
    deform_impact: f32,
    hp_normalized: f32,
    death_progress: f32,
    highlight_pulse: f32,
};

struct Camera {
    view_proj: mat4x4<f32>,
    // xyz = eye, w = seconds since start
    position_time: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: Camera;
@group(1) @binding(0) var<storage, read> instances: array<Instance>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) highlight: f32,
};

@vertex
fn vs_main(vertex: VertexInput, @builtin(instance_index) idx: u32) -> VertexOutput {
    let inst = instances[idx];
    let t = camera.position_time.w;

    // Squash on impact, wobbling as the impulse decays.
    let wobble = inst.deform_impact * sin(t * 30.0 + inst.world[3].x);
    let squash = vec3<f32>(1.0 + 0.25 * wobble, 1.0 - 0.3 * wobble, 1.0 + 0.25 * wobble);
    let shrink = 1.0 - inst.death_progress;
    let local = vertex.position * squash * shrink;

    let world_pos = inst.world * vec4<f32>(local, 1.0);
    // Row-vector product with the inverse is the inverse-transpose.
    let world_normal = (vec4<f32>(vertex.normal, 0.0) * inst.inverse_world).xyz;

    let damaged = mix(inst.base_color.rgb * 0.45, inst.base_color.rgb, inst.hp_normalized);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * world_pos;
    out.world_normal = normalize(world_normal);
    out.color = vec4<f32>(damaged, inst.base_color.a);
    out.highlight = inst.highlight_pulse * (0.5 + 0.5 * sin(t * 8.0));
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, -0.5));
    let ambient = 0.3;
    let diffuse = max(dot(in.world_normal, light_dir), 0.0);
    let lighting = ambient + diffuse * 0.7;
    let lit = in.color.rgb * lighting + vec3<f32>(in.highlight * 0.35);
    return vec4<f32>(lit, in.color.a);
}
"#;
