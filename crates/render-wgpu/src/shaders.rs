/// Lit forward pass: key and fill directional lights, ambient, emissive,
/// metalness/roughness, PCF-filtered shadow from the key light.
pub const LIT_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    ambient: vec4<f32>,
    key_dir: vec4<f32>,
    key_color: vec4<f32>,
    fill_dir: vec4<f32>,
    fill_color: vec4<f32>,
    // x: depth bias, y: 1 when shadows are enabled, z: shadow texel size
    shadow: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var shadow_map: texture_depth_2d;
@group(0) @binding(2) var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    // rgb: base color, a: metalness
    @location(6) color: vec4<f32>,
    // rgb: emissive, a: roughness
    @location(7) emissive: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) emissive: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = globals.view_proj * world_pos;
    out.world_pos = world_pos.xyz;
    out.world_normal = (model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.color = instance.color;
    out.emissive = instance.emissive;
    return out;
}

fn shadow_visibility(world_pos: vec3<f32>) -> f32 {
    let clip = globals.light_view_proj * vec4<f32>(world_pos, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    let depth = ndc.z + globals.shadow.x;
    let texel = globals.shadow.z;

    var lit = 0.0;
    for (var y = -1; y <= 1; y++) {
        for (var x = -1; x <= 1; x++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, depth);
        }
    }
    lit = lit / 9.0;

    let inside = all(uv >= vec2<f32>(0.0)) && all(uv <= vec2<f32>(1.0)) && depth <= 1.0;
    return select(1.0, lit, inside);
}

fn directional(n: vec3<f32>, v: vec3<f32>, l: vec3<f32>, radiance: vec3<f32>,
               diffuse: vec3<f32>, f0: vec3<f32>, roughness: f32) -> vec3<f32> {
    let ndl = max(dot(n, l), 0.0);
    let h = normalize(l + v);
    let ndh = max(dot(n, h), 0.0);
    let shininess = clamp(2.0 / (roughness * roughness * roughness * roughness) - 2.0, 1.0, 2048.0);
    let specular = f0 * pow(ndh, shininess) * (shininess + 8.0) / 25.1327;
    return radiance * ndl * (diffuse + specular);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let v = normalize(globals.camera_pos.xyz - in.world_pos);
    let base = in.color.rgb;
    let metalness = in.color.a;
    let roughness = clamp(in.emissive.a, 0.04, 1.0);

    let diffuse = base * (1.0 - metalness);
    let f0 = mix(vec3<f32>(0.04), base, metalness);

    let visibility = mix(1.0, shadow_visibility(in.world_pos), globals.shadow.y);

    var color = globals.ambient.rgb * base * (1.0 - 0.5 * metalness);
    color += visibility * directional(n, v, globals.key_dir.xyz, globals.key_color.rgb, diffuse, f0, roughness);
    color += directional(n, v, globals.fill_dir.xyz, globals.fill_color.rgb, diffuse, f0, roughness);
    color += in.emissive.rgb;
    return vec4<f32>(color, 1.0);
}
"#;

/// Depth-only pass from the key light.
pub const SHADOW_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
};

@vertex
fn vs_shadow(@location(0) position: vec3<f32>, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
    return globals.light_view_proj * model * vec4<f32>(position, 1.0);
}
"#;

/// Bloom: bright pass, separable gaussian blur and additive composite.
pub const BLOOM_SHADER: &str = r#"
struct Params {
    direction: vec2<f32>,
    texel_size: vec2<f32>,
    threshold: f32,
    strength: f32,
    radius: f32,
    _pad: f32,
};

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var linear_sampler: sampler;
@group(0) @binding(2) var<uniform> params: Params;
@group(0) @binding(3) var bloom: texture_2d<f32>;

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_bright(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(source, linear_sampler, in.uv, 0.0).rgb;
    let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    let contribution = max(luminance - params.threshold, 0.0) / max(luminance, 0.0001);
    return vec4<f32>(color * contribution, 1.0);
}

@fragment
fn fs_blur(in: FullscreenOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let step = params.direction * params.texel_size * (1.0 + params.radius * 3.0);
    var color = textureSampleLevel(source, linear_sampler, in.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i++) {
        let offset = step * f32(i);
        color += textureSampleLevel(source, linear_sampler, in.uv + offset, 0.0).rgb * weights[i];
        color += textureSampleLevel(source, linear_sampler, in.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_composite(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let scene = textureSampleLevel(source, linear_sampler, in.uv, 0.0).rgb;
    let glow = textureSampleLevel(bloom, linear_sampler, in.uv, 0.0).rgb;
    return vec4<f32>(min(scene + glow * params.strength, vec3<f32>(1.0)), 1.0);
}
"#;
