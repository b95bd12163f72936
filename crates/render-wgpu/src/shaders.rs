/// WGSL shader for the fullscreen blit: a textured quad sampling the
/// painted RGBA8 texture. The quad's texture coordinates are flipped in Y
/// so row 0 of the painted texture lands at the top of the render target.
pub const BLIT_SHADER: &str = r#"
@group(0) @binding(0)
var painted: texture_2d<f32>;

@group(0) @binding(1)
var painted_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_blit(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(vertex.position, 0.0, 1.0);
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_blit(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(painted, painted_sampler, in.uv);
}
"#;
