//! Unlit pipeline: colour times map, no lighting or shadows.
//!
//! Every object in the glow pass and every `Material::Basic` object in the
//! base pass is drawn with it.

use crate::pipeline::{MESH_COMMON_WGSL, MeshPipeline, SceneLayouts};

pub const BASIC_FRAGMENT_WGSL: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(map_texture, material_sampler, in.uv);
    return vec4<f32>(object.color.rgb * texel.rgb, object.color.a * texel.a);
}
"#;

pub fn basic_pipeline(device: &wgpu::Device, layouts: &SceneLayouts) -> MeshPipeline {
    MeshPipeline::new(
        device,
        "basic-pipeline",
        format!("{MESH_COMMON_WGSL}{BASIC_FRAGMENT_WGSL}"),
        &[&layouts.frame, &layouts.object, &layouts.material],
    )
}
