//! Lit pipeline for `Material::Phong`: ambient light, one point light with
//! Blinn-Phong specular, derivative-based bump mapping and a PCF-filtered
//! shadow map.

use crate::pipeline::{MESH_COMMON_WGSL, MeshPipeline, SceneLayouts};

pub const PHONG_FRAGMENT_WGSL: &str = r#"
@group(3) @binding(0) var shadow_map: texture_depth_2d;
@group(3) @binding(1) var shadow_sampler: sampler_comparison;

const SPECULAR_COLOR: vec3<f32> = vec3<f32>(0.0056, 0.0056, 0.0056);

// Height derivatives in screen space from the bump map.
fn bump_derivatives(uv: vec2<f32>, scale: f32) -> vec2<f32> {
    let duv_dx = dpdx(uv);
    let duv_dy = dpdy(uv);
    let h = scale * textureSample(bump_texture, material_sampler, uv).x;
    let hx = scale * textureSample(bump_texture, material_sampler, uv + duv_dx).x;
    let hy = scale * textureSample(bump_texture, material_sampler, uv + duv_dy).x;
    return vec2<f32>(hx - h, hy - h);
}

fn perturb_normal(surf_pos: vec3<f32>, surf_norm: vec3<f32>, dh: vec2<f32>) -> vec3<f32> {
    let sigma_x = dpdx(surf_pos);
    let sigma_y = dpdy(surf_pos);
    let r1 = cross(sigma_y, surf_norm);
    let r2 = cross(surf_norm, sigma_x);
    let det = dot(sigma_x, r1);
    let grad = sign(det) * (dh.x * r1 + dh.y * r2);
    let perturbed = abs(det) * surf_norm - grad;
    if dot(perturbed, perturbed) < 1e-12 {
        return surf_norm;
    }
    return normalize(perturbed);
}

fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    let light_clip = frame.light_view_proj * vec4<f32>(world_pos, 1.0);
    let coord = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(coord.x * 0.5 + 0.5, -coord.y * 0.5 + 0.5);
    if light_clip.w <= 0.0 || uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
        return 1.0;
    }

    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var lit = 0.0;
    for (var x = -1; x <= 1; x++) {
        for (var y = -1; y <= 1; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, coord.z);
        }
    }
    return lit / 9.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(map_texture, material_sampler, in.uv);
    let diffuse_color = object.color.rgb * texel.rgb;
    let alpha = object.color.a * texel.a;

    let bump_scale = object.params.x;
    let shininess = object.params.y;
    let dh = bump_derivatives(in.uv, bump_scale);
    let normal = perturb_normal(in.world_position, normalize(in.normal), dh);

    let to_light = normalize(frame.light_pos.xyz - in.world_position);
    let to_eye = normalize(frame.camera_pos.xyz - in.world_position);
    let halfway = normalize(to_light + to_eye);

    let n_dot_l = max(dot(normal, to_light), 0.0);
    let n_dot_h = max(dot(normal, halfway), 0.0);
    let specular = SPECULAR_COLOR * (0.5 * shininess + 1.0) * pow(n_dot_h, shininess) * n_dot_l;

    var shadow = 1.0;
    if frame.light_color.w > 0.5 && object.params.z > 0.5 {
        shadow = shadow_factor(in.world_position);
    }

    let direct = frame.light_color.rgb * (diffuse_color * n_dot_l + specular) * shadow;
    let ambient = frame.ambient.rgb * diffuse_color;
    return vec4<f32>(ambient + direct, alpha);
}
"#;

pub fn phong_pipeline(device: &wgpu::Device, layouts: &SceneLayouts) -> MeshPipeline {
    MeshPipeline::new(
        device,
        "phong-pipeline",
        format!("{MESH_COMMON_WGSL}{PHONG_FRAGMENT_WGSL}"),
        &[
            &layouts.frame,
            &layouts.object,
            &layouts.material,
            &layouts.shadow,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_samples_shadow_map() {
        let source = format!("{MESH_COMMON_WGSL}{PHONG_FRAGMENT_WGSL}");
        assert!(source.contains("textureSampleCompareLevel"));
        assert!(source.contains("@group(3) @binding(0)"));
    }

    #[test]
    fn test_pipeline_builds_on_device() {
        let Some((device, _queue)) = crate::test_util::create_test_device() else {
            return;
        };
        let layouts = SceneLayouts::new(&device);
        let mut pipeline = phong_pipeline(&device, &layouts);
        let key = crate::pipeline::PipelineKey {
            side: orrery_scene::Side::Front,
            transparent: true,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
        };
        pipeline.prepare(&device, key);
        assert!(pipeline.get(&key).is_some());
    }
}
