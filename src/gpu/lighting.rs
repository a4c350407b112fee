//! Deferred lighting composite.
//!
//! A fullscreen quad samples the G-buffer and the blurred occlusion map
//! and shades every covered texel with a spot key light plus a point fill
//! light, Blinn-Phong style. Everything happens in view space; light
//! positions and directions are transformed on the CPU each frame so the
//! shader never needs the view matrix. Uncovered texels stay transparent,
//! letting the skybox drawn beneath show through.

use bytemuck::Zeroable;
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::lights::{PointLight, SpotLight};

use super::ssao::SsaoPipeline;
use super::quad_vertex_layout;

/// Width of the soft edge outside the spot cone, in degrees.
const SPOT_EDGE_DEGREES: f32 = 5.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightUniforms {
    /// View-space key light position.
    key_position: [f32; 4],
    /// View-space key light direction; w is the cosine of the inner cone.
    key_direction: [f32; 4],
    key_ambient: [f32; 4],
    key_diffuse: [f32; 4],
    /// Key specular colour; w is the cosine of the outer cone.
    key_specular: [f32; 4],
    fill_position: [f32; 4],
    fill_ambient: [f32; 4],
    fill_diffuse: [f32; 4],
    fill_specular: [f32; 4],
    mode: u32,
    _padding: [u32; 3],
}

const LIGHTING_SHADER: &str = r#"
struct LightUniforms {
    key_position: vec4<f32>,
    key_direction: vec4<f32>,
    key_ambient: vec4<f32>,
    key_diffuse: vec4<f32>,
    key_specular: vec4<f32>,
    fill_position: vec4<f32>,
    fill_ambient: vec4<f32>,
    fill_diffuse: vec4<f32>,
    fill_specular: vec4<f32>,
    mode: u32,
}

@group(0) @binding(0) var<uniform> lights: LightUniforms;
@group(0) @binding(1) var t_position: texture_2d<f32>;
@group(0) @binding(2) var t_normal: texture_2d<f32>;
@group(0) @binding(3) var t_occlusion: texture_2d<f32>;
@group(0) @binding(4) var s_clamp: sampler;

const MATERIAL_DIFFUSE: vec3<f32> = vec3<f32>(0.85, 0.85, 0.9);
const SHININESS: f32 = 32.0;
const ATTENUATION_LINEAR: f32 = 0.09;
const ATTENUATION_QUADRATIC: f32 = 0.032;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.clip = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    return out;
}

fn blinn_phong(
    frag_pos: vec3<f32>,
    normal: vec3<f32>,
    light_pos: vec3<f32>,
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
    ao: f32,
) -> vec3<f32> {
    let to_light = light_pos - frag_pos;
    let distance = length(to_light);
    let light_dir = to_light / max(distance, 1e-5);
    let view_dir = normalize(-frag_pos);
    let halfway = normalize(light_dir + view_dir);

    let diff = max(dot(normal, light_dir), 0.0);
    let spec = pow(max(dot(normal, halfway), 0.0), SHININESS);
    let attenuation = 1.0
        / (1.0 + ATTENUATION_LINEAR * distance + ATTENUATION_QUADRATIC * distance * distance);

    let colour = ambient * MATERIAL_DIFFUSE * ao
        + diffuse * diff * MATERIAL_DIFFUSE
        + specular * spec;
    return colour * attenuation;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let data = textureSample(t_position, s_clamp, in.uv);
    let normal = normalize(textureSample(t_normal, s_clamp, in.uv).xyz);
    let ao = textureSample(t_occlusion, s_clamp, in.uv).r;

    if (data.w < 0.5) {
        // Occlusion view paints its own background; otherwise the skybox
        // beneath shows through.
        if (lights.mode == 2u) {
            return vec4<f32>(0.25, 0.25, 0.25, 1.0);
        }
        return vec4<f32>(0.0, 0.0, 0.0, 0.0);
    }

    if (lights.mode == 2u) {
        return vec4<f32>(ao, ao, ao, 1.0);
    }

    let frag_pos = data.xyz;

    if (lights.mode == 1u) {
        // Translucent silhouette: strongest at grazing angles.
        let view_dir = normalize(-frag_pos);
        let rim = 1.0 - abs(dot(normal, view_dir));
        let alpha = clamp(0.15 + rim * rim, 0.0, 1.0);
        return vec4<f32>(lights.key_diffuse.rgb * (0.4 + 0.6 * rim), alpha);
    }

    var colour = blinn_phong(
        frag_pos,
        normal,
        lights.key_position.xyz,
        lights.key_ambient.rgb,
        lights.key_diffuse.rgb,
        lights.key_specular.rgb,
        ao,
    );

    // Spot cone: full inside the inner angle, fading to nothing outside.
    let to_frag = normalize(frag_pos - lights.key_position.xyz);
    let theta = dot(to_frag, normalize(lights.key_direction.xyz));
    let cos_inner = lights.key_direction.w;
    let cos_outer = lights.key_specular.w;
    let cone = clamp((theta - cos_outer) / max(cos_inner - cos_outer, 1e-5), 0.0, 1.0);
    colour = colour * cone + lights.key_ambient.rgb * MATERIAL_DIFFUSE * ao * (1.0 - cone);

    colour += blinn_phong(
        frag_pos,
        normal,
        lights.fill_position.xyz,
        lights.fill_ambient.rgb,
        lights.fill_diffuse.rgb,
        lights.fill_specular.rgb,
        ao,
    );

    return vec4<f32>(colour, 1.0);
}
"#;

pub(crate) struct LightingPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl LightingPass {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        targets: &SsaoPipeline,
    ) -> Self {
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Uniform Buffer"),
            contents: bytemuck::cast_slice(&[LightUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Lighting Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = create_bind_group(device, &layout, &light_buffer, &sampler, targets);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lighting Shader"),
            source: wgpu::ShaderSource::Wgsl(LIGHTING_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lighting Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lighting Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[quad_vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            layout,
            bind_group,
            light_buffer,
            sampler,
        }
    }

    /// Rebuild the bind group after the G-buffer targets were reallocated.
    pub(crate) fn rebind(&mut self, device: &wgpu::Device, targets: &SsaoPipeline) {
        self.bind_group =
            create_bind_group(device, &self.layout, &self.light_buffer, &self.sampler, targets);
    }

    /// Transform both lights into view space and upload the uniforms.
    pub(crate) fn update_lights(
        &self,
        queue: &wgpu::Queue,
        view: &Mat4,
        key: &SpotLight,
        fill: &PointLight,
        mode: u32,
    ) {
        let key_pos = view.transform_point3(key.position);
        // The key light always aims at the origin.
        let key_dir = view
            .transform_vector3((Vec3::ZERO - key.position).normalize_or_zero());
        let half_angle = (key.cone_angle() / 2.0).to_radians();
        let cos_inner = half_angle.cos();
        let cos_outer = (half_angle + SPOT_EDGE_DEGREES.to_radians()).cos();
        let fill_pos = view.transform_point3(fill.position);

        let vec4 = |v: Vec3, w: f32| [v.x, v.y, v.z, w];
        let uniforms = LightUniforms {
            key_position: vec4(key_pos, 1.0),
            key_direction: vec4(key_dir, cos_inner),
            key_ambient: vec4(key.colours.ambient, 0.0),
            key_diffuse: vec4(key.colours.diffuse, 0.0),
            key_specular: vec4(key.colours.specular, cos_outer),
            fill_position: vec4(fill_pos, 1.0),
            fill_ambient: vec4(fill.colours.ambient, 0.0),
            fill_diffuse: vec4(fill.colours.diffuse, 0.0),
            fill_specular: vec4(fill.colours.specular, 0.0),
            mode,
            _padding: [0; 3],
        };
        queue.write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>, quad: &wgpu::Buffer) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.draw(0..6, 0..1);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    targets: &SsaoPipeline,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Lighting Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(targets.position_view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(targets.normal_view()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(targets.blurred_view()),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
