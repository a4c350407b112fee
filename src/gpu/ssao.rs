//! Screen-space ambient occlusion.
//!
//! Owns every screen-sized target of the deferred pipeline: the G-buffer
//! the geometry pass writes (view-space position, normal, depth) and the
//! occlusion targets derived from it. Occlusion samples a hemisphere
//! kernel oriented along the surface normal, randomly rotated by a tiled
//! 4x4 noise texture; a box blur then washes out the rotation banding.

use rand::Rng;

use crate::error::ViewerError;

use super::{quad_vertex_layout, AO_FORMAT, DEPTH_FORMAT, GBUFFER_FORMAT};

pub(crate) const KERNEL_SIZE: usize = 64;
const NOISE_DIM: u32 = 4;

/// Hemisphere sample kernel: points inside the unit +z hemisphere, scaled
/// towards the origin so occlusion favours nearby geometry.
pub(crate) fn hemisphere_kernel(rng: &mut impl Rng) -> Vec<[f32; 4]> {
    (0..KERNEL_SIZE)
        .map(|i| {
            let sample = glam::Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..1.0),
            )
            .normalize_or_zero()
                * rng.gen_range(0.0f32..1.0);
            let t = i as f32 / KERNEL_SIZE as f32;
            let scale = 0.1 + 0.9 * t * t;
            let sample = sample * scale;
            [sample.x, sample.y, sample.z, 0.0]
        })
        .collect()
}

/// RGBA8 texels for the rotation noise texture: random xy tangent vectors
/// encoded into the 0..255 range.
pub(crate) fn noise_texels(rng: &mut impl Rng) -> Vec<u8> {
    let mut texels = Vec::with_capacity((NOISE_DIM * NOISE_DIM * 4) as usize);
    for _ in 0..NOISE_DIM * NOISE_DIM {
        let x: f32 = rng.gen_range(-1.0..1.0);
        let y: f32 = rng.gen_range(-1.0..1.0);
        texels.push(((x * 0.5 + 0.5) * 255.0) as u8);
        texels.push(((y * 0.5 + 0.5) * 255.0) as u8);
        texels.push(127);
        texels.push(255);
    }
    texels
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SsaoUniforms {
    kernel: [[f32; 4]; KERNEL_SIZE],
    radius: f32,
    bias: f32,
    noise_scale: [f32; 2],
}

const SSAO_SHADER: &str = r#"
struct FrameUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    time: f32,
    delta_time: f32,
}

struct SsaoParams {
    kernel: array<vec4<f32>, 64>,
    radius: f32,
    bias: f32,
    noise_scale: vec2<f32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var<uniform> params: SsaoParams;
@group(0) @binding(2) var t_position: texture_2d<f32>;
@group(0) @binding(3) var t_normal: texture_2d<f32>;
@group(0) @binding(4) var t_noise: texture_2d<f32>;
@group(0) @binding(5) var s_clamp: sampler;
@group(0) @binding(6) var s_tile: sampler;

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

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let data = textureSample(t_position, s_clamp, in.uv);
    let normal = normalize(textureSample(t_normal, s_clamp, in.uv).xyz);
    let noise = textureSample(t_noise, s_tile, in.uv * params.noise_scale).xyz;

    // Background texels stay unoccluded.
    if (data.w < 0.5) {
        return vec4<f32>(1.0, 0.0, 0.0, 1.0);
    }

    let frag_pos = data.xyz;
    let random = normalize(noise * 2.0 - 1.0);
    let tangent = normalize(random - normal * dot(random, normal));
    let bitangent = cross(normal, tangent);
    let tbn = mat3x3<f32>(tangent, bitangent, normal);

    var occlusion = 0.0;
    for (var i = 0; i < 64; i = i + 1) {
        let sample_pos = frag_pos + (tbn * params.kernel[i].xyz) * params.radius;

        var offset = frame.proj * vec4<f32>(sample_pos, 1.0);
        let ndc = offset.xyz / offset.w;
        let sample_uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);

        // Level 0 explicitly: implicit-gradient sampling is not allowed
        // after the data-dependent early out above.
        let sample_depth = textureSampleLevel(t_position, s_clamp, sample_uv, 0.0).z;
        let range_check = smoothstep(0.0, 1.0, params.radius / abs(frag_pos.z - sample_depth));
        occlusion += select(0.0, 1.0, sample_depth >= sample_pos.z + params.bias) * range_check;
    }

    let ao = 1.0 - occlusion / 64.0;
    return vec4<f32>(ao, 0.0, 0.0, 1.0);
}
"#;

const BLUR_SHADER: &str = r#"
@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_clamp: sampler;

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

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(t_input));
    var sum = 0.0;
    for (var x = -2; x < 2; x = x + 1) {
        for (var y = -2; y < 2; y = y + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            sum += textureSample(t_input, s_clamp, in.uv + offset).r;
        }
    }
    return vec4<f32>(sum / 16.0, 0.0, 0.0, 1.0);
}
"#;

/// Screen-sized render targets plus the occlusion and blur pipelines.
pub(crate) struct SsaoPipeline {
    position_view: wgpu::TextureView,
    normal_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    occlusion_view: wgpu::TextureView,
    blurred_view: wgpu::TextureView,
    noise_view: wgpu::TextureView,
    clamp_sampler: wgpu::Sampler,
    tile_sampler: wgpu::Sampler,
    frame_uniforms: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    ssao_layout: wgpu::BindGroupLayout,
    ssao_bind_group: wgpu::BindGroup,
    blur_layout: wgpu::BindGroupLayout,
    blur_bind_group: wgpu::BindGroup,
    ssao_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
}

impl SsaoPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame_uniforms: &wgpu::Buffer,
        width: u32,
        height: u32,
        radius: f32,
        bias: f32,
    ) -> Result<Self, ViewerError> {
        use wgpu::util::DeviceExt;

        let (position_view, normal_view, depth_view, occlusion_view, blurred_view) =
            create_targets(device, width, height)?;

        let mut rng = rand::thread_rng();
        let kernel = hemisphere_kernel(&mut rng);
        let mut kernel_array = [[0.0f32; 4]; KERNEL_SIZE];
        kernel_array.copy_from_slice(&kernel);

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("SSAO Params Buffer"),
            contents: bytemuck::cast_slice(&[SsaoUniforms {
                kernel: kernel_array,
                radius,
                bias,
                noise_scale: [
                    width as f32 / NOISE_DIM as f32,
                    height as f32 / NOISE_DIM as f32,
                ],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let noise_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SSAO Noise Texture"),
            size: wgpu::Extent3d {
                width: NOISE_DIM,
                height: NOISE_DIM,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &noise_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &noise_texels(&mut rng),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(NOISE_DIM * 4),
                rows_per_image: Some(NOISE_DIM),
            },
            wgpu::Extent3d {
                width: NOISE_DIM,
                height: NOISE_DIM,
                depth_or_array_layers: 1,
            },
        );
        let noise_view = noise_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let tile_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tile Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
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
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let uniform_entry = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let ssao_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                sampler_entry(5),
                sampler_entry(6),
            ],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Bind Group Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let ssao_bind_group = create_ssao_bind_group(
            device,
            &ssao_layout,
            frame_uniforms,
            &params_buffer,
            &position_view,
            &normal_view,
            &noise_view,
            &clamp_sampler,
            &tile_sampler,
        );
        let blur_bind_group =
            create_blur_bind_group(device, &blur_layout, &occlusion_view, &clamp_sampler);

        let ssao_pipeline = create_quad_pipeline(device, &ssao_layout, SSAO_SHADER, "SSAO");
        let blur_pipeline = create_quad_pipeline(device, &blur_layout, BLUR_SHADER, "Blur");

        Ok(Self {
            position_view,
            normal_view,
            depth_view,
            occlusion_view,
            blurred_view,
            noise_view,
            clamp_sampler,
            tile_sampler,
            frame_uniforms: frame_uniforms.clone(),
            params_buffer,
            ssao_layout,
            ssao_bind_group,
            blur_layout,
            blur_bind_group,
            ssao_pipeline,
            blur_pipeline,
        })
    }

    /// Reallocate all screen-sized targets for a new framebuffer size and
    /// rebuild the bind groups sampling them. Idempotent for a fixed size.
    pub(crate) fn recreate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<(), ViewerError> {
        let (position_view, normal_view, depth_view, occlusion_view, blurred_view) =
            create_targets(device, width, height)?;
        self.position_view = position_view;
        self.normal_view = normal_view;
        self.depth_view = depth_view;
        self.occlusion_view = occlusion_view;
        self.blurred_view = blurred_view;

        // The noise tiling factor tracks the framebuffer size.
        let noise_scale = [
            width as f32 / NOISE_DIM as f32,
            height as f32 / NOISE_DIM as f32,
        ];
        let offset = std::mem::size_of::<[[f32; 4]; KERNEL_SIZE]>() + 2 * std::mem::size_of::<f32>();
        queue.write_buffer(
            &self.params_buffer,
            offset as u64,
            bytemuck::cast_slice(&noise_scale),
        );

        self.ssao_bind_group = create_ssao_bind_group(
            device,
            &self.ssao_layout,
            &self.frame_uniforms,
            &self.params_buffer,
            &self.position_view,
            &self.normal_view,
            &self.noise_view,
            &self.clamp_sampler,
            &self.tile_sampler,
        );
        self.blur_bind_group = create_blur_bind_group(
            device,
            &self.blur_layout,
            &self.occlusion_view,
            &self.clamp_sampler,
        );
        Ok(())
    }

    pub(crate) fn position_view(&self) -> &wgpu::TextureView {
        &self.position_view
    }

    pub(crate) fn normal_view(&self) -> &wgpu::TextureView {
        &self.normal_view
    }

    pub(crate) fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// The blurred occlusion map sampled by the lighting pass.
    pub(crate) fn blurred_view(&self) -> &wgpu::TextureView {
        &self.blurred_view
    }

    /// Occlusion pass followed by the blur pass.
    pub(crate) fn draw(&self, encoder: &mut wgpu::CommandEncoder, quad: &wgpu::Buffer) {
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SSAO Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.occlusion_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.ssao_pipeline);
            pass.set_bind_group(0, &self.ssao_bind_group, &[]);
            pass.set_vertex_buffer(0, quad.slice(..));
            pass.draw(0..6, 0..1);
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blur Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.blurred_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.blur_pipeline);
            pass.set_bind_group(0, &self.blur_bind_group, &[]);
            pass.set_vertex_buffer(0, quad.slice(..));
            pass.draw(0..6, 0..1);
        }
    }
}

/// Allocate position, normal, depth, occlusion and blurred targets.
fn create_targets(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<
    (
        wgpu::TextureView,
        wgpu::TextureView,
        wgpu::TextureView,
        wgpu::TextureView,
        wgpu::TextureView,
    ),
    ViewerError,
> {
    if width == 0 || height == 0 {
        return Err(ViewerError::ResourceAllocation(format!(
            "render targets need a non-zero framebuffer, got {}x{}",
            width, height
        )));
    }

    let target = |label, format| {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    };

    Ok((
        target("Position Target", GBUFFER_FORMAT),
        target("Normal Target", GBUFFER_FORMAT),
        target("Depth Target", DEPTH_FORMAT),
        target("Occlusion Target", AO_FORMAT),
        target("Blurred Occlusion Target", AO_FORMAT),
    ))
}

#[allow(clippy::too_many_arguments)]
fn create_ssao_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    frame_uniforms: &wgpu::Buffer,
    params: &wgpu::Buffer,
    position: &wgpu::TextureView,
    normal: &wgpu::TextureView,
    noise: &wgpu::TextureView,
    clamp_sampler: &wgpu::Sampler,
    tile_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("SSAO Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(position),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(normal),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(noise),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(clamp_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: wgpu::BindingResource::Sampler(tile_sampler),
            },
        ],
    })
}

fn create_blur_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    occlusion: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Blur Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(occlusion),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_quad_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shader_source: &str,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
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
                format: AO_FORMAT,
                blend: None,
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
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn kernel_samples_stay_in_the_hemisphere() {
        let mut rng = StdRng::seed_from_u64(5);
        let kernel = hemisphere_kernel(&mut rng);
        assert_eq!(kernel.len(), KERNEL_SIZE);
        for sample in kernel {
            let v = glam::Vec3::new(sample[0], sample[1], sample[2]);
            assert!(v.z >= 0.0, "sample below the surface: {:?}", v);
            assert!(v.length() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn kernel_samples_grow_with_index() {
        // The scale curve biases early samples towards the origin; the last
        // sample may reach the full radius while the first cannot.
        let mut rng = StdRng::seed_from_u64(5);
        let kernel = hemisphere_kernel(&mut rng);
        let first = glam::Vec3::from_slice(&kernel[0][..3]).length();
        assert!(first <= 0.1 + 1e-6);
    }

    #[test]
    fn noise_texture_is_four_by_four_rgba() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(noise_texels(&mut rng).len(), 64);
    }

    /// Headless device for target-allocation tests. Returns `None` on
    /// machines without any usable adapter, which skips the test.
    fn gpu_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok()?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Test Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .ok()
    }

    fn frame_uniform_buffer(device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test Frame Uniforms"),
            size: std::mem::size_of::<crate::gpu::FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    #[test]
    fn recreate_twice_at_one_size_is_safe() {
        let Some((device, queue)) = gpu_device() else {
            return;
        };
        let frame = frame_uniform_buffer(&device);
        let mut pipeline = SsaoPipeline::new(&device, &queue, &frame, 64, 64, 5.0, 0.025).unwrap();
        pipeline.recreate(&device, &queue, 64, 64).unwrap();
        pipeline.recreate(&device, &queue, 64, 64).unwrap();
        pipeline.recreate(&device, &queue, 32, 48).unwrap();
    }

    #[test]
    fn zero_sized_targets_are_rejected() {
        let Some((device, queue)) = gpu_device() else {
            return;
        };
        let frame = frame_uniform_buffer(&device);
        assert!(matches!(
            SsaoPipeline::new(&device, &queue, &frame, 0, 64, 5.0, 0.025),
            Err(ViewerError::ResourceAllocation(_))
        ));

        let mut pipeline = SsaoPipeline::new(&device, &queue, &frame, 64, 64, 5.0, 0.025).unwrap();
        assert!(matches!(
            pipeline.recreate(&device, &queue, 64, 0),
            Err(ViewerError::ResourceAllocation(_))
        ));
        // A rejected size leaves the pipeline usable.
        pipeline.recreate(&device, &queue, 64, 64).unwrap();
    }
}
