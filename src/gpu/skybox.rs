//! Cubemap skybox drawn behind the particles.
//!
//! Faces come from six images on disk when a directory is configured;
//! otherwise a small procedural gradient cubemap is generated. Preparation
//! happens once; repeated calls are no-ops.

use std::path::Path;

use wgpu::util::DeviceExt;

/// Edge length of the generated fallback faces.
const PROCEDURAL_FACE_SIZE: u32 = 64;

/// Face file stems in wgpu layer order: +x, -x, +y, -y, +z, -z.
const FACE_NAMES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

/// A unit cube as a triangle soup, viewed from the inside.
const CUBE_VERTICES: [[f32; 3]; 36] = [
    // -z
    [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0],
    [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0],
    // +z
    [-1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0],
    // -x
    [-1.0, 1.0, 1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0],
    [-1.0, -1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0],
    // +x
    [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0],
    // -y
    [-1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0],
    // +y
    [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0],
];

const SKYBOX_SHADER: &str = r#"
struct FrameUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    time: f32,
    delta_time: f32,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var t_sky: texture_cube<f32>;
@group(0) @binding(2) var s_sky: sampler;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VsOut {
    // Rotation only: the box stays centred on the camera.
    let rotated = frame.view * vec4<f32>(position, 0.0);
    var out: VsOut;
    out.clip = frame.proj * vec4<f32>(rotated.xyz, 1.0);
    out.direction = position;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(t_sky, s_sky, normalize(in.direction));
}
"#;

pub(crate) struct SkyBox {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    frame_uniforms: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

impl SkyBox {
    pub(crate) fn new(
        device: &wgpu::Device,
        frame_uniforms: &wgpu::Buffer,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Vertex Buffer"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(SKYBOX_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
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
        });

        Self {
            pipeline,
            layout,
            vertex_buffer,
            sampler,
            frame_uniforms: frame_uniforms.clone(),
            bind_group: None,
        }
    }

    /// Build the cubemap. Idempotent: once a bind group exists this does
    /// nothing. A directory that fails to load falls back to the
    /// procedural sky with a warning rather than aborting startup.
    pub(crate) fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        face_dir: Option<&Path>,
    ) {
        if self.bind_group.is_some() {
            return;
        }

        let (faces, size) = match face_dir {
            Some(dir) => match load_faces(dir) {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::warn!("Failed to load skybox from {:?}: {}; using procedural sky", dir, e);
                    procedural_faces()
                }
            },
            None => procedural_faces(),
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Skybox Cubemap"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in faces.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                face,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size * 4),
                    rows_per_image: Some(size),
                },
                wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Skybox Cubemap View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..CUBE_VERTICES.len() as u32, 0..1);
    }
}

/// Load six same-sized RGBA faces named right/left/top/bottom/front/back
/// with a png or jpg extension.
fn load_faces(dir: &Path) -> Result<(Vec<Vec<u8>>, u32), String> {
    let mut faces = Vec::with_capacity(6);
    let mut size = 0u32;
    for name in FACE_NAMES {
        let image = ["png", "jpg", "jpeg"]
            .iter()
            .find_map(|ext| image::open(dir.join(name).with_extension(ext)).ok())
            .ok_or_else(|| format!("no readable image for face '{}'", name))?;
        let rgba = image.to_rgba8();
        if rgba.width() != rgba.height() {
            return Err(format!("face '{}' is not square", name));
        }
        if size == 0 {
            size = rgba.width();
        } else if rgba.width() != size {
            return Err(format!("face '{}' does not match the first face's size", name));
        }
        faces.push(rgba.into_raw());
    }
    Ok((faces, size))
}

/// Direction through the centre of a cubemap texel, `s`/`t` in [-1, 1].
fn face_direction(face: usize, s: f32, t: f32) -> glam::Vec3 {
    match face {
        0 => glam::Vec3::new(1.0, -t, -s),
        1 => glam::Vec3::new(-1.0, -t, s),
        2 => glam::Vec3::new(s, 1.0, t),
        3 => glam::Vec3::new(s, -1.0, -t),
        4 => glam::Vec3::new(s, -t, 1.0),
        _ => glam::Vec3::new(-s, -t, -1.0),
    }
    .normalize()
}

/// Vertical gradient sky: warm horizon, cool zenith, dark ground.
fn procedural_faces() -> (Vec<Vec<u8>>, u32) {
    let size = PROCEDURAL_FACE_SIZE;
    let zenith = glam::Vec3::new(0.18, 0.24, 0.40);
    let horizon = glam::Vec3::new(0.62, 0.55, 0.48);
    let ground = glam::Vec3::new(0.10, 0.09, 0.09);

    let faces = (0..6)
        .map(|face| {
            let mut data = Vec::with_capacity((size * size * 4) as usize);
            for y in 0..size {
                for x in 0..size {
                    let s = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let t = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let dir = face_direction(face, s, t);
                    let colour = if dir.y >= 0.0 {
                        horizon.lerp(zenith, dir.y.sqrt())
                    } else {
                        horizon.lerp(ground, (-dir.y).sqrt())
                    };
                    data.push((colour.x * 255.0) as u8);
                    data.push((colour.y * 255.0) as u8);
                    data.push((colour.z * 255.0) as u8);
                    data.push(255);
                }
            }
            data
        })
        .collect();
    (faces, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_faces_are_square_rgba() {
        let (faces, size) = procedural_faces();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            assert_eq!(face.len(), (size * size * 4) as usize);
        }
    }

    #[test]
    fn face_directions_are_unit_and_cover_all_axes() {
        for face in 0..6 {
            let dir = face_direction(face, 0.0, 0.0);
            assert!((dir.length() - 1.0).abs() < 1e-6);
        }
        // Centres of the six faces point along the six axes.
        assert_eq!(face_direction(0, 0.0, 0.0), glam::Vec3::X);
        assert_eq!(face_direction(2, 0.0, 0.0), glam::Vec3::Y);
        assert_eq!(face_direction(5, 0.0, 0.0), glam::Vec3::NEG_Z);
    }
}
