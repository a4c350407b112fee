//! GPU rendering: deferred geometry, SSAO, lighting composite, skybox and
//! link lines.
//!
//! The [`RenderContext`] owns the surface, device and every pass. A frame
//! flows through fixed stages: the geometry pass rasterizes instanced
//! spheres into a view-space G-buffer, the SSAO pass turns that into an
//! occlusion map which a blur pass smooths, and the final surface passes
//! composite skybox, lit particles and link lines. Simulation state stays
//! on the CPU; every frame re-uploads a packaged snapshot.

mod geometry;
mod lighting;
mod links;
mod skybox;
mod ssao;

use std::sync::Arc;
use std::time::Instant;

use glam::Mat4;
use winit::window::Window;

use crate::camera::ArcBallCamera;
use crate::config::ViewerConfig;
use crate::error::{GpuError, ViewerError};
use crate::lights::{PointLight, SpotLight};
use crate::system::ParticleSystem;

use geometry::GeometryPass;
use lighting::LightingPass;
use links::LinkPass;
use skybox::SkyBox;
use ssao::SsaoPipeline;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of the view-space position and normal targets.
pub(crate) const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Format of the raw and blurred occlusion targets.
pub(crate) const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

const FOV_Y: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// How the lighting composite shades particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingMode {
    /// Full ambient/diffuse/specular shading with occlusion.
    Ads,
    /// Translucent silhouette shading.
    XRay,
    /// Raw occlusion term, for inspecting the SSAO output.
    AoOnly,
}

impl ShadingMode {
    fn as_u32(self) -> u32 {
        match self {
            ShadingMode::Ads => 0,
            ShadingMode::XRay => 1,
            ShadingMode::AoOnly => 2,
        }
    }
}

/// Per-frame camera and timing uniforms shared by every pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    time: f32,
    delta_time: f32,
    _padding: [f32; 2],
}

/// Fullscreen quad vertex: clip-space position plus texture coordinate.
/// Texture v runs downwards, so clip y = -1 maps to v = 1.
const QUAD_VERTICES: [[f32; 4]; 6] = [
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0, 0.0],
];

fn quad_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Everything the renderer needs from the application for one frame.
pub struct Scene<'a> {
    pub system: &'a mut ParticleSystem,
    pub camera: &'a ArcBallCamera,
    pub key_light: &'a SpotLight,
    pub fill_light: &'a PointLight,
    pub mode: ShadingMode,
    pub draw_links: bool,
}

/// Owner of the GPU device and all render passes.
pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    frame_uniform_buffer: wgpu::Buffer,
    quad_buffer: wgpu::Buffer,
    geometry: GeometryPass,
    ssao: SsaoPipeline,
    lighting: LightingPass,
    skybox: SkyBox,
    links: LinkPass,
    start_time: Instant,
    last_frame_time: Instant,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self, ViewerError> {
        use wgpu::util::DeviceExt;

        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(GpuError::SurfaceCreation)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(GpuError::DeviceCreation)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let frame_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[FrameUniforms {
                view: Mat4::IDENTITY.to_cols_array_2d(),
                proj: Mat4::IDENTITY.to_cols_array_2d(),
                time: 0.0,
                delta_time: 0.0,
                _padding: [0.0; 2],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let geometry = GeometryPass::new(&device, &frame_uniform_buffer);
        let ssao = SsaoPipeline::new(
            &device,
            &queue,
            &frame_uniform_buffer,
            config.width,
            config.height,
            viewer.ssao_radius,
            viewer.ssao_bias,
        )?;
        let lighting = LightingPass::new(&device, config.format, &ssao);
        let mut skybox = SkyBox::new(&device, &frame_uniform_buffer, config.format);
        skybox.prepare(&device, &queue, viewer.skybox_dir.as_deref());
        let links = LinkPass::new(&device, &frame_uniform_buffer, config.format);

        let now = Instant::now();

        Ok(Self {
            surface,
            device,
            queue,
            config,
            frame_uniform_buffer,
            quad_buffer,
            geometry,
            ssao,
            lighting,
            skybox,
            links,
            start_time: now,
            last_frame_time: now,
        })
    }

    /// Reconfigure the surface and every screen-sized target. Safe to call
    /// repeatedly with the same size.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        if let Err(e) = self.ssao.recreate(
            &self.device,
            &self.queue,
            self.config.width,
            self.config.height,
        ) {
            log::error!("Failed to recreate render targets: {}", e);
            return;
        }
        self.lighting.rebind(&self.device, &self.ssao);
    }

    fn update_frame_uniforms(&mut self, camera: &ArcBallCamera) {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        let aspect = self.config.width as f32 / self.config.height as f32;
        let view = camera.view_matrix();
        let proj = Mat4::perspective_rh(FOV_Y.to_radians(), aspect, Z_NEAR, Z_FAR);

        let uniforms = FrameUniforms {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            time: self.start_time.elapsed().as_secs_f32(),
            delta_time,
            _padding: [0.0; 2],
        };
        self.queue.write_buffer(
            &self.frame_uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms]),
        );
    }

    /// Draw one frame.
    ///
    /// A lost or outdated surface reconfigures and skips the frame; only
    /// running out of device memory is reported as an error.
    pub fn render(&mut self, scene: Scene<'_>) -> Result<(), ViewerError> {
        self.update_frame_uniforms(scene.camera);

        let packaged = scene
            .system
            .package_data_for_drawing(&scene.camera.view_info())?;
        self.geometry
            .upload_instances(&self.device, &self.queue, &packaged);

        let link_pairs = if scene.draw_links {
            scene.system.links_for_draw()
        } else {
            Vec::new()
        };
        self.links
            .upload_indices(&self.device, &self.queue, &link_pairs);

        self.lighting.update_lights(
            &self.queue,
            &scene.camera.view_matrix(),
            scene.key_light,
            scene.fill_light,
            scene.mode.as_u32(),
        );

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring and skipping frame");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => {
                return Err(ViewerError::ResourceAllocation(format!(
                    "surface acquire failed: {}",
                    e
                )));
            }
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.geometry.draw(&mut encoder, &self.ssao);
        self.ssao.draw(&mut encoder, &self.quad_buffer);

        // Composite pass: skybox behind, lit particles blended on top.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.06,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if scene.mode != ShadingMode::AoOnly {
                self.skybox.draw(&mut pass);
            }
            self.lighting.draw(&mut pass, &self.quad_buffer);
        }

        if !link_pairs.is_empty() {
            self.links.draw(
                &mut encoder,
                &surface_view,
                self.ssao.depth_view(),
                self.geometry.instance_buffer(),
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
