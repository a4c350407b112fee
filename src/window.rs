//! Window, event loop and per-frame orchestration.
//!
//! Raw events are folded into [`Input`]; once per redraw the accumulated
//! deltas are applied to the camera and lights, the simulation is stepped
//! and the frame is rendered. Controls:
//!
//! - left drag orbits the camera, scroll zooms, `W`/`S`/`A`/`D` nudge it
//! - right drag orbits the key light
//! - `Space` splits a particle, `B` bulges the cluster, `E` feeds it
//! - `L` toggles link lines, `1`/`2`/`3` pick the shading mode
//! - `F` toggles forces, `P` particle death, `N` nearest-to-light splits
//! - `G` toggles light-seeking growth branches
//! - `R` reseeds the system, `C` refocuses the camera, `Escape` quits

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::{MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use crate::camera::{ArcBallCamera, CameraMovement};
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::gpu::{RenderContext, Scene, ShadingMode};
use crate::input::Input;
use crate::lights::{PointLight, SpotLight};
use crate::system::ParticleSystem;

/// Automata generations advance on this period rather than every frame,
/// so the rule evolution stays watchable.
const AUTOMATA_STEP_SECONDS: f32 = 0.15;

/// Parse the config, open the window and run the viewer until exit.
pub fn run(config: ViewerConfig) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

pub struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<RenderContext>,
    system: ParticleSystem,
    camera: ArcBallCamera,
    key_light: SpotLight,
    fill_light: PointLight,
    input: Input,
    mode: ShadingMode,
    draw_links: bool,
    last_update: Instant,
    step_accumulator: f32,
}

impl App {
    pub fn new(config: ViewerConfig) -> Self {
        let mut system = ParticleSystem::seeded(config.kind);
        system.set_particle_size(config.particle_size);
        system.set_cohesion(config.cohesion);
        system.set_local_cohesion(config.local_cohesion);
        system.set_automata_radius(config.automata_radius);
        system.set_automata_lifetime(config.automata_lifetime);
        system.set_child_threshold(config.child_threshold);
        system.set_branch_length(config.branch_length);

        let key_light = SpotLight::new(Vec3::new(4.0, 4.0, 6.0));
        let fill_light = PointLight::new(Vec3::new(-6.0, -2.0, 3.0));
        system.set_light_pos(key_light.position);

        Self {
            config,
            window: None,
            gpu: None,
            system,
            camera: ArcBallCamera::new(),
            key_light,
            fill_light,
            input: Input::new(),
            mode: ShadingMode::Ads,
            draw_links: true,
            last_update: Instant::now(),
            step_accumulator: 0.0,
        }
    }

    /// Apply the frame's accumulated input and advance the simulation.
    fn update(&mut self, event_loop: &ActiveEventLoop, dt: f32) {
        let delta = self.input.cursor_delta();
        if self.input.button_held(MouseButton::Left) {
            self.camera.process_mouse_movement(delta.x, delta.y);
        }
        self.key_light.follow_mouse = self.input.button_held(MouseButton::Right);
        self.key_light.process_mouse_movement(delta.x, delta.y);
        self.camera.process_mouse_scroll(self.input.scroll_delta());

        for (key, movement) in [
            (KeyCode::KeyW, CameraMovement::Forward),
            (KeyCode::KeyS, CameraMovement::Backward),
            (KeyCode::KeyA, CameraMovement::Left),
            (KeyCode::KeyD, CameraMovement::Right),
        ] {
            if self.input.key_held(key) {
                self.camera.process_keyboard(movement, dt);
            }
        }

        if self.input.key_pressed(KeyCode::Escape) {
            event_loop.exit();
        }
        if self.input.key_pressed(KeyCode::Space) && !self.system.split_random_particle() {
            log::info!("No particle can split");
        }
        if self.input.key_pressed(KeyCode::KeyB) {
            self.system.bulge();
        }
        if self.input.key_pressed(KeyCode::KeyE) {
            self.system.add_food();
        }
        if self.input.key_pressed(KeyCode::KeyL) {
            self.draw_links = !self.draw_links;
        }
        if self.input.key_pressed(KeyCode::Digit1) {
            self.mode = ShadingMode::Ads;
        }
        if self.input.key_pressed(KeyCode::Digit2) {
            self.mode = ShadingMode::XRay;
        }
        if self.input.key_pressed(KeyCode::Digit3) {
            self.mode = ShadingMode::AoOnly;
        }
        if self.input.key_pressed(KeyCode::KeyF) {
            let forces = !self.system.params().forces;
            self.system.toggle_forces(forces);
        }
        if self.input.key_pressed(KeyCode::KeyP) {
            let death = !self.system.params().particle_death;
            self.system.toggle_particle_death(death);
        }
        if self.input.key_pressed(KeyCode::KeyN) {
            let nearest = !self.system.params().nearest_particle;
            self.system.set_nearest_particle(nearest);
        }
        if self.input.key_pressed(KeyCode::KeyG) {
            let lightwards = !self.system.params().grow_to_light;
            self.system.set_grow_to_light(lightwards);
        }
        if self.input.key_pressed(KeyCode::KeyR) {
            self.system.reset(self.config.kind);
            self.system.set_particle_size(self.config.particle_size);
            self.step_accumulator = 0.0;
            log::info!("System reseeded with {} particles", self.system.len());
        }
        if self.input.key_pressed(KeyCode::KeyC) {
            self.camera.refocus();
        }

        self.system.set_light_pos(self.key_light.position);
        self.camera.set_rotation_point(self.system.particle_centre());

        match self.system.kind() {
            crate::system::ParticleKind::Automata => {
                self.step_accumulator += dt;
                if self.step_accumulator >= AUTOMATA_STEP_SECONDS {
                    self.step_accumulator -= AUTOMATA_STEP_SECONDS;
                    self.system.step();
                }
            }
            _ => self.system.step(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("cellula")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width,
                self.config.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(RenderContext::new(window.clone(), &self.config)) {
            Ok(gpu) => {
                self.window = Some(window);
                self.gpu = Some(gpu);
                self.last_update = Instant::now();
            }
            Err(e) => {
                log::error!("Failed to initialize GPU: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(self.last_update).as_secs_f32();
                self.last_update = now;

                self.update(event_loop, dt);
                self.input.begin_frame();

                if let Some(gpu) = &mut self.gpu {
                    let scene = Scene {
                        system: &mut self.system,
                        camera: &self.camera,
                        key_light: &self.key_light,
                        fill_light: &self.fill_light,
                        mode: self.mode,
                        draw_links: self.draw_links,
                    };
                    if let Err(e) = gpu.render(scene) {
                        log::error!("Render failed: {}", e);
                        event_loop.exit();
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
