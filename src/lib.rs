//! # Cellula
//!
//! A real-time viewer for growing particle structures: linked particles
//! that split and knit themselves into organic surfaces, lattice
//! cellular automata whose cells live and die by neighbour-count rules,
//! and growth particles that branch towards the light like plants.
//!
//! The simulation is plain CPU-side Rust; the renderer is a deferred
//! wgpu pipeline with screen-space ambient occlusion, a spot/point light
//! pair and a cubemap skybox. Every frame the particle system packages a
//! flat position/size snapshot which the GPU draws as instanced spheres.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cellula::{ViewerConfig, run};
//!
//! fn main() -> Result<(), cellula::ViewerError> {
//!     env_logger::init();
//!     let config = ViewerConfig::from_args(std::env::args().skip(1))?;
//!     run(config)
//! }
//! ```
//!
//! ## Core Concepts
//!
//! - [`ParticleSystem`] owns the particles of one [`ParticleKind`] and
//!   advances them each tick: automata evaluate their rule two-phased,
//!   linked particles accumulate cohesion and repulsion forces, growth
//!   particles bud new branches when split.
//! - `package_data_for_drawing` turns the system into a flat `[x, y, z,
//!   size]` buffer, plane-sorted back-to-front for transparency.
//! - [`ArcBallCamera`] orbits the cluster; [`SpotLight`] and
//!   [`PointLight`] can follow the mouse the same way.

pub mod automata;
pub mod camera;
pub mod config;
mod error;
pub mod gpu;
pub mod growth;
pub mod input;
pub mod lights;
pub mod linked;
pub mod particle;
pub mod system;
mod window;

pub use automata::AutomataRules;
pub use camera::{ArcBallCamera, CameraMovement};
pub use config::ViewerConfig;
pub use error::{GpuError, ViewerError};
pub use gpu::{RenderContext, Scene, ShadingMode};
pub use lights::{LightColours, PointLight, SpotLight};
pub use particle::{Particle, ParticleState};
pub use system::{ParticleKind, ParticleSystem, ViewInfo};
pub use window::{run, App};
