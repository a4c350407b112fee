//! The particle system: owns every particle, advances the simulation and
//! packages per-frame snapshots for GPU upload.
//!
//! The system is tagged with a [`ParticleKind`] at construction; the kind
//! decides what `step()` does (nothing, automaton rules, growth forces) and
//! whether packaging plane-sorts for transparency. GPU buffers never own
//! this data: `package_data_for_drawing` rebuilds a flat snapshot each
//! frame with a fixed stride.

use std::str::FromStr;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::automata::{AutomataRules, AutomataState};
use crate::error::ViewerError;
use crate::growth;
use crate::linked::{plane_side, sort_back_to_front, LinkedState};
use crate::particle::{Particle, ParticleState};

/// Floats per particle in the packaged draw buffer: x, y, z, size.
pub const PACKED_STRIDE: usize = 4;

/// Candidate bud positions tried before a growth split gives up on a
/// particle.
const GROWTH_BRANCH_ATTEMPTS: usize = 8;
/// Branch levels walked up before the collision test descends the tree.
const GROWTH_COLLISION_LEVELS: usize = 2;

/// Ticks a fed linked particle keeps being pulled inward.
const FOOD_TICKS: u32 = 10;

/// Icosahedron vertex constants, golden-ratio construction.
const ICO_X: f32 = 0.525_731_1;
const ICO_Z: f32 = 0.850_650_8;

/// Seed positions for the linked variant: a unit icosahedron.
pub const ICOSAHEDRON_VERTICES: [[f32; 3]; 12] = [
    [-ICO_X, 0.0, ICO_Z],
    [ICO_X, 0.0, ICO_Z],
    [-ICO_X, 0.0, -ICO_Z],
    [ICO_X, 0.0, -ICO_Z],
    [0.0, ICO_Z, ICO_X],
    [0.0, ICO_Z, -ICO_X],
    [0.0, -ICO_Z, ICO_X],
    [0.0, -ICO_Z, -ICO_X],
    [ICO_Z, ICO_X, 0.0],
    [-ICO_Z, ICO_X, 0.0],
    [ICO_Z, -ICO_X, 0.0],
    [-ICO_Z, -ICO_X, 0.0],
];

/// The 30 icosahedron edges linking the seed particles.
const ICOSAHEDRON_EDGES: [[u32; 2]; 30] = [
    [0, 1], [0, 4], [0, 6], [0, 9], [0, 11],
    [1, 4], [1, 6], [1, 8], [1, 10],
    [2, 3], [2, 5], [2, 7], [2, 9], [2, 11],
    [3, 5], [3, 7], [3, 8], [3, 10],
    [4, 5], [4, 8], [4, 9],
    [5, 8], [5, 9],
    [6, 7], [6, 10], [6, 11],
    [7, 10], [7, 11],
    [8, 10],
    [9, 11],
];

/// Which behaviour drives the particles of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// No automatic evolution.
    Plain,
    /// Cellular-automaton connectivity rules.
    Automata,
    /// Linked surface growth with cohesion forces and splitting.
    Linked,
    /// Plant-like branching: particles bud towards the light.
    Growth,
}

impl FromStr for ParticleKind {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(ParticleKind::Plain),
            "automata" => Ok(ParticleKind::Automata),
            "linked" => Ok(ParticleKind::Linked),
            "growth" => Ok(ParticleKind::Growth),
            other => Err(ViewerError::InvalidVariant(other.to_string())),
        }
    }
}

/// Camera information needed for plane sorting, captured once per frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewInfo {
    pub eye: Vec3,
    pub forward: Vec3,
}

impl Default for ViewInfo {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 10.0),
            forward: Vec3::NEG_Z,
        }
    }
}

/// Tunable simulation parameters, mirrored by the viewer config.
#[derive(Debug, Clone)]
pub struct SystemParams {
    /// Radius applied to newly created particles.
    pub particle_size: f32,
    /// Global cohesion factor in percent; higher means weaker pull.
    pub cohesion: i32,
    /// Cohesion towards linked neighbours, in percent.
    pub local_cohesion: i32,
    /// Master switch for force/rule evaluation in `step`.
    pub forces: bool,
    /// Freeze linked particles that have lived too long near their links.
    pub particle_death: bool,
    /// Lattice radius used when seeding the automata variant.
    pub automata_radius: i32,
    /// Split the particle nearest to the light instead of a random one.
    pub nearest_particle: bool,
    /// Maximum connections a growth particle may carry before it stops
    /// budding (parent branch included).
    pub child_threshold: u32,
    /// Branch length as a multiple of the particle size.
    pub branch_length: f32,
    /// Bias new growth branches towards the light instead of growing in a
    /// uniformly random direction.
    pub grow_to_light: bool,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            particle_size: 0.35,
            cohesion: 30,
            local_cohesion: 30,
            forces: true,
            particle_death: false,
            automata_radius: 4,
            nearest_particle: true,
            child_threshold: 3,
            branch_length: 3.0,
            grow_to_light: true,
        }
    }
}

/// Owner of all particles of one variant.
#[derive(Debug)]
pub struct ParticleSystem {
    kind: ParticleKind,
    particles: Vec<Particle>,
    rules: AutomataRules,
    params: SystemParams,
    light_pos: Vec3,
    average_distance: Vec3,
    rng: StdRng,
}

impl ParticleSystem {
    /// Empty system of the given variant.
    pub fn new(kind: ParticleKind) -> Self {
        Self {
            kind,
            particles: Vec::new(),
            rules: AutomataRules::life(),
            params: SystemParams::default(),
            light_pos: Vec3::ZERO,
            average_distance: Vec3::ZERO,
            rng: StdRng::from_entropy(),
        }
    }

    /// Construct from a variant name; unknown names fail loudly.
    pub fn from_name(name: &str) -> Result<Self, ViewerError> {
        Ok(Self::new(name.parse()?))
    }

    /// System pre-filled with the variant's default seed shape.
    pub fn seeded(kind: ParticleKind) -> Self {
        let mut system = Self::new(kind);
        system.fill();
        system
    }

    /// Fixed-seed RNG, for reproducible runs.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particle(&self, index: usize) -> &Particle {
        &self.particles[index]
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn params(&self) -> &SystemParams {
        &self.params
    }

    pub fn rules(&self) -> &AutomataRules {
        &self.rules
    }

    /// Average position of all particles; origin when empty.
    pub fn particle_centre(&self) -> Vec3 {
        if self.particles.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.particles.iter().map(|p| p.position).sum();
        sum / self.particles.len() as f32
    }

    // ========== Seeding ==========

    /// Seed the system with the variant's default shape: an icosahedron of
    /// doubly linked particles, an automata lattice, a single growth root,
    /// or a loose icosahedron of static particles.
    pub fn fill(&mut self) {
        match self.kind {
            ParticleKind::Linked => self.fill_icosahedron(ParticleState::Linked(LinkedState::default())),
            ParticleKind::Plain => self.fill_icosahedron(ParticleState::Plain),
            ParticleKind::Automata => self.fill_automata_lattice(),
            ParticleKind::Growth => self.fill_growth_root(),
        }
    }

    fn fill_icosahedron(&mut self, state: ParticleState) {
        for v in ICOSAHEDRON_VERTICES {
            self.particles.push(Particle::new(
                Vec3::from_array(v),
                self.params.particle_size,
                state.clone(),
            ));
        }
        if self.kind == ParticleKind::Linked {
            for [a, b] in ICOSAHEDRON_EDGES {
                self.double_connect(a, b);
            }
        }
    }

    /// Cubic lattice of automaton cells within `automata_radius` of the
    /// origin, 6-connected, roughly half of them seeded alive.
    fn fill_automata_lattice(&mut self) {
        let r = self.params.automata_radius.max(1);
        let r_sq = (r * r) as f32;
        // BTreeMap keeps lattice iteration (and thus link order) deterministic.
        let mut index_of = std::collections::BTreeMap::new();

        for x in -r..=r {
            for y in -r..=r {
                for z in -r..=r {
                    let pos = Vec3::new(x as f32, y as f32, z as f32);
                    if pos.length_squared() > r_sq {
                        continue;
                    }
                    let alive = self.rng.gen_bool(0.5);
                    let state = if alive {
                        AutomataState::alive()
                    } else {
                        AutomataState::dead()
                    };
                    let idx = self.particles.len() as u32;
                    index_of.insert((x, y, z), idx);
                    self.particles.push(Particle::new(
                        pos,
                        self.params.particle_size,
                        ParticleState::Automata(state),
                    ));
                }
            }
        }

        // Link each cell to its six lattice neighbours.
        for (&(x, y, z), &idx) in &index_of {
            for (dx, dy, dz) in [(1, 0, 0), (0, 1, 0), (0, 0, 1)] {
                if let Some(&other) = index_of.get(&(x + dx, y + dy, z + dz)) {
                    self.particles[idx as usize].connect(other);
                    self.particles[other as usize].connect(idx);
                }
            }
        }
    }

    /// Growth starts from a single root just off the origin; everything
    /// else buds from it.
    fn fill_growth_root(&mut self) {
        self.particles.push(Particle::new(
            Vec3::new(0.1, 0.3, 0.4),
            self.params.particle_size,
            ParticleState::Growth,
        ));
    }

    /// Append a particle, returning its index. Used by seeding and tests
    /// building explicit topologies.
    pub fn push_particle(&mut self, particle: Particle) -> u32 {
        let idx = self.particles.len() as u32;
        self.particles.push(particle);
        idx
    }

    /// Link `a` and `b` mutually.
    pub fn double_connect(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        self.particles[a as usize].connect(b);
        self.particles[b as usize].connect(a);
    }

    /// Drop everything and reseed as a (possibly different) variant.
    pub fn reset(&mut self, kind: ParticleKind) {
        self.kind = kind;
        self.particles.clear();
        self.params = SystemParams {
            particle_size: self.params.particle_size,
            ..SystemParams::default()
        };
        self.rules = AutomataRules::life();
        self.fill();
    }

    // ========== Simulation ==========

    /// Advance all particles one tick.
    ///
    /// Automata variants evaluate the rule for every particle against the
    /// current neighbour states before committing any of the results, so
    /// outcomes never depend on iteration order within a tick. Dead cells
    /// are removed afterwards with connectivity remapped.
    pub fn step(&mut self) {
        if !self.params.forces {
            return;
        }
        match self.kind {
            // Growth particles only move when a split buds a new branch.
            ParticleKind::Plain | ParticleKind::Growth => {}
            ParticleKind::Automata => {
                self.step_automata();
                self.remove_dead();
            }
            ParticleKind::Linked => self.step_linked(),
        }
        for p in &mut self.particles {
            p.advance();
        }
    }

    fn step_automata(&mut self) {
        // Read phase: rule inputs from the pre-tick states only.
        let next: Vec<bool> = self
            .particles
            .iter()
            .map(|p| {
                let state = match &p.state {
                    ParticleState::Automata(s) => s,
                    _ => return true,
                };
                let alive_neighbours = p
                    .connections()
                    .iter()
                    .filter(|&&c| self.particles[c as usize].is_alive())
                    .count();
                self.rules.next_state(state.alive, alive_neighbours, state.age)
            })
            .collect();

        // Commit phase. Birth restarts the age clock; everyone else ages.
        for (p, alive) in self.particles.iter_mut().zip(next) {
            if let ParticleState::Automata(s) = &mut p.state {
                if alive && !s.alive {
                    s.age = 0;
                } else {
                    s.age += 1;
                }
                s.alive = alive;
            }
        }
    }

    /// Remove dead automata cells, remapping every connection to the new
    /// indices and dropping links to removed particles.
    fn remove_dead(&mut self) {
        if self.particles.iter().all(|p| p.is_alive()) {
            return;
        }

        let mut new_index = vec![None; self.particles.len()];
        let mut next = 0u32;
        for (i, p) in self.particles.iter().enumerate() {
            if p.is_alive() {
                new_index[i] = Some(next);
                next += 1;
            }
        }

        let removed = self.particles.len() - next as usize;
        self.particles.retain(|p| p.is_alive());
        for p in &mut self.particles {
            p.remap_connections(|c| new_index[c as usize]);
        }
        log::debug!("Removed {} dead particles, {} remain", removed, self.particles.len());
    }

    fn step_linked(&mut self) {
        self.average_distance = self.calculate_average_distance();
        let centre = Vec3::ZERO;
        let cluster_centre = self.particle_centre();

        // Snapshot positions and links so force accumulation sees a
        // consistent pre-tick world.
        let snapshot: Vec<(Vec3, Vec<u32>)> = self
            .particles
            .iter()
            .map(|p| (p.position, p.connections().to_vec()))
            .collect();

        let cohesion_factor = self.params.cohesion.max(1) as f32;
        let local_factor = self.params.local_cohesion.max(1) as f32;
        let particle_death = self.params.particle_death;
        let avg_sq = self.average_distance.length_squared();

        for (i, p) in self.particles.iter_mut().enumerate() {
            let (pos, ref conns) = snapshot[i];
            let size = p.size;

            // Equidistance: discourage drifting inside the average shell.
            let to_centre = centre - pos;
            if to_centre.length_squared() < avg_sq {
                p.velocity += -to_centre / 100.0;
            } else {
                p.velocity /= 1.5;
            }

            // Cohesion towards the cluster centre.
            let cohesion = centre - pos;
            let cohesion_len = cohesion.length();
            let cohesion_dist = size + cohesion_len / 2.0;
            if cohesion_len >= size * 2.0 {
                p.velocity /= 1.1;
            }
            p.velocity +=
                cohesion.normalize_or_zero() * (cohesion_dist / (cohesion_factor * 3.3));

            // Local cohesion towards the centre of linked neighbours.
            if !conns.is_empty() {
                let link_centre = conns
                    .iter()
                    .map(|&c| snapshot[c as usize].0)
                    .sum::<Vec3>()
                    / conns.len() as f32;
                let local = link_centre - pos;
                let local_len = local.length();
                let local_dist = size + local_len / 2.0;
                if local_len >= size * 2.0 {
                    p.velocity /= 1.1;
                }
                p.velocity += local.normalize_or_zero() * (local_dist / local_factor);
            }

            // Repulsion from every particle this one is not linked to.
            for (j, (other_pos, _)) in snapshot.iter().enumerate() {
                if j == i || conns.contains(&(j as u32)) {
                    continue;
                }
                let repulse = pos - *other_pos;
                let len = repulse.length();
                if len <= size * 2.0 {
                    p.velocity += repulse.normalize_or_zero() * (size - len / 2.0);
                }
            }

            // Fed particles sink towards the cluster centre until the food
            // wears off.
            if let ParticleState::Linked(s) = &mut p.state {
                if s.food {
                    s.food_life += 1;
                    let food = cluster_centre - pos;
                    if food.length() <= size * 2.0 {
                        p.velocity /= 1.1;
                    }
                    p.velocity += food / 4.0;
                    if s.food_life >= FOOD_TICKS {
                        s.food = false;
                    }
                }
            }

            // Particle death: freeze old particles crowded by their links.
            if particle_death {
                if let ParticleState::Linked(s) = &mut p.state {
                    s.life += 1;
                    let crowded = conns.iter().any(|&c| {
                        (snapshot[c as usize].0 - pos).length() <= size * 2.0
                    });
                    if s.life >= 200 && crowded {
                        p.velocity = Vec3::ZERO;
                    }
                }
            }
        }
    }

    /// Per-axis average absolute offset of particles from the cluster
    /// centre. Drives the equidistance force.
    fn calculate_average_distance(&self) -> Vec3 {
        if self.particles.is_empty() {
            return Vec3::ZERO;
        }
        let centre = self.particle_centre();
        let sum: Vec3 = self
            .particles
            .iter()
            .map(|p| (centre - p.position).abs())
            .sum();
        sum / self.particles.len() as f32
    }

    /// Push the innermost particles outwards. Bound to a key in the viewer.
    pub fn bulge(&mut self) {
        let centre = self.particle_centre();
        for p in &mut self.particles {
            let distance = p.position - centre;
            let near = p.size * 2.0;
            if distance.x <= near || distance.y <= near || distance.z <= near {
                p.velocity += distance;
            }
            p.advance();
        }
    }

    /// Feed roughly a third of the linked particles. Fed particles are
    /// pulled towards the cluster centre over the next few ticks, denting
    /// the surface inwards. Bound to a key in the viewer.
    pub fn add_food(&mut self) {
        if self.kind != ParticleKind::Linked || self.particles.is_empty() {
            return;
        }
        for _ in 0..=self.particles.len() / 3 {
            let idx = self.rng.gen_range(0..self.particles.len());
            if let ParticleState::Linked(s) = &mut self.particles[idx].state {
                s.food = true;
                s.food_life = 0;
            }
        }
    }

    // ========== Splitting ==========

    /// Split one particle, preferring the one nearest the light when
    /// `nearest_particle` is set. Linked particles divide across a plane;
    /// growth particles bud a new branch. Returns false when no particle
    /// can split.
    pub fn split_random_particle(&mut self) -> bool {
        if !matches!(self.kind, ParticleKind::Linked | ParticleKind::Growth) {
            return false;
        }

        let mut candidates: Vec<u32> = (0..self.particles.len() as u32).collect();
        while !candidates.is_empty() {
            let pick = if self.params.nearest_particle {
                self.nearest_to_light(&candidates)
            } else {
                self.rng.gen_range(0..candidates.len())
            };
            let idx = candidates[pick];
            let split = match self.kind {
                ParticleKind::Growth => self.split_growth(idx),
                _ => self.split_linked(idx),
            };
            if split {
                return true;
            }
            candidates.remove(pick);
        }
        false
    }

    /// Position in `candidates` of the particle closest to the light.
    fn nearest_to_light(&self, candidates: &[u32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, &idx) in candidates.iter().enumerate() {
            let d = (self.particles[idx as usize].position - self.light_pos).length_squared();
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// Split particle `idx` into parent and child.
    ///
    /// The plane through two of its neighbours partitions the remaining
    /// links: those on the normal side follow the child, the rest stay with
    /// the parent. Both anchors and the parent/child pair end up linked to
    /// each other, so no neighbour loses contact with the split site.
    fn split_linked(&mut self, idx: u32) -> bool {
        let conns = self.particles[idx as usize].connections().to_vec();
        if conns.len() < 2 {
            return false;
        }

        let link_pos: Vec<Vec3> = conns
            .iter()
            .map(|&c| self.particles[c as usize].position)
            .collect();

        let a = 0usize;
        let b = self.rng.gen_range(1..conns.len());

        let normal = link_pos[a].cross(link_pos[b]);
        let unit_normal = normal.normalize_or_zero();
        if unit_normal == Vec3::ZERO {
            // Anchors are colinear with the origin; no usable split plane.
            return false;
        }

        let mut keep = Vec::new();
        let mut relink = Vec::new();
        for (i, &conn) in conns.iter().enumerate() {
            if i == a || i == b {
                continue;
            }
            if plane_side(normal, link_pos[a], link_pos[i]) <= 0.0 {
                keep.push(conn);
            } else {
                relink.push(conn);
            }
        }

        let parent = &self.particles[idx as usize];
        let child_pos = parent.position + unit_normal * parent.size;
        let size = parent.size;
        let child_idx = self.particles.len() as u32;

        let mut child_conns = relink.clone();
        child_conns.push(idx);
        child_conns.push(conns[a]);
        child_conns.push(conns[b]);
        self.particles.push(Particle::with_connections(
            child_pos,
            size,
            ParticleState::Linked(LinkedState::default()),
            child_conns,
        ));

        // Relinked neighbours trade the parent for the child.
        for &r in &relink {
            self.particles[r as usize].disconnect(idx);
            self.particles[r as usize].connect(child_idx);
        }
        // Anchors keep the parent and also gain the child.
        self.particles[conns[a] as usize].connect(child_idx);
        self.particles[conns[b] as usize].connect(child_idx);

        let mut parent_conns = keep;
        parent_conns.push(conns[a]);
        parent_conns.push(conns[b]);
        parent_conns.push(child_idx);
        self.particles[idx as usize].set_connections(parent_conns);

        true
    }

    /// Bud a new growth particle off `idx` towards the light.
    ///
    /// Fails when the particle already carries `child_threshold`
    /// connections, or when every candidate bud position collides with a
    /// nearby branch. The child's first connection is its parent, which the
    /// collision walk relies on.
    fn split_growth(&mut self, idx: u32) -> bool {
        let parent = &self.particles[idx as usize];
        if parent.connection_count() >= self.params.child_threshold as usize {
            return false;
        }
        let pos = parent.position;
        let size = parent.size;
        let reach = size * self.params.branch_length;

        for _ in 0..GROWTH_BRANCH_ATTEMPTS {
            let dir = if self.params.grow_to_light {
                growth::branch_direction(&mut self.rng, pos, self.light_pos)
            } else {
                growth::random_direction(&mut self.rng)
            };
            let candidate = pos + dir * reach;
            if self.branch_collides(idx, candidate) {
                continue;
            }

            let child_idx = self.particles.len() as u32;
            self.particles.push(Particle::with_connections(
                candidate,
                size,
                ParticleState::Growth,
                vec![idx],
            ));
            self.particles[idx as usize].connect(child_idx);
            return true;
        }
        false
    }

    /// Whether a candidate bud position lands inside an existing branch.
    /// Walks a couple of levels up towards the root first so the test
    /// covers neighbouring limbs, not just this particle's own subtree.
    fn branch_collides(&self, from: u32, candidate: Vec3) -> bool {
        let mut root = from;
        for _ in 0..GROWTH_COLLISION_LEVELS {
            if root == 0 {
                break;
            }
            match self.particles[root as usize].connections().first() {
                Some(&parent) => root = parent,
                None => break,
            }
        }
        self.subtree_collides(root, candidate)
    }

    fn subtree_collides(&self, node: u32, candidate: Vec3) -> bool {
        let p = &self.particles[node as usize];
        if growth::overlaps(candidate, p.position, p.size) {
            return true;
        }
        // The root has no parent, so all its connections are children.
        let children = if node == 0 {
            p.connections()
        } else {
            p.connections().get(1..).unwrap_or(&[])
        };
        children.iter().any(|&c| self.subtree_collides(c, candidate))
    }

    // ========== Packaging ==========

    /// Flat `[x, y, z, size]` snapshot of every particle for GPU upload.
    ///
    /// The stride is fixed per variant for the lifetime of the system.
    /// Linked variants are plane-sorted back-to-front against `view` first,
    /// so the packaged order composites transparency correctly. An empty
    /// system yields an empty buffer. Corrupt connectivity fails loudly
    /// instead of emitting a malformed buffer.
    pub fn package_data_for_drawing(&mut self, view: &ViewInfo) -> Result<Vec<f32>, ViewerError> {
        self.validate_connections()?;

        if self.kind == ParticleKind::Linked {
            self.plane_sort(view);
        }

        let mut packaged = Vec::with_capacity(self.particles.len() * PACKED_STRIDE);
        for p in &self.particles {
            packaged.push(p.position.x);
            packaged.push(p.position.y);
            packaged.push(p.position.z);
            packaged.push(p.size);
        }
        Ok(packaged)
    }

    /// Reorder particles back-to-front along the camera view axis and
    /// remap connectivity to the new order. Stable: equal depths keep
    /// their relative order.
    fn plane_sort(&mut self, view: &ViewInfo) {
        let positions: Vec<Vec3> = self.particles.iter().map(|p| p.position).collect();
        let order = sort_back_to_front(&positions, view.eye, view.forward);

        let mut inverse = vec![0u32; order.len()];
        for (new, &old) in order.iter().enumerate() {
            inverse[old as usize] = new as u32;
        }

        let mut sorted = Vec::with_capacity(self.particles.len());
        for &old in &order {
            sorted.push(self.particles[old as usize].clone());
        }
        for p in &mut sorted {
            p.remap_connections(|c| Some(inverse[c as usize]));
        }
        self.particles = sorted;
    }

    fn validate_connections(&self) -> Result<(), ViewerError> {
        let len = self.particles.len();
        for p in &self.particles {
            for &c in p.connections() {
                debug_assert!((c as usize) < len, "dangling connection index {}", c);
                if c as usize >= len {
                    return Err(ViewerError::IndexOutOfRange { index: c, len });
                }
            }
        }
        Ok(())
    }

    /// Index pairs for line rendering, one entry per link. Mutual links are
    /// emitted once, from the lower index.
    pub fn links_for_draw(&self) -> Vec<u32> {
        let mut pairs = Vec::new();
        for (i, p) in self.particles.iter().enumerate() {
            let i = i as u32;
            for &c in p.connections() {
                if c > i || !self.particles[c as usize].is_connected_to(i) {
                    pairs.push(i);
                    pairs.push(c);
                }
            }
        }
        pairs
    }

    // ========== Parameters ==========

    pub fn set_light_pos(&mut self, pos: Vec3) {
        self.light_pos = pos;
    }

    pub fn set_particle_size(&mut self, size: f32) {
        self.params.particle_size = size;
        for p in &mut self.particles {
            p.size = size;
        }
    }

    /// UI slider semantics: a higher slider value means stronger cohesion,
    /// so the stored divisor is inverted.
    pub fn set_cohesion(&mut self, amount: i32) {
        self.params.cohesion = 100 - amount;
    }

    pub fn set_local_cohesion(&mut self, amount: i32) {
        self.params.local_cohesion = 100 - amount;
    }

    pub fn set_automata_radius(&mut self, radius: i32) {
        self.params.automata_radius = radius;
    }

    pub fn set_automata_lifetime(&mut self, lifetime: u32) {
        self.rules.lifetime = lifetime;
    }

    pub fn set_rules(&mut self, rules: AutomataRules) {
        self.rules = rules;
    }

    pub fn toggle_forces(&mut self, state: bool) {
        self.params.forces = state;
    }

    pub fn toggle_particle_death(&mut self, state: bool) {
        self.params.particle_death = state;
    }

    pub fn set_nearest_particle(&mut self, state: bool) {
        self.params.nearest_particle = state;
    }

    pub fn set_child_threshold(&mut self, amount: u32) {
        self.params.child_threshold = amount;
    }

    pub fn set_branch_length(&mut self, length: f32) {
        self.params.branch_length = length;
    }

    pub fn set_grow_to_light(&mut self, state: bool) {
        self.params.grow_to_light = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// n particles in a line, each mutually linked to its neighbour.
    fn line_of_automata(n: usize) -> ParticleSystem {
        let mut system = ParticleSystem::new(ParticleKind::Automata).with_rng_seed(7);
        for i in 0..n {
            system.push_particle(Particle::new(
                Vec3::new(i as f32, 0.0, 0.0),
                0.35,
                ParticleState::Automata(AutomataState::alive()),
            ));
        }
        for i in 1..n as u32 {
            system.double_connect(i - 1, i);
        }
        system
    }

    #[test]
    fn invalid_variant_name_is_rejected() {
        let err = ParticleSystem::from_name("boids").unwrap_err();
        match err {
            ViewerError::InvalidVariant(name) => assert_eq!(name, "boids"),
            other => panic!("expected InvalidVariant, got {:?}", other),
        }
        assert!(ParticleSystem::from_name("Linked").is_ok());
        assert!(ParticleSystem::from_name("AUTOMATA").is_ok());
        assert!(ParticleSystem::from_name("growth").is_ok());
    }

    #[test]
    fn empty_system_packages_empty_buffer() {
        let mut system = ParticleSystem::new(ParticleKind::Linked);
        let buffer = system.package_data_for_drawing(&ViewInfo::default()).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn package_length_matches_stride() {
        for kind in [
            ParticleKind::Plain,
            ParticleKind::Automata,
            ParticleKind::Linked,
            ParticleKind::Growth,
        ] {
            let mut system = ParticleSystem::seeded(kind).with_rng_seed(1);
            system.step();
            let count = system.len();
            let buffer = system.package_data_for_drawing(&ViewInfo::default()).unwrap();
            assert_eq!(buffer.len(), count * PACKED_STRIDE, "kind {:?}", kind);
        }
    }

    #[test]
    fn seeded_linked_is_icosahedron() {
        let system = ParticleSystem::seeded(ParticleKind::Linked);
        assert_eq!(system.len(), 12);
        // Every icosahedron vertex touches exactly five edges.
        for p in system.particles() {
            assert_eq!(p.connection_count(), 5);
        }
    }

    #[test]
    fn automata_line_matches_hand_computed_table() {
        // Ten alive cells in a line: the ends see one alive neighbour and
        // die, the middle eight see two and survive.
        let mut system = line_of_automata(10);
        system.step();
        assert_eq!(system.len(), 8);
        // Survivors are the old particles 1..=8 shifted down by one; the
        // old interior links must have been remapped, not dropped.
        assert_eq!(system.particle(0).connections(), &[1]);
        assert_eq!(system.particle(1).connections(), &[0, 2]);
        assert_eq!(system.particle(7).connections(), &[6]);
    }

    #[test]
    fn automata_step_is_order_independent() {
        // Two identical topologies stepped once must agree exactly.
        let mut a = line_of_automata(10);
        let mut b = line_of_automata(10);
        a.step();
        b.step();
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert_eq!(a.particle(i).state, b.particle(i).state);
        }
    }

    #[test]
    fn dead_removal_leaves_no_dangling_indices() {
        let mut system = ParticleSystem::seeded(ParticleKind::Automata).with_rng_seed(42);
        for _ in 0..5 {
            system.step();
            let len = system.len();
            for p in system.particles() {
                for &c in p.connections() {
                    assert!((c as usize) < len);
                }
            }
        }
    }

    #[test]
    fn linked_packaging_is_back_to_front() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked).with_rng_seed(3);
        system.step();
        let view = ViewInfo {
            eye: Vec3::new(0.0, 0.0, 6.0),
            forward: Vec3::NEG_Z,
        };
        let buffer = system.package_data_for_drawing(&view).unwrap();

        let depths: Vec<f32> = buffer
            .chunks(PACKED_STRIDE)
            .map(|c| {
                let pos = Vec3::new(c[0], c[1], c[2]);
                crate::linked::view_depth(view.eye, view.forward, pos)
            })
            .collect();
        for pair in depths.windows(2) {
            assert!(pair[0] >= pair[1], "packaged order not back-to-front");
        }
    }

    #[test]
    fn plane_sort_preserves_link_topology() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked).with_rng_seed(3);
        let view = ViewInfo {
            eye: Vec3::new(1.0, 2.0, 6.0),
            forward: Vec3::new(-0.2, -0.3, -1.0).normalize(),
        };
        system.package_data_for_drawing(&view).unwrap();
        // Still an icosahedron: 12 particles, five links each, all mutual.
        assert_eq!(system.len(), 12);
        for (i, p) in system.particles().iter().enumerate() {
            assert_eq!(p.connection_count(), 5);
            for &c in p.connections() {
                assert!(system.particle(c as usize).is_connected_to(i as u32));
            }
        }
    }

    #[test]
    fn split_relinks_every_neighbour() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked).with_rng_seed(11);
        let before = system.len();
        assert!(system.split_random_particle());
        assert_eq!(system.len(), before + 1);

        // All links mutual, no dangling indices.
        let len = system.len();
        for (i, p) in system.particles().iter().enumerate() {
            for &c in p.connections() {
                assert!((c as usize) < len);
                assert!(
                    system.particle(c as usize).is_connected_to(i as u32),
                    "link {} -> {} not mutual",
                    i,
                    c
                );
            }
        }
        // Parent and child are linked to each other.
        let child = len - 1;
        let parent_links = system.particle(child).connections().to_vec();
        assert!(!parent_links.is_empty());
    }

    #[test]
    fn links_for_draw_emits_each_edge_once() {
        let system = ParticleSystem::seeded(ParticleKind::Linked);
        let pairs = system.links_for_draw();
        assert_eq!(pairs.len(), ICOSAHEDRON_EDGES.len() * 2);
        for pair in pairs.chunks(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn forces_toggle_freezes_simulation() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked);
        system.toggle_forces(false);
        let before: Vec<Vec3> = system.particles().iter().map(|p| p.position).collect();
        system.step();
        let after: Vec<Vec3> = system.particles().iter().map(|p| p.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn birth_resets_the_age_clock() {
        // A dead cell aged 50 with three alive neighbours is born this
        // tick; the neighbours see no alive cells and die.
        let mut system = ParticleSystem::new(ParticleKind::Automata).with_rng_seed(7);
        let centre = system.push_particle(Particle::new(
            Vec3::ZERO,
            0.35,
            ParticleState::Automata(AutomataState { alive: false, age: 50 }),
        ));
        for i in 0..3 {
            let n = system.push_particle(Particle::new(
                Vec3::new(1.0 + i as f32, 0.0, 0.0),
                0.35,
                ParticleState::Automata(AutomataState::alive()),
            ));
            system.double_connect(centre, n);
        }
        system.step();
        assert_eq!(system.len(), 1);
        match &system.particle(0).state {
            ParticleState::Automata(s) => {
                assert!(s.alive);
                assert_eq!(s.age, 0);
            }
            other => panic!("expected an automata cell, got {:?}", other),
        }
    }

    #[test]
    fn growth_seeds_a_single_root() {
        let system = ParticleSystem::seeded(ParticleKind::Growth);
        assert_eq!(system.len(), 1);
        assert!(matches!(system.particle(0).state, ParticleState::Growth));
        assert_eq!(system.particle(0).connection_count(), 0);
    }

    #[test]
    fn growth_split_buds_a_child_towards_the_light() {
        let light = Vec3::new(6.0, 7.0, 8.0);
        let mut system = ParticleSystem::seeded(ParticleKind::Growth).with_rng_seed(5);
        system.set_light_pos(light);
        assert!(system.split_random_particle());
        assert_eq!(system.len(), 2);

        let root = system.particle(0);
        let child = system.particle(1);
        assert!(root.is_connected_to(1));
        assert_eq!(child.connections(), &[0]);

        let expected = root.size * system.params().branch_length;
        let branch = (child.position - root.position).length();
        assert!((branch - expected).abs() < 1e-4);
        assert!(child.position.distance(light) < root.position.distance(light));
    }

    #[test]
    fn growth_split_respects_the_child_threshold() {
        let mut system = ParticleSystem::seeded(ParticleKind::Growth).with_rng_seed(5);
        system.set_light_pos(Vec3::new(6.0, 7.0, 8.0));
        system.set_child_threshold(1);
        // The root may carry one connection; after the first bud both
        // particles are saturated.
        assert!(system.split_random_particle());
        assert!(!system.split_random_particle());
        assert_eq!(system.len(), 2);
        for p in system.particles() {
            assert!(p.connection_count() <= 1);
        }
    }

    #[test]
    fn growth_collision_covers_the_parent_branch() {
        let mut system = ParticleSystem::new(ParticleKind::Growth).with_rng_seed(5);
        let root = system.push_particle(Particle::new(Vec3::ZERO, 1.0, ParticleState::Growth));
        let child = system.push_particle(Particle::with_connections(
            Vec3::new(2.0, 0.0, 0.0),
            1.0,
            ParticleState::Growth,
            vec![root],
        ));
        system.double_connect(root, child);

        // A bud from the child landing inside the root is a collision; one
        // clear of every branch is not.
        assert!(system.branch_collides(child, Vec3::new(0.2, 0.0, 0.0)));
        assert!(!system.branch_collides(child, Vec3::new(4.0, 0.0, 0.0)));
    }

    #[test]
    fn add_food_flags_linked_particles() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked).with_rng_seed(13);
        system.add_food();
        let fed = system
            .particles()
            .iter()
            .filter(|p| matches!(&p.state, ParticleState::Linked(s) if s.food))
            .count();
        assert!(fed > 0);
        assert!(fed <= system.len());
    }

    #[test]
    fn fed_particles_are_pulled_towards_the_centre() {
        // Two identical pairs; the first particle of one pair is fed. The
        // food pull adds (centre - position) / 4 to its velocity.
        let build = |fed: bool| {
            let mut system = ParticleSystem::new(ParticleKind::Linked).with_rng_seed(2);
            let state = LinkedState {
                food: fed,
                ..LinkedState::default()
            };
            system.push_particle(Particle::new(
                Vec3::new(4.0, 0.0, 0.0),
                0.35,
                ParticleState::Linked(state),
            ));
            system.push_particle(Particle::new(
                Vec3::new(-4.0, 0.0, 0.0),
                0.35,
                ParticleState::Linked(LinkedState::default()),
            ));
            system.double_connect(0, 1);
            system.step();
            system
        };
        let plain = build(false);
        let fed = build(true);
        let diff = fed.particle(0).velocity - plain.particle(0).velocity;
        assert!((diff - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn food_wears_off_after_ten_ticks() {
        let mut system = ParticleSystem::new(ParticleKind::Linked).with_rng_seed(2);
        system.push_particle(Particle::new(
            Vec3::new(4.0, 0.0, 0.0),
            0.35,
            ParticleState::Linked(LinkedState {
                food: true,
                ..LinkedState::default()
            }),
        ));
        system.push_particle(Particle::new(
            Vec3::new(-4.0, 0.0, 0.0),
            0.35,
            ParticleState::Linked(LinkedState::default()),
        ));
        system.double_connect(0, 1);
        for _ in 0..FOOD_TICKS {
            system.step();
        }
        match &system.particle(0).state {
            ParticleState::Linked(s) => {
                assert!(!s.food);
                assert_eq!(s.food_life, FOOD_TICKS);
            }
            other => panic!("expected a linked particle, got {:?}", other),
        }
    }

    #[test]
    fn reset_changes_variant() {
        let mut system = ParticleSystem::seeded(ParticleKind::Linked);
        system.reset(ParticleKind::Automata);
        assert_eq!(system.kind(), ParticleKind::Automata);
        assert!(system.len() > 0);
        assert!(matches!(
            system.particle(0).state,
            ParticleState::Automata(_)
        ));
    }
}
