//! The simulation unit: position, size and link connectivity.
//!
//! Behaviour variants are a tagged state payload chosen once at
//! construction, never changing kind afterwards. Behaviour that
//! needs the whole collection (rule evaluation, plane sorting, splitting)
//! lives on [`ParticleSystem`](crate::system::ParticleSystem); this module
//! only holds per-particle state and connectivity bookkeeping.

use glam::Vec3;

use crate::automata::AutomataState;
use crate::linked::LinkedState;

/// Per-variant state payload. Selected at construction, never changes kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleState {
    /// Static particle, no automatic evolution.
    Plain,
    /// Cellular-automaton cell with an alive flag and age.
    Automata(AutomataState),
    /// Surface-growth particle with a life counter.
    Linked(LinkedState),
    /// Branching growth particle. For every particle but the root, the
    /// first connection is the parent branch.
    Growth,
}

/// A single simulation unit owned by a `ParticleSystem`.
///
/// Connections are stored as indices into the owning system's particle
/// vector: unique, kept in insertion order for deterministic iteration.
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: f32,
    pub state: ParticleState,
    connections: Vec<u32>,
}

impl Particle {
    pub fn new(position: Vec3, size: f32, state: ParticleState) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            size,
            state,
            connections: Vec::new(),
        }
    }

    /// Particle with an initial connection list. Duplicates are dropped.
    pub fn with_connections(
        position: Vec3,
        size: f32,
        state: ParticleState,
        connections: Vec<u32>,
    ) -> Self {
        let mut p = Self::new(position, size, state);
        for idx in connections {
            p.connect(idx);
        }
        p
    }

    /// Integrate velocity into position. One tick.
    pub fn advance(&mut self) {
        self.position += self.velocity;
    }

    /// Add a connection to the particle at `index`. Idempotent.
    pub fn connect(&mut self, index: u32) {
        if !self.connections.contains(&index) {
            self.connections.push(index);
        }
    }

    /// Break the connection to `index`, if present.
    pub fn disconnect(&mut self, index: u32) {
        self.connections.retain(|&c| c != index);
    }

    pub fn is_connected_to(&self, index: u32) -> bool {
        self.connections.contains(&index)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> &[u32] {
        &self.connections
    }

    /// Replace the connection list wholesale. Used by split relinking and
    /// index remapping; callers are responsible for keeping entries unique.
    pub fn set_connections(&mut self, connections: Vec<u32>) {
        self.connections = connections;
    }

    /// Rewrite every connection through `map`, dropping entries mapped to
    /// `None`. Used when particles are removed or reordered.
    pub fn remap_connections(&mut self, map: impl Fn(u32) -> Option<u32>) {
        self.connections = self.connections.iter().filter_map(|&c| map(c)).collect();
    }

    /// Whether the particle counts as alive for removal purposes.
    /// Non-automata particles never die this way.
    pub fn is_alive(&self) -> bool {
        match &self.state {
            ParticleState::Automata(s) => s.alive,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(x: f32) -> Particle {
        Particle::new(Vec3::new(x, 0.0, 0.0), 1.0, ParticleState::Plain)
    }

    #[test]
    fn advance_integrates_velocity() {
        let mut p = plain(0.0);
        p.velocity = Vec3::new(1.0, 2.0, 3.0);
        p.advance();
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        p.advance();
        assert_eq!(p.position, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn connect_is_idempotent() {
        let mut p = plain(0.0);
        p.connect(3);
        p.connect(3);
        p.connect(5);
        assert_eq!(p.connections(), &[3, 5]);
        assert_eq!(p.connection_count(), 2);
    }

    #[test]
    fn disconnect_removes_only_target() {
        let mut p = plain(0.0);
        p.connect(1);
        p.connect(2);
        p.connect(3);
        p.disconnect(2);
        assert_eq!(p.connections(), &[1, 3]);
        assert!(!p.is_connected_to(2));
    }

    #[test]
    fn remap_drops_unmapped_connections() {
        let mut p = plain(0.0);
        p.connect(0);
        p.connect(1);
        p.connect(2);
        // Particle 1 was removed; higher indices shift down.
        p.remap_connections(|c| match c {
            0 => Some(0),
            1 => None,
            c => Some(c - 1),
        });
        assert_eq!(p.connections(), &[0, 1]);
    }

    #[test]
    fn with_connections_deduplicates() {
        let p = Particle::with_connections(
            Vec3::ZERO,
            1.0,
            ParticleState::Plain,
            vec![4, 4, 7, 4],
        );
        assert_eq!(p.connections(), &[4, 7]);
    }
}
