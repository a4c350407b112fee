//! Cellular-automaton rule evaluation.
//!
//! The transition is a pure function of the particle's current state and the
//! alive-count of its linked neighbours, so two evaluations with identical
//! inputs always agree. The rule table is pluggable; the default is the
//! B3/S23 life rule over link neighbourhoods, with an age cap wired to the
//! automata lifetime setting.

/// Automaton state carried by each automata particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomataState {
    pub alive: bool,
    /// Ticks since the particle was created (or last revived).
    pub age: u32,
}

impl AutomataState {
    pub fn alive() -> Self {
        Self { alive: true, age: 0 }
    }

    pub fn dead() -> Self {
        Self { alive: false, age: 0 }
    }
}

/// Deterministic birth/survival rule table.
///
/// A dead cell becomes alive when its alive-neighbour count appears in
/// `birth`; an alive cell stays alive when the count appears in `survival`
/// and its age is below `lifetime`. Everything else dies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomataRules {
    pub birth: Vec<u8>,
    pub survival: Vec<u8>,
    /// Maximum age in ticks before an alive cell dies regardless of
    /// neighbours. `u32::MAX` disables the cap.
    pub lifetime: u32,
}

impl AutomataRules {
    /// Conway's life rule (B3/S23) with the viewer's default lifetime.
    pub fn life() -> Self {
        Self {
            birth: vec![3],
            survival: vec![2, 3],
            lifetime: 200,
        }
    }

    /// Compute the next alive flag. Pure: no internal state is consulted.
    pub fn next_state(&self, alive: bool, alive_neighbours: usize, age: u32) -> bool {
        let count = u8::try_from(alive_neighbours).unwrap_or(u8::MAX);
        if alive {
            age < self.lifetime && self.survival.contains(&count)
        } else {
            self.birth.contains(&count)
        }
    }
}

impl Default for AutomataRules {
    fn default() -> Self {
        Self::life()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_rule_survival() {
        let rules = AutomataRules::life();
        assert!(!rules.next_state(true, 0, 0));
        assert!(!rules.next_state(true, 1, 0));
        assert!(rules.next_state(true, 2, 0));
        assert!(rules.next_state(true, 3, 0));
        assert!(!rules.next_state(true, 4, 0));
    }

    #[test]
    fn life_rule_birth() {
        let rules = AutomataRules::life();
        assert!(!rules.next_state(false, 2, 0));
        assert!(rules.next_state(false, 3, 0));
        assert!(!rules.next_state(false, 4, 0));
    }

    #[test]
    fn lifetime_cap_kills_old_cells() {
        let rules = AutomataRules::life();
        assert!(rules.next_state(true, 2, 199));
        assert!(!rules.next_state(true, 2, 200));
        assert!(!rules.next_state(true, 2, 5000));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let rules = AutomataRules::life();
        for alive in [false, true] {
            for n in 0..8 {
                for age in [0, 100, 300] {
                    let a = rules.next_state(alive, n, age);
                    let b = rules.next_state(alive, n, age);
                    assert_eq!(a, b, "alive={} n={} age={}", alive, n, age);
                }
            }
        }
    }
}
