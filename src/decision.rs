//! Host action selection: a shallow lookahead over candidate actions,
//! scored against the other cars' inferred behaviour.

use crate::car::{self, Car};
use crate::math::{manhattan_dist, rot90, signed_angle_deg, Point2d};
use crate::search::Searcher;
use crate::simulation::Simulation;
use cgmath::prelude::*;
use itertools::Itertools;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::rc::Rc;

/// Penalty applied when a waypoint meets a car's predicted position.
const PROXIMITY_PENALTY: f64 = 50.0;

/// Risk multiplier per intention, in [Intention::ALL] order. An
/// aggressive driver is less likely to yield, so crossing its
/// predicted path costs more.
const RISK_FACTORS: [f64; 3] = [0.5, 1.0, 1.5];

/// Replan once a held plan is this many ticks old.
const REPLAN_INTERVAL: usize = 30;

/// The named actions available to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostAction {
    Normal,
    Accelerate,
    Decelerate,
    Stop,
    TurnLeft,
    TurnRight,
}

impl HostAction {
    /// All host actions.
    pub const ALL: [HostAction; 6] = [
        HostAction::Normal,
        HostAction::Accelerate,
        HostAction::Decelerate,
        HostAction::Stop,
        HostAction::TurnLeft,
        HostAction::TurnRight,
    ];

    /// The action's directive name.
    pub fn name(&self) -> &'static str {
        match self {
            HostAction::Normal => "NORMAL",
            HostAction::Accelerate => "ACC",
            HostAction::Decelerate => "DEC",
            HostAction::Stop => "STOP",
            HostAction::TurnLeft => "TURN_LEFT",
            HostAction::TurnRight => "TURN_RIGHT",
        }
    }
}

/// The default reward table, shared read-only by every decision maker.
static ACTION_REWARDS: Lazy<HashMap<HostAction, f64>> = Lazy::new(|| {
    HashMap::from([
        (HostAction::Normal, 1.0),
        (HostAction::Accelerate, 2.0),
        (HostAction::Decelerate, -1.0),
        (HostAction::Stop, -2.0),
    ])
});

/// The immutable action set and reward weights a decision maker
/// evaluates against.
#[derive(Clone, Debug)]
pub struct DecisionConfig {
    /// The actions the host may consider.
    pub host_actions: Vec<HostAction>,
    /// Reward weight per action; a missing entry contributes zero.
    pub rewards: HashMap<HostAction, f64>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            host_actions: HostAction::ALL.to_vec(),
            rewards: ACTION_REWARDS.clone(),
        }
    }
}

impl DecisionConfig {
    fn reward(&self, action: HostAction) -> f64 {
        self.rewards.get(&action).copied().unwrap_or(0.0)
    }
}

/// Plans the host's path by hypothetically applying each legal action
/// to a copy of the simulation and searching from the outcome.
#[derive(Clone, Debug)]
pub struct DecisionMaker {
    /// Lookahead depth; scales the prediction horizon.
    depth: usize,
    /// The slot of the planning car (0 for the host).
    index: usize,
    config: Rc<DecisionConfig>,
}

impl Default for DecisionMaker {
    fn default() -> Self {
        Self::new(2, 0, Rc::new(DecisionConfig::default()))
    }
}

impl DecisionMaker {
    /// Creates a decision maker with an injected configuration.
    pub fn new(depth: usize, index: usize, config: Rc<DecisionConfig>) -> Self {
        Self {
            depth,
            index,
            config,
        }
    }

    /// The slot of the planning car.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Enumerates the configured actions that are kinematically
    /// feasible in the current state.
    pub fn generate_legal_actions(&self, sim: &Simulation) -> Vec<HostAction> {
        let host = sim.host();
        self.config
            .host_actions
            .iter()
            .copied()
            .filter(|action| match action {
                // Cannot shed speed at or below the rolling floor.
                HostAction::Decelerate => host.speed() > host.limits().min_speed,
                // Stopping when already stopped is a no-op.
                HostAction::Stop => host.speed() > 0.0,
                HostAction::TurnLeft | HostAction::TurnRight => {
                    host.wheel_angle().abs() < host.limits().max_wheel_angle
                }
                _ => true,
            })
            .collect()
    }

    /// Applies an action to the host of a simulation copy and advances
    /// the copy one tick. Callers must pass a clone; the live
    /// simulation is never mutated by planning.
    pub fn apply_action(&self, sim: &mut Simulation, action: HostAction) {
        let host = sim.host_mut();
        let limits = *host.limits();
        match action {
            HostAction::Normal => {}
            HostAction::Accelerate => host.accelerate(limits.max_accel),
            HostAction::Decelerate => host.decelerate(limits.max_accel),
            HostAction::Stop => host.set_forward_velocity(0.0),
            HostAction::TurnLeft => host.set_wheel_angle(-0.5 * limits.max_wheel_angle),
            HostAction::TurnRight => host.set_wheel_angle(0.5 * limits.max_wheel_angle),
        }
        host.update();
    }

    /// Runs the path search from the hypothetical outcome of each
    /// action; one (possibly empty) path per action.
    pub fn generate_paths(&self, sim: &Simulation, actions: &[HostAction]) -> Vec<Vec<Point2d>> {
        actions
            .iter()
            .map(|action| {
                let mut copy = sim.clone();
                self.apply_action(&mut copy, *action);
                let searcher = Searcher::new(&copy, sim.goal());
                searcher
                    .search()
                    .map(|node| searcher.path(&node))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Scores a path; lower is better. Combines the path's length in
    /// tiles with risk-weighted penalties for waypoints near the other
    /// cars' predicted positions.
    pub fn evaluate_path(&self, sim: &Simulation, path: &[Point2d], intentions: &[usize]) -> f64 {
        if path.is_empty() {
            return f64::INFINITY;
        }

        let tile = sim.layout().tile_size();
        let mut score: f64 = path
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.distance(*b))
            .sum::<f64>()
            / tile;

        let horizon = 5 * self.depth;
        for (slot, id) in sim.other_car_ids().enumerate() {
            let other = sim.get_car(id);
            let risk = intentions
                .get(slot)
                .and_then(|i| RISK_FACTORS.get(*i))
                .copied()
                .unwrap_or(1.0);
            for (tick, point) in path.iter().enumerate().take(horizon) {
                let predicted = other.position() + other.velocity() * tick as f64;
                if predicted.distance(*point) < 2.0 * car::bounding_radius() {
                    // Near-term conflicts weigh more than distant ones.
                    score += risk * PROXIMITY_PENALTY / (tick + 1) as f64;
                }
            }
        }

        score
    }

    /// Selects the best-scoring path over all legal actions. Returns
    /// `false` and leaves `out` empty when no action yields a usable
    /// path; the caller must fall back to holding still.
    pub fn get_path(
        &self,
        sim: &Simulation,
        out: &mut Vec<Point2d>,
        intentions: &[usize],
    ) -> bool {
        out.clear();
        let actions = self.generate_legal_actions(sim);
        let paths = self.generate_paths(sim, &actions);

        let best = actions
            .iter()
            .zip(&paths)
            .map(|(action, path)| {
                let score = self.evaluate_path(sim, path, intentions) - self.config.reward(*action);
                (action, path, score)
            })
            .filter(|(_, path, _)| !path.is_empty())
            .min_by(|a, b| a.2.total_cmp(&b.2));

        match best {
            Some((action, path, score)) => {
                debug!("selected action {} with score {:.2}", action.name(), score);
                out.extend_from_slice(path);
                true
            }
            None => {
                debug!("no legal action yields a usable path");
                false
            }
        }
    }

    /// Whether the held plan is stale and planning should run again.
    pub fn is_change_required(&self, sim: &Simulation, path: &[Point2d], age: usize) -> bool {
        if path.is_empty() || age >= REPLAN_INTERVAL {
            return true;
        }

        // An obstacle parked on an upcoming waypoint invalidates the plan.
        let tile = sim.layout().tile_size();
        let cursor = sim.host().node_id.min(path.len());
        sim.other_car_ids().any(|id| {
            let other = sim.get_car(id);
            path[cursor..]
                .iter()
                .any(|point| manhattan_dist(other.position(), *point) < tile)
        })
    }

    /// Proximity predicate: true when the nearest other car is ahead
    /// (within 90 degrees of the heading), within 1.5 tiles
    /// longitudinally and half a car width laterally.
    pub fn is_close_to_other_car(&self, car: &Car, sim: &Simulation) -> bool {
        close_to_other_car(car, sim)
    }
}

pub(crate) fn close_to_other_car(car: &Car, sim: &Simulation) -> bool {
    let nearest = sim
        .iter_cars()
        .filter(|other| other.id() != car.id())
        .min_by(|a, b| {
            let da = manhattan_dist(a.position(), car.position());
            let db = manhattan_dist(b.position(), car.position());
            da.total_cmp(&db)
        });
    let Some(nearest) = nearest else { return false };

    let diff = nearest.position() - car.position();
    if signed_angle_deg(car.direction(), diff).abs() > 90.0 {
        return false;
    }

    let longitudinal = diff.dot(car.direction()).abs();
    let lateral = diff.dot(rot90(car.direction())).abs();
    longitudinal < 1.5 * sim.layout().tile_size() && lateral < car::WIDTH / 2.0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{Direction, Layout, LayoutAttributes};
    use assert_approx_eq::assert_approx_eq;

    fn corridor(agent_spawns: &[[f64; 2]]) -> Simulation {
        let layout = Layout::new(&LayoutAttributes {
            width: 600.0,
            height: 120.0,
            tile_size: 30.0,
            blocks: &[],
            lines: &[],
            intersections: &[],
            host_graph: &[],
            agent_graph: &[],
            start: [45.0, 60.0],
            finish: [540.0, 30.0, 600.0, 90.0],
            host_dir: Direction::East,
            agent_spawns,
        });
        Simulation::new(layout)
    }

    #[test]
    fn missing_reward_contributes_zero() {
        let config = DecisionConfig::default();
        assert_approx_eq!(config.reward(HostAction::TurnLeft), 0.0);
        assert_approx_eq!(config.reward(HostAction::Accelerate), 2.0);
    }

    #[test]
    fn stationary_host_cannot_decelerate_or_stop() {
        let sim = corridor(&[]);
        let decision = DecisionMaker::default();
        let actions = decision.generate_legal_actions(&sim);
        assert!(!actions.contains(&HostAction::Decelerate));
        assert!(!actions.contains(&HostAction::Stop));
        assert!(actions.contains(&HostAction::Normal));
        assert!(actions.contains(&HostAction::Accelerate));
    }

    #[test]
    fn planning_does_not_mutate_the_snapshot() {
        let sim = corridor(&[[300.0, 60.0]]);
        let decision = DecisionMaker::default();
        let actions = decision.generate_legal_actions(&sim);

        let pos = sim.host().position();
        let dir = sim.host().direction();
        let first = decision.generate_paths(&sim, &actions);
        assert_eq!(sim.host().position(), pos);
        assert_eq!(sim.host().direction(), dir);

        // Planning twice over an unchanged snapshot is idempotent.
        let second = decision.generate_paths(&sim, &actions);
        assert_eq!(first, second);
    }

    #[test]
    fn get_path_reaches_the_goal() {
        let sim = corridor(&[]);
        let decision = DecisionMaker::default();
        let mut path = vec![];
        assert!(decision.get_path(&sim, &mut path, &[]));
        let last = path.last().unwrap();
        assert!(manhattan_dist(*last, sim.goal()) < sim.layout().tile_size());
    }

    #[test]
    fn car_behind_is_never_close() {
        // The other car sits directly behind the east-facing host.
        let sim = corridor(&[[5.0, 60.0]]);
        let decision = DecisionMaker::default();
        assert!(!decision.is_close_to_other_car(sim.host(), &sim));
    }

    #[test]
    fn car_ahead_within_threshold_is_close() {
        let sim = corridor(&[[80.0, 60.0]]);
        let decision = DecisionMaker::default();
        assert!(decision.is_close_to_other_car(sim.host(), &sim));
    }

    #[test]
    fn empty_or_old_plans_require_change() {
        let sim = corridor(&[]);
        let decision = DecisionMaker::default();
        assert!(decision.is_change_required(&sim, &[], 0));

        let path = vec![Point2d::new(45.0, 60.0), Point2d::new(75.0, 60.0)];
        assert!(!decision.is_change_required(&sim, &path, 1));
        assert!(decision.is_change_required(&sim, &path, REPLAN_INTERVAL));
    }
}
