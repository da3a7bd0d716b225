//! Per-tick conversion of a planned path and the car's kinematic
//! state into wheel and throttle commands.

use crate::car::{self, Car, WaitState};
use crate::decision::close_to_other_car;
use crate::math::{signed_angle_deg, Point2d};
use crate::simulation::Simulation;
use crate::spatial::WaypointIndex;
use cgmath::prelude::*;
use log::debug;

/// Ticks a car holds still after entering an intersection.
pub const HOLD_TICKS: u32 = 30;

/// Fraction of a tile within which the path cursor advances.
const WAYPOINT_TOLERANCE: f64 = 0.5;

/// A tick's steering and throttle command.
#[derive(Clone, Copy, Debug, Default)]
pub struct Control {
    /// Acceleration applied along the heading.
    pub accel: f64,
    /// Wheel deflection in degrees.
    pub wheel_angle: f64,
    /// When set, the car's velocity is zeroed before the command
    /// applies (the intersection hold).
    pub hold: bool,
}

impl Control {
    fn hold() -> Self {
        Self {
            hold: true,
            ..Default::default()
        }
    }
}

/// The outcome of a control computation. Computed against an immutable
/// snapshot and applied afterwards, so planning can never mutate the
/// live car mid-query.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ControlDecision {
    pub control: Control,
    pub wait: WaitState,
    pub node_id: usize,
    pub prev: usize,
}

impl ControlDecision {
    fn coast(car: &Car, wait: WaitState) -> Self {
        Self {
            control: Control::default(),
            wait,
            node_id: car.node_id,
            prev: car.prev,
        }
    }
}

/// Advances the intersection wait-state machine one tick.
///
/// Returns the next state and whether the car is held this tick. An
/// entry triggers exactly one hold of [HOLD_TICKS]; staying inside or
/// re-entering before the hold completes neither resets nor extends
/// it, and the latch clears only once the car has left the region.
fn wait_transition(car: &Car, sim: &Simulation) -> (WaitState, bool) {
    let inside = car
        .bounds()
        .iter()
        .any(|p| sim.in_intersection(p.x, p.y));

    match car.wait {
        WaitState::Driving => {
            if inside {
                debug!("car entered intersection, holding for {HOLD_TICKS} ticks");
                (WaitState::WaitingAtIntersection { ticks: 1 }, true)
            } else {
                (WaitState::Driving, false)
            }
        }
        WaitState::WaitingAtIntersection { ticks } => {
            if ticks < HOLD_TICKS {
                (WaitState::WaitingAtIntersection { ticks: ticks + 1 }, true)
            } else {
                (WaitState::Released, false)
            }
        }
        WaitState::Released => {
            if inside {
                (WaitState::Released, false)
            } else {
                (WaitState::Driving, false)
            }
        }
    }
}

/// Computes the host's command for this tick: hold at intersections,
/// yield when another car is close ahead, otherwise follow the path at
/// full throttle, steering toward the next waypoint.
pub(crate) fn host_control(
    car: &Car,
    sim: &Simulation,
    path: &[Point2d],
    index: Option<&WaypointIndex>,
) -> ControlDecision {
    let (wait, holding) = wait_transition(car, sim);
    if holding {
        return ControlDecision {
            control: Control::hold(),
            wait,
            node_id: car.node_id,
            prev: car.prev,
        };
    }

    if close_to_other_car(car, sim) || path.is_empty() {
        return ControlDecision::coast(car, wait);
    }

    let tile = sim.layout().tile_size();
    let mut node_id = car.node_id.min(path.len() - 1);
    let mut prev = car.prev;

    // Pick the target waypoint: heading alignment between the two
    // nearest when the index is fresh, else the sequential cursor.
    let mut next_id = match index.filter(|tree| tree.len() == path.len()) {
        Some(tree) => {
            let near = tree.k_nearest(car.position(), 2);
            match near.as_slice() {
                [first, second] => {
                    let to_second = second.point - car.position();
                    if signed_angle_deg(car.direction(), to_second).abs() < 90.0 {
                        second.id
                    } else {
                        first.id
                    }
                }
                [only] => only.id,
                _ => node_id,
            }
        }
        None => (node_id + 1).min(path.len() - 1),
    };

    if path[next_id].distance(car.position()) < WAYPOINT_TOLERANCE * tile {
        prev = node_id;
        node_id = next_id;
        next_id = (node_id + 1).min(path.len() - 1);
    }

    let to_target = path[next_id] - car.position();
    let wheel_angle = signed_angle_deg(car.direction(), to_target)
        .clamp(-car.limits().max_wheel_angle, car.limits().max_wheel_angle);

    ControlDecision {
        // Constant full throttle while driving; steering alone slows
        // the car through friction on sharp turns.
        control: Control {
            accel: car.limits().max_accel,
            wheel_angle,
            hold: false,
        },
        wait,
        node_id,
        prev,
    }
}

/// Computes an agent's command for this tick. Agents drive straight
/// ahead; a conservative agent coasts when the host is directly in
/// front of it, others accelerate normally.
pub(crate) fn agent_control(car: &Car, sim: &Simulation) -> ControlDecision {
    let (wait, holding) = wait_transition(car, sim);
    if holding {
        return ControlDecision::coast(car, wait);
    }

    if close_to_other_car(car, sim) {
        return ControlDecision::coast(car, wait);
    }

    let host = sim.host();
    let ahead = host.position().x > car.position().x
        && host.position().x < car.position().x + 4.0 * car::LENGTH;
    let yields = car.agent().map_or(false, |a| a.aggressiveness < 1.0);

    let accel = if ahead && yields {
        // Conservative drivers ease off to follow rather than push.
        car.limits().friction
    } else {
        car.limits().max_accel
    };

    ControlDecision {
        control: Control {
            accel,
            wheel_angle: 0.0,
            hold: false,
        },
        wait,
        node_id: car.node_id,
        prev: car.prev,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{Direction, Layout, LayoutAttributes};
    use crate::simulation::Simulation;

    fn crossing() -> Simulation {
        let layout = Layout::new(&LayoutAttributes {
            width: 600.0,
            height: 120.0,
            tile_size: 30.0,
            blocks: &[],
            lines: &[],
            intersections: &[[240.0, 0.0, 360.0, 120.0]],
            host_graph: &[],
            agent_graph: &[],
            start: [45.0, 60.0],
            finish: [540.0, 30.0, 600.0, 90.0],
            host_dir: Direction::East,
            agent_spawns: &[],
        });
        Simulation::new(layout)
    }

    /// Drives the wait-state machine while inside an intersection and
    /// counts held ticks.
    fn run_holds(sim: &mut Simulation, ticks: usize) -> usize {
        let mut held = 0;
        for _ in 0..ticks {
            let car = sim.host();
            let (wait, holding) = wait_transition(car, sim);
            if holding {
                held += 1;
            }
            sim.host_mut().wait = wait;
        }
        held
    }

    #[test]
    fn intersection_hold_lasts_exactly_thirty_ticks() {
        let mut sim = crossing();
        sim.teleport_host(Point2d::new(300.0, 60.0));

        // The car sits inside the intersection the whole time: one
        // hold of exactly HOLD_TICKS, no reset, no extension.
        let held = run_holds(&mut sim, 100);
        assert_eq!(held, HOLD_TICKS as usize);
        assert_eq!(sim.host().wait_state(), WaitState::Released);
    }

    #[test]
    fn leaving_the_intersection_rearms_the_hold() {
        let mut sim = crossing();
        sim.teleport_host(Point2d::new(300.0, 60.0));
        run_holds(&mut sim, 40);
        assert_eq!(sim.host().wait_state(), WaitState::Released);

        // Well clear of the region: the latch releases.
        sim.teleport_host(Point2d::new(45.0, 60.0));
        run_holds(&mut sim, 1);
        assert_eq!(sim.host().wait_state(), WaitState::Driving);

        // A second entry triggers a second hold.
        sim.teleport_host(Point2d::new(300.0, 60.0));
        let held = run_holds(&mut sim, 40);
        assert_eq!(held, HOLD_TICKS as usize);
    }

    #[test]
    fn host_steers_toward_next_waypoint() {
        let sim = crossing();
        let path = vec![
            Point2d::new(45.0, 60.0),
            Point2d::new(75.0, 75.0),
            Point2d::new(105.0, 90.0),
        ];
        let decision = host_control(sim.host(), &sim, &path, None);

        assert!(!decision.control.hold);
        assert!(decision.control.accel > 0.0);
        // The waypoint is up and to the right of an east-facing car.
        assert!(decision.control.wheel_angle > 0.0);
    }

    #[test]
    fn empty_path_coasts() {
        let sim = crossing();
        let decision = host_control(sim.host(), &sim, &[], None);
        assert!(!decision.control.hold);
        assert_eq!(decision.control.accel, 0.0);
    }
}
