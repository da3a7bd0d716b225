use crate::car::{AgentState, Car, CarKind, CarLimits};
use crate::control::{self, ControlDecision};
use crate::debug::debug_path;
use crate::decision::{close_to_other_car, DecisionMaker};
use crate::inference::MarginalInference;
use crate::layout::{Block, Direction, Layout};
use crate::math::Point2d;
use crate::spatial::WaypointIndex;
use crate::{CarId, CarSet};
use cgmath::prelude::*;
use log::debug;
use rand_distr::Distribution;

/// The host's active plan: the path being followed and the spatial
/// index built over its waypoints.
#[derive(Clone, Debug, Default)]
pub struct HostPlan {
    /// The planned waypoints, start first.
    pub path: Vec<Point2d>,
    /// Nearest-waypoint index; `None` until a path with at least two
    /// waypoints is planned.
    pub index: Option<WaypointIndex>,
    /// The frame the plan was produced on.
    pub planned_at: usize,
}

/// A driving simulation: a host car navigating a tile-based layout
/// among autonomous agent cars.
#[derive(Clone)]
pub struct Simulation {
    /// The static level geometry.
    layout: Layout,
    /// The cars being simulated. The host is always present; agents
    /// come from the layout's spawn list.
    cars: CarSet,
    /// The host car's ID.
    host: CarId,
    /// The agent cars, in spawn order. Belief estimators are keyed by
    /// position in this list.
    others: Vec<CarId>,
    /// The host's active plan.
    plan: HostPlan,
    /// The host's planner.
    decision: DecisionMaker,
    /// The goal position, the centre of the finish region.
    goal: Point2d,
    /// The current frame of simulation.
    frame: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a simulation from a layout: the host at the start cell
    /// facing the layout's host direction, one agent per spawn point
    /// facing east.
    pub fn new(layout: Layout) -> Self {
        let mut cars = CarSet::default();
        let host = cars.insert_with_key(|id| {
            Car::new(
                id,
                CarKind::Host,
                layout.start(),
                layout.host_dir().unit(),
                CarLimits::host(),
            )
        });
        let others = layout
            .agent_spawns()
            .iter()
            .map(|pos| {
                cars.insert_with_key(|id| {
                    Car::new(
                        id,
                        CarKind::Agent(AgentState::default()),
                        *pos,
                        Direction::East.unit(),
                        CarLimits::agent(),
                    )
                })
            })
            .collect();
        let goal = layout.finish().center();

        Self {
            layout,
            cars,
            host,
            others,
            plan: HostPlan::default(),
            decision: DecisionMaker::default(),
            goal,
            frame: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Randomly assigns a driver style factor to each agent, sampled
    /// from a normal distribution with a mean of 1 (neutral) and
    /// standard deviation of `stddev`. Agents below 1 yield to a host
    /// driving ahead of them.
    pub fn randomise_driver_styles(&mut self, stddev: f64) {
        let mut rand = rand::thread_rng();
        let distr = rand_distr::Normal::new(1.0, stddev).expect("Invalid standard deviation");
        for id in &self.others {
            let factor: f64 = distr.sample(&mut rand).clamp(0.25, 1.75);
            if let Some(agent) = self.cars[*id].agent_mut() {
                agent.aggressiveness = factor;
            }
        }
    }

    /// Advances the simulation by one tick: record observations,
    /// replan the host when its plan is stale, compute every car's
    /// control against the frozen snapshot, then apply and integrate.
    pub fn step(&mut self) {
        self.record_observations();
        self.replan_host();
        let decisions = self.compute_controls();
        self.apply_controls(decisions);
        self.integrate();
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = crate::debug::take_debug_frame();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The static level geometry.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The goal position the host plans toward.
    pub fn goal(&self) -> Point2d {
        self.goal
    }

    /// The host's active plan.
    pub fn plan(&self) -> &HostPlan {
        &self.plan
    }

    /// The host car's ID.
    pub fn host_id(&self) -> CarId {
        self.host
    }

    /// Gets a reference to the host car.
    pub fn host(&self) -> &Car {
        &self.cars[self.host]
    }

    pub(crate) fn host_mut(&mut self) -> &mut Car {
        &mut self.cars[self.host]
    }

    /// Gets a reference to the car with the given ID.
    pub fn get_car(&self, id: CarId) -> &Car {
        &self.cars[id]
    }

    /// Returns an iterator over all the cars in the simulation.
    pub fn iter_cars(&self) -> impl Iterator<Item = &Car> {
        self.cars.values()
    }

    /// The agent cars' IDs, in spawn order.
    pub fn other_car_ids(&self) -> impl Iterator<Item = CarId> + '_ {
        self.others.iter().copied()
    }

    /// Repositions the host; intended for scenario setup.
    pub fn teleport_host(&mut self, pos: Point2d) {
        self.cars[self.host].set_position(pos);
    }

    /// Returns true if the point is inside the drivable area and
    /// outside every block.
    pub fn in_bounds(&self, x: f64, y: f64) -> bool {
        if x < 0.0 || x >= self.layout.width() || y < 0.0 || y >= self.layout.height() {
            return false;
        }
        !self.layout.blocks().iter().any(|b| b.contains_point(x, y))
    }

    /// Like [Self::in_bounds], but with blocks inflated by the
    /// planning margin; the search plans against this.
    pub fn in_bounds_larger(&self, x: f64, y: f64) -> bool {
        if x < 0.0 || x >= self.layout.width() || y < 0.0 || y >= self.layout.height() {
            return false;
        }
        !self
            .layout
            .blocks()
            .iter()
            .any(|b| b.contains_point_larger(x, y))
    }

    /// Returns true if the point lies inside an intersection region.
    pub fn in_intersection(&self, x: f64, y: f64) -> bool {
        self.intersection_at(x, y).is_some()
    }

    /// The intersection region containing the point, if any.
    pub fn intersection_at(&self, x: f64, y: f64) -> Option<&Block> {
        self.layout
            .intersections()
            .iter()
            .find(|b| b.contains_point(x, y))
    }

    /// Returns true if the car is out of bounds or overlapping
    /// another car.
    pub fn check_collision(&self, id: CarId) -> bool {
        let car = &self.cars[id];
        let bounds = car.bounds();
        if bounds.iter().any(|p| !self.in_bounds(p.x, p.y)) {
            return true;
        }

        self.cars
            .values()
            .filter(|other| other.id() != id)
            .any(|other| other.collides(car.position(), &bounds))
    }

    /// Returns true once any corner of the host lies in the finish
    /// region.
    pub fn check_victory(&self) -> bool {
        self.host()
            .bounds()
            .iter()
            .any(|p| self.layout.finish().contains_point(p.x, p.y))
    }

    /// Proximity predicate for the given car.
    /// [Read more](DecisionMaker::is_close_to_other_car).
    pub fn is_close_to_other_car(&self, id: CarId) -> bool {
        close_to_other_car(&self.cars[id], self)
    }

    /// Gets the debugging information for the previously simulated frame.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Appends each agent's observed speed magnitude to its bounded
    /// history and folds it into that agent's belief estimator,
    /// constructing the estimator on first use.
    fn record_observations(&mut self) {
        for (slot, id) in self.others.clone().iter().enumerate() {
            let Some(car) = self.cars.get_mut(*id) else {
                continue;
            };
            let observation = car.velocity().magnitude().max(0.0);
            let max_speed = car.limits().max_speed;
            if let Some(agent) = car.agent_mut() {
                agent.record(observation);
                agent
                    .inference
                    .get_or_insert_with(|| MarginalInference::new(slot, max_speed))
                    .observe(observation);
            }
        }
    }

    /// The most likely intention index per agent, in spawn order.
    fn car_intentions(&self) -> Vec<usize> {
        self.others
            .iter()
            .map(|id| {
                self.cars[*id]
                    .agent()
                    .and_then(|a| a.inference.as_ref())
                    .map(|inf| inf.most_likely())
                    .unwrap_or(1)
            })
            .collect()
    }

    /// Replans the host's path when the decision maker deems the held
    /// plan stale. A failed plan leaves the host with an empty path,
    /// which the control policy treats as "hold still".
    fn replan_host(&mut self) {
        let age = self.frame - self.plan.planned_at;
        let decision = self.decision.clone();
        if !decision.is_change_required(self, &self.plan.path, age) {
            return;
        }

        let intentions = self.car_intentions();
        let mut path = Vec::new();
        if decision.get_path(self, &mut path, &intentions) {
            debug_path("host plan", &path);
            let index = (path.len() > 1).then(|| WaypointIndex::build(&path));
            self.plan = HostPlan {
                path,
                index,
                planned_at: self.frame,
            };
        } else {
            debug!("replanning failed, host will hold");
            self.plan = HostPlan {
                planned_at: self.frame,
                ..Default::default()
            };
        }
    }

    /// Computes every car's control against the frozen snapshot.
    /// Planning purity holds by construction: the snapshot is borrowed
    /// immutably for the whole pass.
    fn compute_controls(&self) -> Vec<(CarId, ControlDecision)> {
        let mut decisions = Vec::with_capacity(self.cars.len());
        decisions.push((
            self.host,
            control::host_control(
                self.host(),
                self,
                &self.plan.path,
                self.plan.index.as_ref(),
            ),
        ));
        for id in &self.others {
            if let Some(car) = self.cars.get(*id) {
                decisions.push((*id, control::agent_control(car, self)));
            }
        }
        decisions
    }

    /// Applies the computed controls to the cars.
    fn apply_controls(&mut self, decisions: Vec<(CarId, ControlDecision)>) {
        for (id, decision) in decisions {
            let Some(car) = self.cars.get_mut(id) else {
                continue;
            };
            car.wait = decision.wait;
            car.node_id = decision.node_id;
            car.prev = decision.prev;
            if decision.control.hold {
                car.set_forward_velocity(0.0);
            }
            car.set_wheel_angle(decision.control.wheel_angle);
            car.accelerate(decision.control.accel);
        }
    }

    /// Advances every car one tick.
    fn integrate(&mut self) {
        for (_, car) in &mut self.cars {
            car.update();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::LayoutAttributes;

    fn two_car_layout() -> Layout {
        Layout::new(&LayoutAttributes {
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
            agent_spawns: &[[300.0, 90.0]],
        })
    }

    #[test]
    fn spawns_host_and_agents() {
        let sim = Simulation::new(two_car_layout());
        assert_eq!(sim.iter_cars().count(), 2);
        assert!(sim.host().is_host());
        assert_eq!(sim.other_car_ids().count(), 1);
    }

    #[test]
    fn observations_accumulate_per_tick() {
        let mut sim = Simulation::new(two_car_layout());
        for _ in 0..3 {
            sim.step();
        }
        let agent_id = sim.other_car_ids().next().unwrap();
        let agent = sim.get_car(agent_id).agent().unwrap();
        assert_eq!(agent.history().len(), 3);
    }

    #[test]
    fn bounds_queries() {
        let sim = Simulation::new(two_car_layout());
        assert!(sim.in_bounds(10.0, 10.0));
        assert!(!sim.in_bounds(-1.0, 10.0));
        assert!(!sim.in_bounds(10.0, 120.0));
    }

    #[test]
    fn overlapping_cars_collide() {
        let mut sim = Simulation::new(two_car_layout());
        let agent_id = sim.other_car_ids().next().unwrap();
        let agent_pos = sim.get_car(agent_id).position();
        sim.teleport_host(agent_pos + crate::math::Vector2d::new(10.0, 0.0));
        assert!(sim.check_collision(sim.host_id()));
        assert!(sim.check_collision(agent_id));
    }

    #[test]
    fn victory_at_the_finish() {
        let mut sim = Simulation::new(two_car_layout());
        assert!(!sim.check_victory());
        sim.teleport_host(Point2d::new(570.0, 60.0));
        assert!(sim.check_victory());
    }
}
