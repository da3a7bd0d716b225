use crate::collision::{obb_overlap, Corners};
use crate::inference::MarginalInference;
use crate::math::{normalize_or, rot90, rotate_deg, Point2d, Vector2d};
use crate::CarId;
use arrayvec::ArrayVec;
use cgmath::prelude::*;

/// A car's length in world units.
pub const LENGTH: f64 = 40.0;

/// A car's width in world units.
pub const WIDTH: f64 = 20.0;

/// Capacity of an agent's observation history.
pub const HISTORY_LEN: usize = 11;

/// The radius of the circle bounding a car, used for the collision fast-reject.
pub fn bounding_radius() -> f64 {
    LENGTH.hypot(WIDTH)
}

/// The kinematic limits of a car.
#[derive(Clone, Copy, Debug)]
pub struct CarLimits {
    /// The maximum speed in world units per tick.
    pub max_speed: f64,
    /// The speed lost to friction each tick.
    pub friction: f64,
    /// The maximum wheel deflection in degrees.
    pub max_wheel_angle: f64,
    /// The maximum speed gained in one tick.
    pub max_accel: f64,
    /// Deceleration does not push the speed below this floor;
    /// only an explicit stop zeroes the velocity.
    pub min_speed: f64,
}

impl CarLimits {
    /// The limits of the player-directed host car.
    pub fn host() -> Self {
        Self {
            max_speed: 3.0,
            friction: 1.0,
            max_wheel_angle: 45.0,
            max_accel: 1.5,
            min_speed: 1.0,
        }
    }

    /// The limits of an autonomous agent car.
    pub fn agent() -> Self {
        Self {
            max_accel: 1.4,
            ..Self::host()
        }
    }
}

/// The per-agent state carried by [CarKind::Agent].
#[derive(Clone, Debug)]
pub struct AgentState {
    /// Bounded FIFO of observed speed magnitudes, newest last.
    pub(crate) history: ArrayVec<f64, HISTORY_LEN>,
    /// Lazily constructed intention estimator.
    pub(crate) inference: Option<MarginalInference>,
    /// Driver style factor; below 1.0 the agent yields to the host.
    pub(crate) aggressiveness: f64,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            history: ArrayVec::new(),
            inference: None,
            aggressiveness: 1.0,
        }
    }
}

impl AgentState {
    /// Appends an observation, evicting the oldest when full.
    pub(crate) fn record(&mut self, observation: f64) {
        if self.history.is_full() {
            self.history.remove(0);
        }
        self.history.push(observation);
    }

    /// The recorded observations, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// The intention estimator, once observations have seeded it.
    pub fn inference(&self) -> Option<&MarginalInference> {
        self.inference.as_ref()
    }
}

/// Distinguishes the host from the autonomous agents.
#[derive(Clone, Debug)]
pub enum CarKind {
    Host,
    Agent(AgentState),
}

/// The wait-state machine applied at intersections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitState {
    /// Following the path normally.
    Driving,
    /// Holding still at an intersection for a fixed number of ticks.
    WaitingAtIntersection { ticks: u32 },
    /// Hold served; remains latched until the car leaves the intersection
    /// so one entry triggers exactly one hold.
    Released,
}

/// A simulated car.
#[derive(Clone, Debug)]
pub struct Car {
    /// The car's ID.
    pub(crate) id: CarId,
    /// Host or agent.
    kind: CarKind,
    /// The world space position of the centre of the car.
    pos: Point2d,
    /// A unit vector in world space aligned with the car's heading.
    dir: Vector2d,
    /// The velocity in world units per tick.
    velocity: Vector2d,
    /// The wheel deflection in degrees, clamped to the wheel-angle limit.
    wheel_angle: f64,
    /// The kinematic limits.
    limits: CarLimits,
    /// The intersection wait state.
    pub(crate) wait: WaitState,
    /// The sequential path cursor: index of the current waypoint.
    pub(crate) node_id: usize,
    /// The previous value of the path cursor.
    pub(crate) prev: usize,
}

impl Car {
    /// Creates a new car.
    pub(crate) fn new(
        id: CarId,
        kind: CarKind,
        pos: Point2d,
        dir: Vector2d,
        limits: CarLimits,
    ) -> Self {
        Self {
            id,
            kind,
            pos,
            dir: normalize_or(dir, Vector2d::new(1.0, 0.0)),
            velocity: Vector2d::new(0.0, 0.0),
            wheel_angle: 0.0,
            limits,
            wait: WaitState::Driving,
            node_id: 0,
            prev: 0,
        }
    }

    /// Gets the car's ID.
    pub fn id(&self) -> CarId {
        self.id
    }

    /// Host or agent.
    pub fn kind(&self) -> &CarKind {
        &self.kind
    }

    /// Whether this is the host car.
    pub fn is_host(&self) -> bool {
        matches!(self.kind, CarKind::Host)
    }

    /// The agent state, if this is an agent.
    pub fn agent(&self) -> Option<&AgentState> {
        match &self.kind {
            CarKind::Agent(agent) => Some(agent),
            CarKind::Host => None,
        }
    }

    pub(crate) fn agent_mut(&mut self) -> Option<&mut AgentState> {
        match &mut self.kind {
            CarKind::Agent(agent) => Some(agent),
            CarKind::Host => None,
        }
    }

    /// The world space coordinates of the centre of the car.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: Point2d) {
        self.pos = pos;
    }

    /// A unit vector in world space aligned with the car's heading.
    pub fn direction(&self) -> Vector2d {
        self.dir
    }

    /// The velocity in world units per tick.
    pub fn velocity(&self) -> Vector2d {
        self.velocity
    }

    /// The current speed.
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    /// The wheel deflection in degrees.
    pub fn wheel_angle(&self) -> f64 {
        self.wheel_angle
    }

    /// The kinematic limits.
    pub fn limits(&self) -> &CarLimits {
        &self.limits
    }

    /// The intersection wait state.
    pub fn wait_state(&self) -> WaitState {
        self.wait
    }

    /// Sets the wheel deflection, clamped to the wheel-angle limit.
    pub fn set_wheel_angle(&mut self, angle: f64) {
        let max = self.limits.max_wheel_angle;
        self.wheel_angle = angle.clamp(-max, max);
    }

    /// Accelerates along the heading. Negative amounts decelerate.
    /// The resulting speed is clamped to the maximum.
    pub fn accelerate(&mut self, amount: f64) {
        let amount = amount.min(self.limits.max_accel);
        if amount < 0.0 {
            return self.decelerate(-amount);
        }
        if amount == 0.0 {
            return;
        }

        self.velocity += self.dir * amount;
        let speed = self.velocity.magnitude();
        if speed > self.limits.max_speed {
            self.velocity *= self.limits.max_speed / speed;
        }
    }

    /// Reduces speed along the current velocity. The speed floors at
    /// `min_speed`; a car already at or below the floor keeps rolling.
    pub fn decelerate(&mut self, amount: f64) {
        let speed = self.velocity.magnitude();
        if speed <= self.limits.min_speed {
            return;
        }

        let new_speed = speed - amount;
        if new_speed <= 0.0 {
            self.velocity = Vector2d::new(0.0, 0.0);
        } else {
            self.velocity *= new_speed / speed;
        }
    }

    /// Replaces the velocity with the given speed along the heading.
    /// Planning and the intersection hold use this; normal driving
    /// goes through [Self::accelerate].
    pub fn set_forward_velocity(&mut self, amount: f64) {
        self.velocity = self.dir * amount;
    }

    /// Advances the car one tick: the body turns toward the wheels,
    /// the position integrates the velocity, the wheels relax straight
    /// and friction decays the speed.
    pub fn update(&mut self) {
        self.turn_car_towards_wheels();
        self.pos += self.velocity;
        // The controller issues a fresh deflection every tick.
        self.wheel_angle = 0.0;
        self.decelerate(self.limits.friction);
    }

    /// Rotates the velocity (and heading) by the wheel deflection.
    fn turn_car_towards_wheels(&mut self) {
        if self.velocity.magnitude2() > 0.0 {
            self.velocity = rotate_deg(self.velocity, self.wheel_angle);
            self.dir = normalize_or(self.velocity, self.dir);
        }
    }

    /// The four corners of the car's oriented bounding rectangle.
    pub fn bounds(&self) -> Corners {
        let f = self.dir * (LENGTH / 2.0);
        let p = rot90(self.dir) * (WIDTH / 2.0);
        [
            self.pos + f + p,
            self.pos + f - p,
            self.pos - f + p,
            self.pos - f - p,
        ]
    }

    /// Returns true iff this car's bounding rectangle overlaps the other's.
    pub fn collides(&self, other_pos: Point2d, other_bounds: &Corners) -> bool {
        if self.pos.distance(other_pos) > 2.0 * bounding_radius() {
            return false;
        }
        obb_overlap(&self.bounds(), other_bounds)
    }
}
