pub use car::{Car, CarKind, CarLimits, WaitState};
pub use cgmath;
pub use decision::{DecisionConfig, DecisionMaker, HostAction};
pub use inference::{Intention, MarginalInference};
pub use layout::{Block, Direction, Layout, LayoutAttributes, Line};
pub use search::{SearchNode, Searcher};
pub use simulation::{HostPlan, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use spatial::{Neighbor, WaypointIndex};
pub use util::Interval;

mod car;
mod collision;
mod control;
mod debug;
mod decision;
mod inference;
mod layout;
pub mod math;
mod search;
mod simulation;
mod spatial;
mod util;

new_key_type! {
    /// Unique ID of a [Car].
    pub struct CarId;
}

type CarSet = SlotMap<CarId, Car>;
