use car_sim::{Direction, Layout, LayoutAttributes, Simulation};
use std::time::Instant;

fn main() {
    let layout = Layout::new(&LayoutAttributes {
        width: 900.0,
        height: 300.0,
        tile_size: 30.0,
        blocks: &[[0.0, 0.0, 900.0, 90.0], [0.0, 210.0, 900.0, 300.0]],
        lines: &[],
        intersections: &[[420.0, 90.0, 480.0, 210.0]],
        host_graph: &[],
        agent_graph: &[],
        start: [45.0, 150.0],
        finish: [840.0, 105.0, 900.0, 195.0],
        host_dir: Direction::East,
        agent_spawns: &[[300.0, 170.0], [600.0, 130.0]],
    });

    let mut sim = Simulation::new(layout);
    sim.randomise_driver_styles(0.3);

    println!("Simulating...");
    let max_frames = 2000;
    let start = Instant::now();
    while sim.frame() < max_frames {
        sim.step();
        if sim.check_victory() {
            break;
        }
    }
    let elapsed = start.elapsed();

    println!(
        "{} after {} frames ({:?}/frame, {} cars)",
        if sim.check_victory() {
            "Reached the finish"
        } else {
            "Timed out"
        },
        sim.frame(),
        elapsed / sim.frame().max(1) as u32,
        sim.iter_cars().count(),
    );
}
