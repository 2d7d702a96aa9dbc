pub mod simulation;

pub use simulation::SimulationConfig;
