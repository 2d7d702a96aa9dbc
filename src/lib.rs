pub mod cli;
pub mod config;
pub mod persistence;
pub mod server;
pub mod simulation;
pub mod weather;
