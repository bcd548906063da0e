//! Garbage Fleet Simulation Library
//!
//! A garbage-collection fleet simulation on a toroidal road grid that runs
//! headless from the console.

pub mod simulation;
