//! Deterministic minion-to-job dispatch core: job board, candidate
//! generation, batched path requests, and the per-minion assignment state
//! machine, driven by a fixed-order tick loop.

pub mod board;
pub mod job;
pub mod nav;
pub mod pathfinder;
pub mod world;
