//! Test fixtures for shift-trips.
//!
//! Provides:
//! - Synthetic GPS traces (drives, dwells, gaps) built in kilometers
//! - Scripted HTTP transports standing in for the routing service

#![allow(dead_code)]

pub mod mock_osrm;
pub mod synthetic;

pub use mock_osrm::*;
pub use synthetic::*;
