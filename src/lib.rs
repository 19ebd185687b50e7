pub mod config;
pub mod controller;
pub mod error;
pub mod execution;
pub mod factor;
pub mod market_data;
pub mod model;
pub mod optimizer;
pub mod runner;
pub mod schedule;
pub mod selection;
pub mod universe;
