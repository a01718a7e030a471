//! Chat overlay frame compiler.
//!
//! Turns a recorded chat transcript into the minimal set of bitmap frames
//! plus an ffconcat timeline that an external encoder composites onto the
//! source video. Planning is sequential; rendering is parallel.

pub mod config;
pub mod fonts;
pub mod frame;
pub mod manifest;
pub mod message;
pub mod render;
pub mod schedule;
pub mod transcript;
