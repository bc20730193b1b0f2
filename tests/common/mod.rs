//! Shared test helpers for the unit, proptest and functional suites.

#![allow(dead_code)]

pub mod fixtures;
