//! Test Helper Utilities
//!
//! Shared utilities for testing triptych-curator

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{create_test_db, sample_bundle, seed_arc, seed_delivered_bundles, seed_exposure};
pub use fakes::{
    build_orchestrator, build_orchestrator_with, standard_generator, FakeResolver,
    ScriptedGenerator,
};
