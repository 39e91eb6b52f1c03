//! End-to-end tests of the public store API

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod properties;
mod scenarios;
