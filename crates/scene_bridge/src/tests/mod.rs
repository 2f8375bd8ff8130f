//! Scenario tests driving a whole bridge against the headless engine

mod resources;
mod teardown;
