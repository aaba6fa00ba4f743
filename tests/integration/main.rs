//! Integration tests for flywheel

mod controller_test;
mod e2e_test;
mod failover_test;
