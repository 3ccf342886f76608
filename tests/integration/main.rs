//! Integration tests for price-bridge

mod bridge_test;
mod config_test;
mod providers_test;
