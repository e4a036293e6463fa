//! Integration tests for ducklake-provision
//!
//! These tests spawn the actual binary and test end-to-end behavior. None
//! of them reach a remote host: every run either stops before connecting
//! or plans against a saved snapshot.

mod cli_tests;
mod config_command;
mod offline_plan;
