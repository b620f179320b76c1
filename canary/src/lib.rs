//! Client for message-producing conformance tests against the Canary test service.
//!
//! A tester picks a jurisdiction, loads a reference test case, declares the
//! message type they intend to produce, hands over the message their system
//! produced and has it scored. The crate is layered:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, mismatch detection,
//!   issue aggregation, result decoding, the session state machine). No I/O.
//! - **[`io`]**: Side-effecting operations (HTTP repository, config, message
//!   files, report rendering). Isolated behind traits for tests.
//!
//! [`controller`] drives a session against a repository; [`flow`] runs the whole
//! sequence in one call for the CLI.

pub mod controller;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod flow;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
