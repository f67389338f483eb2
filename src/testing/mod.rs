//! Test support utilities, available to unit and integration tests alike.

pub mod mocks;

pub use mocks::{CapturedPublish, MockBroker};
