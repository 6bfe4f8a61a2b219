//! Sandbox implementations available to the CLI

mod local;

pub use local::LocalSandbox;
