pub mod cli;
pub mod config;
pub mod decision;
pub mod discovery;
pub mod error;
pub mod event;
pub mod ipc;
pub mod relay;
pub mod trust;
