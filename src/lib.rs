//! # cachicamo
//!
//! A small demo HTTP service: file uploads saved under a deadline, a secret
//! phrase checker and a process-wide visitor counter.
//!
//! The interesting parts are [`runner`], which races a blocking save against
//! a timer, and [`counter`], a mutex-guarded count that never goes negative.

pub mod blob;
pub mod config;
pub mod counter;
pub mod error;
pub mod phrase;
pub mod runner;
pub mod server;
pub mod telemetry;
