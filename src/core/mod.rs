//! Core modules: the contract model, the validator, boundary enforcement and
//! the gate library, plus the shared primitives they build on.

pub mod assets;
pub mod boundary;
pub mod checksum;
pub mod config;
pub mod contracts;
pub mod error;
pub mod gates;
pub mod output;
pub mod payload;
pub mod schemas;
pub mod time;
pub mod trace;
pub mod validate;
