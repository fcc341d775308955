// src/core/mod.rs

pub mod arg;
pub mod arg_config;
pub mod collection;
pub mod command;
pub mod completion;
pub mod config;
pub mod errors;
pub mod interpolator;
pub mod naming;
pub mod parameter;
pub mod parser;
pub mod partition;
pub mod run;
pub mod runner;
