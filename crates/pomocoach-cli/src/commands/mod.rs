pub mod config;
pub mod defaults;
pub mod run;
