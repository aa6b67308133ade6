pub mod config;
pub mod scenarios;
pub mod simulate;
pub mod watch;
pub mod zones;
