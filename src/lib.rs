pub mod announce;
pub mod clock;
pub mod constants;
pub mod engine;
pub mod modes;
pub mod point;
pub mod proximity;
pub mod round;
pub mod round_log;
pub mod sensing;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
