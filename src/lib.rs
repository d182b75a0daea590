pub mod config;
pub mod detect;
pub mod extract;
pub mod fetch;
pub mod history;
pub mod logging;
pub mod process;
pub mod schedule;
pub mod unpack;
