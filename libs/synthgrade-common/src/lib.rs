pub mod config;
pub mod pyliteral;
pub mod store;
pub mod tally;
pub mod testcase;
pub mod types;
