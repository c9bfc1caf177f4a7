pub mod config;
pub mod notify_test;
pub mod run;
pub mod simulate;
