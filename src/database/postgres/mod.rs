pub mod batch;
pub mod client;
pub mod setup;
pub mod sql_value;
