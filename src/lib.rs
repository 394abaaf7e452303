pub mod cli;
pub mod compactor;
pub mod config;
pub mod console;
pub mod desk;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod repository;
pub mod tenant;
pub mod wal;
