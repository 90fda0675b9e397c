pub mod consolidate;
pub mod db;
pub mod models;
pub mod report;
pub mod stats;
