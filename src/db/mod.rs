pub mod cache;
pub mod db;
pub mod memorydb;
pub mod reviewdb;
