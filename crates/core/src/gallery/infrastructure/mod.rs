pub mod json_directory_persistence;
pub mod memory_persistence;
