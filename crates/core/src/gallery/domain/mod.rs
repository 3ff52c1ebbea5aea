pub mod distance;
pub mod entry;
pub mod gallery_error;
pub mod gallery_persistence;
