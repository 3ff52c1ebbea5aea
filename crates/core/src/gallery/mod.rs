pub mod collection_store;
pub mod domain;
pub mod infrastructure;
