pub mod record_store;
pub mod token_file;

pub use record_store::SqliteRecordStore;
pub use token_file::TokenFile;
