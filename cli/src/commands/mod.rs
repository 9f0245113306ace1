pub mod changes;
pub mod config;
pub mod format;
pub mod logs;
pub mod record;
pub mod records;
pub mod series;
pub mod sessions;
pub mod steps;
pub mod summary;
pub mod weight;
