//! Pipeline catalogs backed by external ETL commands.

pub mod catalog;
pub mod command;
pub mod warehouse;

pub use catalog::{CatalogFile, PipelineEntry};
pub use command::CommandWork;
pub use warehouse::default_catalog;
