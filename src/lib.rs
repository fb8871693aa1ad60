//! Product catalog import into ERPNext
//!
//! Source files (delimited text or BMEcat XML) are mapped onto the target
//! field catalog, transformed field by field, grouped into a category
//! hierarchy and written in batches through a [`api::RemoteCatalog`].

pub mod api;
pub mod catalog;
pub mod category;
pub mod cli;
pub mod commands;
pub mod config;
pub mod images;
pub mod import;
pub mod mapping;
pub mod source;
pub mod transform;
