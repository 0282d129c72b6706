//! wikibatch: batch-upload toolkit for wiki media repositories
//!
//! Maps institution-supplied CSV metadata into formatted description pages,
//! categories and structured-data statements, then uploads the files through
//! the MediaWiki action API. The pieces:
//! - Pipe-delimited CSV parsing with non-unique and list columns
//! - On-wiki mapping lists (name -> category/link/creator) mirrored to JSON
//! - Info-template / filename / category generation per media file
//! - File preparation (rename + side-car `.info` pages)
//! - Chunked uploads with warning routing and SDC statement attachment

pub mod api;
pub mod common;
pub mod config;
pub mod csv;
pub mod dates;
pub mod makeinfo;
pub mod mappings;
pub mod post;
pub mod prep;
pub mod sdc;
pub mod template;
pub mod text;
pub mod upload;

pub use config::Config;
