//! Storage glue: CSV tables in and out, JSON manifests in and out.

pub mod csv;
pub mod json;

pub use csv::{parse_csv_table, read_csv, write_csv};
pub use json::{manifest_from_str, manifest_to_string, read_manifest, write_manifest};
