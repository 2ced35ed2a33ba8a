//! Configuration loading.
//!
//! Reads the sequence document and the per-group operation documents,
//! validating their structure before handing typed values to the executor.

mod operations;
mod sequence;
mod validation;

use std::path::Path;

pub use operations::{load_operations, parse_operations};
pub use sequence::{
    OperationGroup, ProviderKind, SequenceConfig, TaskRef, load_sequence, parse_sequence,
};
pub use validation::ValidationError;

/// Upper bound of the random range used when a count of `0` has no candidate set.
pub const RANDOM_COUNT_CAP: u32 = 100;

fn ensure_xml_file(path: &Path, what: &str) -> crate::Result<()> {
    if !path.is_file() {
        return Err(crate::Error::Config(format!(
            "{what} file {} does not exist",
            path.display()
        )));
    }
    let is_xml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
    if !is_xml {
        return Err(crate::Error::Config(format!(
            "{what} file {} is not an XML file",
            path.display()
        )));
    }
    Ok(())
}
