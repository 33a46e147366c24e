pub mod blackbox;
pub mod catalog;
pub mod cell;
pub mod config;
pub mod error;
pub mod library;
pub mod pin;
pub mod timing;
pub mod types;

pub use catalog::{Archetype, OperationCatalog};
pub use cell::{build_cell, CellInstance, CellModel};
pub use config::LibraryConfig;
pub use error::{Diagnostics, LibError, LogDiagnostics, Result};
pub use library::LibraryAssembler;

use libertree::Group;
use std::fs::read_to_string;

/// The catalog named in the configuration, or the built-in one.
pub fn load_catalog(config: &LibraryConfig) -> Result<OperationCatalog> {
    match &config.catalog {
        Some(path) => OperationCatalog::from_json(&read_to_string(path)?),
        None => Ok(OperationCatalog::builtin()),
    }
}

/// The base library named in the configuration, decoded.
pub fn load_base_library(config: &LibraryConfig) -> Result<Option<Group>> {
    let Some(path) = &config.base_library else {
        return Ok(None);
    };
    let json: serde_json::Value = serde_json::from_str(&read_to_string(path)?)?;
    Ok(Some(libertree::decode(&json)))
}

/// Build every cell and assemble the library tree.
pub fn assemble(
    cells: &[CellInstance],
    config: &LibraryConfig,
    catalog: &OperationCatalog,
    base: Option<&Group>,
    diag: &mut impl Diagnostics,
) -> Group {
    let mut assembler = match base {
        Some(base) => LibraryAssembler::with_base(config, base),
        None => LibraryAssembler::new(config),
    };
    assembler.add_instances(cells, catalog, diag);
    assembler.finish()
}

/// Liberty text for a set of cells, with everything the
/// configuration refers to loaded from disk.
pub fn generate(cells: &[CellInstance], config: &LibraryConfig, diag: &mut impl Diagnostics) -> Result<String> {
    let catalog = load_catalog(config)?;
    let base = load_base_library(config)?;
    let tree = assemble(cells, config, &catalog, base.as_ref(), diag);
    Ok(libertree::encode_with_indent(&tree, config.indent))
}
