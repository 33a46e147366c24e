//! Folds cell models into one library tree.

use crate::catalog::OperationCatalog;
use crate::cell::{build_cell, CellInstance, CellModel};
use crate::config::LibraryConfig;
use crate::error::{Diagnostics, LibError};
use crate::pin::bus_type;
use libertree::{AttrValue, Group};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// Delay tables that get an `lu_table_template` when not scalar.
pub const DELAY_TABLES: [&str; 4] = ["cell_rise", "cell_fall", "rise_transition", "fall_transition"];

/// `type (busN)` describing an `N`-bit descending bus.
pub fn bus_type_group(width: usize) -> Group {
    Group::new()
        .with_attr("base_type", "array")
        .with_attr("data_type", "bit")
        .with_attr("bit_width", width)
        .with_attr("bit_from", width.saturating_sub(1))
        .with_attr("bit_to", 0usize)
        .with_attr("downto", true)
}

fn table_size(table: &Group, index: &str) -> usize {
    table.attr(index).and_then(AttrValue::as_list).map_or(0, |l| l.len())
}

/// `delay_template_NxM` for every non-scalar delay table of the cells.
pub fn delay_templates(library: &Group) -> FxHashMap<String, Group> {
    let mut templates = FxHashMap::default();
    for (_, cell) in library.named("cell") {
        for (_, pin) in cell.named("pin").chain(cell.named("bus")) {
            for timing in pin.groups("timing") {
                for metric in DELAY_TABLES {
                    let Some(tables) = timing.group(metric) else {
                        continue;
                    };
                    if tables.groups.contains_key("scalar") {
                        continue;
                    }
                    for table in tables.groups.values().flatten() {
                        let (rows, cols) = (table_size(table, "index_1"), table_size(table, "index_2"));
                        let template = Group::new()
                            .with_attr("variable_1", "input_net_transition")
                            .with_attr("variable_2", "total_output_net_capacitance")
                            .with_attr("index_1", (0..rows).collect::<Vec<usize>>())
                            .with_attr("index_2", (0..cols).collect::<Vec<usize>>());
                        templates.insert(format!("delay_template_{}x{}", rows, cols), template);
                    }
                }
            }
        }
    }
    templates
}

/// Collects cells, then lays out the `library` group:
/// header attributes, bus types, table templates, cells.
pub struct LibraryAssembler {
    name: String,
    bus_types: bool,
    /// Header attributes and whatever the base library brings along
    body: Group,
    cells: Vec<(String, Group)>,
    cell_names: FxHashSet<String>,
    bus_widths: FxHashSet<usize>,
}

impl LibraryAssembler {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            name: config.name.clone(),
            bus_types: config.bus_types,
            body: config.header(),
            cells: Vec::new(),
            cell_names: FxHashSet::default(),
            bus_widths: FxHashSet::default(),
        }
    }

    /// Start from the first library of an existing tree. Its attributes
    /// win over the configured header; its cells keep their names.
    pub fn with_base(config: &LibraryConfig, base: &Group) -> Self {
        let mut assembler = Self::new(config);
        let Some((name, body)) = base.named("library").next() else {
            log::warn!("Base library has no library group, ignoring it");
            return assembler;
        };
        let header = std::mem::replace(&mut assembler.body, body.clone());
        for (key, value) in header.attributes {
            assembler.body.attributes.entry(key).or_insert(value);
        }
        assembler.name = name.to_string();
        assembler.cell_names.extend(body.named("cell").map(|(n, _)| n.to_string()));
        log::info!("Base library {} with {} cells", name, assembler.cell_names.len());
        assembler
    }

    pub fn len(&self) -> usize {
        self.cell_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_names.is_empty()
    }

    /// Add a cell group; a name already taken is reported and skipped.
    pub fn add_cell(&mut self, name: &str, cell: Group, diag: &mut impl Diagnostics) -> bool {
        if !self.cell_names.insert(name.to_string()) {
            diag.report(LibError::DuplicateCellName(name.to_string()));
            return false;
        }
        self.cells.push((name.to_string(), cell));
        true
    }

    pub fn add_model(&mut self, model: &CellModel, diag: &mut impl Diagnostics) -> bool {
        let added = self.add_cell(&model.name, model.to_group(), diag);
        if added {
            self.bus_widths.extend(model.ports.values().filter_map(|p| p.bus_width()));
        }
        added
    }

    /// Build every instance in parallel and add them in input order.
    /// A cell that cannot be built is reported and skipped.
    pub fn add_instances(
        &mut self,
        cells: &[CellInstance],
        catalog: &OperationCatalog,
        diag: &mut impl Diagnostics,
    ) {
        let built = cells
            .par_iter()
            .map(|cell| {
                let mut local: Vec<LibError> = Vec::new();
                let model = build_cell(cell, catalog, &mut local);
                (model, local)
            })
            .collect::<Vec<_>>();

        for (cell, (model, local)) in cells.iter().zip(built) {
            for error in local {
                diag.report(error);
            }
            match model {
                Ok(model) => {
                    self.add_model(&model, diag);
                }
                Err(e) => {
                    log::warn!("Skipping cell {}", cell.name);
                    diag.report(e);
                }
            }
        }
    }

    /// The finished tree, rooted at the `library` mapping.
    pub fn finish(self) -> Group {
        let Self { name, bus_types, body, cells, bus_widths, .. } = self;
        let mut library = Group { attributes: body.attributes.clone(), groups: Default::default() };

        if bus_types {
            let existing: FxHashSet<&str> = body.named("type").map(|(n, _)| n).collect();
            let mut widths = bus_widths
                .into_iter()
                .map(|w| (bus_type(w), w))
                .filter(|(n, _)| !existing.contains(n.as_str()))
                .collect::<Vec<_>>();
            widths.sort_by(|a, b| numeric_sort::cmp(&a.0, &b.0));
            for (type_name, width) in widths {
                library.insert_named("type", type_name, bus_type_group(width));
            }
        }

        let mut all_cells = Group::new();
        for (cell_name, cell) in body.named("cell") {
            all_cells.insert_named("cell", cell_name, cell.clone());
        }
        for (cell_name, cell) in &cells {
            all_cells.insert_named("cell", cell_name.as_str(), cell.clone());
        }
        let existing: FxHashSet<&str> = body.named("lu_table_template").map(|(n, _)| n).collect();
        let mut templates = delay_templates(&all_cells)
            .into_iter()
            .filter(|(n, _)| !existing.contains(n.as_str()))
            .collect::<Vec<_>>();
        templates.sort_by(|a, b| numeric_sort::cmp(&a.0, &b.0));
        for (template_name, template) in templates {
            library.insert_named("lu_table_template", template_name, template);
        }

        for (kind, groups) in body.groups {
            if kind.as_str() != "cell" {
                library.groups.entry(kind).or_default().extend(groups);
            }
        }
        for (kind, groups) in all_cells.groups {
            library.groups.entry(kind).or_default().extend(groups);
        }

        let mut root = Group::new();
        root.insert_named("library", name, library);
        root
    }
}
