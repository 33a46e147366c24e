//! Port descriptors of library cells, for building blackbox modules.
//!
//! Reads the tree decoded from `liberty2json` output, where the
//! library holds a `groups` sequence of `type` and `cell` entries and
//! every entry names itself with a `names` list.

use crate::error::{Diagnostics, LibError};
use crate::types::Direction;
use libertree::{AttrValue, Group};
use rustc_hash::{FxHashMap, FxHashSet};

/// Power unit strings and their value in Watts.
pub const POWER_UNITS: [(&str, f64); 13] = [
    ("1W", 1.0),
    ("100mW", 1e-1),
    ("10mW", 1e-2),
    ("1mW", 1e-3),
    ("100uW", 1e-4),
    ("10uW", 1e-5),
    ("1uW", 1e-6),
    ("100nW", 1e-7),
    ("10nW", 1e-8),
    ("1nW", 1e-9),
    ("100pW", 1e-10),
    ("10pW", 1e-11),
    ("1pW", 1e-12),
];

pub const DEFAULT_LEAKAGE_POWER_UNIT: &str = "1pW";

/// Watts per unit; an unknown unit is reported and gives 0.
pub fn power_unit_multiplier(unit: &str, diag: &mut impl Diagnostics) -> f64 {
    match POWER_UNITS.iter().find(|(u, _)| *u == unit) {
        Some(&(_, mult)) => mult,
        None => {
            diag.report(LibError::UnknownPowerUnit(unit.to_string()));
            0.0
        }
    }
}

/// Bit range of a bus `type` group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BusType {
    pub bit_width: Option<i64>,
    pub bit_from: i64,
    pub bit_to: i64,
    pub downto: bool,
}

impl BusType {
    fn from_group(group: &Group) -> Self {
        let int = |key: &str| group.attr(key).and_then(AttrValue::as_i64);
        Self {
            bit_width: int("bit_width"),
            bit_from: int("bit_from").unwrap_or(0),
            bit_to: int("bit_to").unwrap_or(0),
            downto: group.attr("downto").is_some_and(truthy),
        }
    }

    pub fn width(&self) -> usize {
        let width = self.bit_width.unwrap_or((self.bit_to - self.bit_from).abs() + 1);
        width.max(0) as usize
    }

    /// Index of the first bit.
    pub fn offset(&self) -> i64 {
        if self.downto {
            self.bit_from
        } else {
            self.bit_to
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackboxPort {
    pub name: String,
    pub width: usize,
    /// `None` when the library direction is neither input nor output
    pub direction: Option<Direction>,
    /// Bit order flag handed to the module builder, set for `downto` types
    pub upto: bool,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackboxModule {
    pub name: String,
    pub area: f64,
    pub leakage_power: f64,
    pub leakage_power_unit: String,
    pub ports: Vec<BlackboxPort>,
}

impl BlackboxModule {
    pub fn leakage_watts(&self, diag: &mut impl Diagnostics) -> f64 {
        self.leakage_power * power_unit_multiplier(&self.leakage_power_unit, diag)
    }

    pub fn port(&self, name: &str) -> Option<&BlackboxPort> {
        self.ports.iter().find(|p| p.name == name)
    }
}

fn truthy(value: &AttrValue) -> bool {
    value.as_bool().or_else(|| value.as_str().map(|s| s == "true")).unwrap_or(false)
}

fn names(group: &Group, key: &str) -> Vec<String> {
    match group.attr(key) {
        Some(AttrValue::List(items)) => items.iter().map(|v| v.to_string()).collect(),
        Some(AttrValue::Str(s)) => vec![s.to_string()],
        _ => vec![],
    }
}

fn first_name(group: &Group) -> Option<String> {
    names(group, "names").into_iter().next()
}

fn direction(port: &str, group: &Group, diag: &mut impl Diagnostics) -> Option<Direction> {
    let direction = group.attr("direction").and_then(AttrValue::as_str).unwrap_or("input");
    if direction.contains("in") {
        Some(Direction::Input)
    } else if direction.contains("out") {
        Some(Direction::Output)
    } else {
        diag.report(LibError::UnknownDirection {
            port: port.to_string(),
            direction: direction.to_string(),
        });
        None
    }
}

fn one_bit(name: String, direction: Option<Direction>) -> BlackboxPort {
    BlackboxPort { name, width: 1, direction, upto: false, offset: 0 }
}

fn cell_ports(
    cell: &Group,
    types: &FxHashMap<String, BusType>,
    diag: &mut impl Diagnostics,
) -> Vec<BlackboxPort> {
    let mut ports = Vec::new();
    for entry in cell.groups("groups") {
        if let Some(pin) = entry.group("pin") {
            for name in names(pin, "names") {
                let dir = direction(&name, pin, diag);
                ports.push(one_bit(name, dir));
            }
        } else if let Some(bus) = entry.group("bus") {
            let bus_names = names(bus, "names");
            let type_name = bus.attr("bus_type").and_then(AttrValue::as_str).unwrap_or("");
            let Some(bus_type) = types.get(type_name) else {
                diag.report(LibError::UnknownBusType {
                    bus: bus_names.join(" "),
                    bus_type: type_name.to_string(),
                });
                continue;
            };
            for name in bus_names {
                let dir = direction(&name, bus, diag);
                ports.push(BlackboxPort {
                    name,
                    width: bus_type.width(),
                    direction: dir,
                    upto: bus_type.downto,
                    offset: bus_type.offset(),
                });
            }
        } else if let Some(bundle) = entry.group("bundle") {
            for name in names(bundle, "members") {
                let dir = direction(&name, bundle, diag);
                ports.push(one_bit(name, dir));
            }
        }
    }
    ports
}

/// Module descriptors for every cell of a decoded library.
/// `known` holds module names already defined by the caller and
/// receives the new ones; a name already taken is reported and skipped.
pub fn extract_modules(
    root: &Group,
    known: &mut FxHashSet<String>,
    diag: &mut impl Diagnostics,
) -> Vec<BlackboxModule> {
    let Some(library) = root.group("library") else {
        return vec![];
    };
    let leakage_power_unit = library
        .attr("leakage_power_unit")
        .and_then(AttrValue::as_str)
        .unwrap_or(DEFAULT_LEAKAGE_POWER_UNIT);

    let mut types = FxHashMap::default();
    let mut modules = Vec::new();
    for entry in library.groups("groups") {
        if let Some(type_group) = entry.group("type") {
            let Some(name) = first_name(type_group) else {
                diag.report(LibError::UnnamedGroup { kind: "type".to_string() });
                continue;
            };
            types.insert(name, BusType::from_group(type_group));
        } else if let Some(cell) = entry.group("cell") {
            let Some(name) = first_name(cell) else {
                diag.report(LibError::UnnamedGroup { kind: "cell".to_string() });
                continue;
            };
            if !known.insert(name.clone()) {
                diag.report(LibError::DuplicateCellName(name));
                continue;
            }
            log::info!("Creating Liberty module: {}", name);
            let number = |key: &str| cell.attr(key).and_then(AttrValue::as_f64).unwrap_or(0.0);
            modules.push(BlackboxModule {
                area: number("area"),
                leakage_power: number("cell_leakage_power"),
                leakage_power_unit: leakage_power_unit.to_string(),
                ports: cell_ports(cell, &types, diag),
                name,
            });
        }
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use libertree::decode;
    use serde_json::json;

    #[test]
    fn power_units() {
        let mut diag = Vec::new();
        assert_eq!(power_unit_multiplier("10uW", &mut diag), 1e-5);
        assert_eq!(power_unit_multiplier("1W", &mut diag), 1.0);
        assert_float_eq!(power_unit_multiplier("100pW", &mut diag), 100e-12, rmax <= 1e-12);
        assert!(diag.is_empty());
        assert_eq!(power_unit_multiplier("3kW", &mut diag), 0.0);
        assert!(matches!(&diag[..], [LibError::UnknownPowerUnit(u)] if u == "3kW"));
    }

    fn library() -> Group {
        decode(&json!({
            "library": {
                "leakage_power_unit": "1nW",
                "groups": [
                    { "type": { "names": ["bus4"], "bit_from": 3, "bit_to": 0, "downto": true } },
                    { "type": { "names": ["up8"], "bit_from": 0, "bit_to": 7, "downto": false } },
                    { "type": { "bit_width": 2 } },
                    { "cell": {
                        "names": ["RAM"],
                        "area": 12.5,
                        "cell_leakage_power": 3.0,
                        "groups": [
                            { "pin": { "names": ["CLK", "EN"], "direction": "input" } },
                            { "bus": { "names": ["Q"], "direction": "output", "bus_type": "bus4" } },
                            { "bus": { "names": ["ADDR"], "bus_type": "up8" } },
                            { "bus": { "names": ["X"], "bus_type": "bus99" } },
                            { "bundle": { "members": ["S0", "S1"], "direction": "inout" } },
                            { "pin": { "names": ["VDD"], "direction": "none" } },
                            { "ff": { "names": ["IQ"] } }
                        ]
                    } },
                    { "cell": { "area": 1.0 } },
                    { "cell": { "names": ["INV"] } }
                ]
            }
        }))
    }

    #[test]
    fn modules_from_library() {
        let mut known = FxHashSet::default();
        known.insert("INV".to_string());
        let mut diag = Vec::new();
        let modules = extract_modules(&library(), &mut known, &mut diag);

        assert_eq!(modules.len(), 1);
        let ram = &modules[0];
        assert_eq!(ram.name, "RAM");
        assert_float_eq!(ram.area, 12.5, abs <= 1e-12);
        assert_eq!(ram.leakage_power_unit, "1nW");
        assert_float_eq!(ram.leakage_watts(&mut diag), 3e-9, rmax <= 1e-12);
        assert!(known.contains("RAM"));

        let names = ram.ports.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["CLK", "EN", "Q", "ADDR", "S0", "S1", "VDD"]);
        assert_eq!(
            ram.port("Q"),
            Some(&BlackboxPort {
                name: "Q".to_string(),
                width: 4,
                direction: Some(Direction::Output),
                upto: true,
                offset: 3,
            })
        );
        let addr = ram.port("ADDR").unwrap();
        assert_eq!((addr.width, addr.offset, addr.upto), (8, 7, false));
        assert_eq!(addr.direction, Some(Direction::Input));
        assert_eq!(ram.port("S1").map(|p| p.direction), Some(Some(Direction::Input)));
        assert_eq!(ram.port("VDD").map(|p| p.direction), Some(None));

        assert_eq!(diag.len(), 5);
        assert!(matches!(diag[0], LibError::UnnamedGroup { ref kind } if kind == "type"));
        assert!(matches!(diag[1], LibError::UnknownBusType { ref bus_type, .. } if bus_type == "bus99"));
        assert!(matches!(diag[2], LibError::UnknownDirection { ref direction, .. } if direction == "none"));
        assert!(matches!(diag[3], LibError::UnnamedGroup { ref kind } if kind == "cell"));
        assert!(matches!(diag[4], LibError::DuplicateCellName(ref n) if n == "INV"));
    }

    #[test]
    fn default_leakage_unit() {
        let root = decode(&json!({ "library": { "groups": [ { "cell": { "names": ["BUF"] } } ] } }));
        let modules = extract_modules(&root, &mut FxHashSet::default(), &mut Vec::new());
        assert_eq!(modules[0].leakage_power_unit, DEFAULT_LEAKAGE_POWER_UNIT);
        assert!(modules[0].ports.is_empty());
    }

    #[test]
    fn bus_type_width() {
        let t = BusType { bit_width: None, bit_from: 7, bit_to: 0, downto: true };
        assert_eq!((t.width(), t.offset()), (8, 7));
        let t = BusType { bit_width: Some(3), ..t };
        assert_eq!(t.width(), 3);
    }
}
