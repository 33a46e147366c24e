//! Whole-cell models: area, sequential header and every port.

use crate::catalog::{Archetype, OperationCatalog};
use crate::error::{Diagnostics, Result};
use crate::pin::{build_pin, bus_type, PinModel};
use crate::timing::CellContext;
use crate::types::{Direction, FanoutStyle, Params, Prediction};
use indexmap::IndexMap;
use libertree::Group;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// One bit of a connection, in Yosys JSON netlist convention:
/// integers are nets, strings are constants (`"0" "1" "x" "z"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SignalBit {
    Net(u64),
    Const(String),
}

impl SignalBit {
    pub fn is_undef(&self) -> bool {
        matches!(self, SignalBit::Const(c) if c == "x")
    }
}

/// A cell instance together with its characterization record.
#[derive(Debug, Clone, Deserialize)]
pub struct CellInstance {
    pub name: String,
    /// Type tag, with or without the leading `$`
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(default, deserialize_with = "deserialize_params")]
    pub parameters: Params,
    #[serde(default)]
    pub connections: BTreeMap<String, Vec<SignalBit>>,
    #[serde(default)]
    pub prediction: Prediction,
}

impl CellInstance {
    /// An absent port counts as fully undefined.
    pub fn is_fully_undef(&self, port: &str) -> bool {
        self.connections
            .get(port)
            .map_or(true, |bits| bits.iter().all(SignalBit::is_undef))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamValue {
    Int(i64),
    Bits(String),
}

/// Yosys bit string to integer. Undefined bits read as 0; strings
/// wider than 63 bits saturate when a high bit is set. `None` for
/// string parameters, which Yosys marks with a trailing space.
fn parse_bits(bits: &str) -> Option<i64> {
    if bits.is_empty() || !bits.chars().all(|c| matches!(c, '0' | '1' | 'x' | 'z')) {
        return None;
    }
    let (high, low) = bits.split_at(bits.len().saturating_sub(63));
    if high.contains('1') {
        return Some(i64::MAX);
    }
    Some(low.chars().fold(0i64, |v, c| (v << 1) | (c == '1') as i64))
}

/// Parameters are either plain integers or Yosys bit strings.
fn deserialize_params<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Params, D::Error> {
    let raw = BTreeMap::<String, ParamValue>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                ParamValue::Int(v) => v,
                ParamValue::Bits(bits) => parse_bits(&bits)?,
            };
            Some((name.trim_start_matches('\\').to_string(), value))
        })
        .collect())
}

/// Storage element of a sequential cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Sequential {
    Flop { width: i64, next_state: String },
    Latch { width: i64, enable: String },
    Memory { ram: bool, address_width: i64, word_width: i64 },
}

impl Sequential {
    /// `"IQ", "IQN"`, plus the bank width when there is more than one bit.
    fn state_names(width: i64) -> String {
        if width > 1 {
            format!("\"IQ\", \"IQN\", {}", width)
        } else {
            "\"IQ\", \"IQN\"".to_string()
        }
    }

    fn insert_into(&self, cell: &mut Group) {
        match self {
            Sequential::Flop { width, next_state } => {
                let kind = if *width == 1 { "ff" } else { "ff_bank" };
                let header = Group::new()
                    .with_attr("next_state", next_state.as_str())
                    .with_attr("clocked_on", "CLK");
                cell.insert_named(kind, Self::state_names(*width), header);
            }
            Sequential::Latch { width, enable } => {
                let kind = if *width == 1 { "latch" } else { "latch_bank" };
                let header = Group::new()
                    .with_attr("data_in", "D")
                    .with_attr("enable", enable.as_str());
                cell.insert_named(kind, Self::state_names(*width), header);
            }
            Sequential::Memory { ram, address_width, word_width } => {
                cell.set_group(
                    "memory",
                    Group::new()
                        .with_attr("type", if *ram { "ram" } else { "rom" })
                        .with_attr("address_width", *address_width)
                        .with_attr("word_width", *word_width),
                );
                cell.set_attr("is_memory", true);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortModel {
    Pin(PinModel),
    /// Output bus whose bits carry their own timing, `Y[0]`..`Y[n-1]`
    BitBus { name: String, bits: Vec<PinModel> },
}

impl PortModel {
    pub fn name(&self) -> &str {
        match self {
            PortModel::Pin(pin) => &pin.name,
            PortModel::BitBus { name, .. } => name,
        }
    }

    /// Width used to pick the bus `type` group, if this is a bus.
    pub fn bus_width(&self) -> Option<usize> {
        match self {
            PortModel::Pin(pin) => pin.is_bus().then_some(pin.width),
            PortModel::BitBus { bits, .. } => Some(bits.len()),
        }
    }

    pub fn pins(&self) -> Box<dyn Iterator<Item = &PinModel> + '_> {
        match self {
            PortModel::Pin(pin) => Box::new(std::iter::once(pin)),
            PortModel::BitBus { bits, .. } => Box::new(bits.iter()),
        }
    }

    fn insert_into(&self, cell: &mut Group) {
        match self {
            PortModel::Pin(pin) => cell.insert_named(pin.kind(), pin.name.as_str(), pin.to_group()),
            PortModel::BitBus { name, bits } => {
                let mut bus = Group::new()
                    .with_attr("bus_type", bus_type(bits.len()))
                    .with_attr("direction", Direction::Output.to_string());
                for bit in bits {
                    bus.insert_named("pin", bit.name.as_str(), bit.to_group());
                }
                cell.insert_named("bus", name.as_str(), bus);
            }
        }
    }
}

/// The library entry of one cell instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CellModel {
    pub name: String,
    /// Type after the clocked/unclocked memory split
    pub archetype: Archetype,
    pub area: f64,
    pub sequential: Option<Sequential>,
    /// Keyed by port name; a port added twice keeps its first position.
    pub ports: IndexMap<String, PortModel>,
}

impl CellModel {
    pub fn port(&self, name: &str) -> Option<&PortModel> {
        self.ports.get(name)
    }

    /// Every pin model, bus bits included.
    pub fn pins(&self) -> impl Iterator<Item = &PinModel> {
        self.ports.values().flat_map(|p| p.pins())
    }

    pub fn to_group(&self) -> Group {
        let mut cell = Group::new().with_attr("area", self.area);
        if let Some(sequential) = &self.sequential {
            sequential.insert_into(&mut cell);
        }
        for port in self.ports.values() {
            port.insert_into(&mut cell);
        }
        cell
    }
}

fn sequential_header(cx: &CellContext) -> Result<Option<Sequential>> {
    let archetype = cx.archetype;
    if let Some(ff) = archetype.flop() {
        let next_state = match (ff.enable, ff.enable && cx.polarity("EN_POLARITY")?) {
            (false, _) => "D",
            (true, true) => "(D & EN) | (IQ & !EN)",
            (true, false) => "(D & !EN) | (IQ & EN)",
        };
        return Ok(Some(Sequential::Flop {
            width: cx.param("WIDTH")?,
            next_state: next_state.to_string(),
        }));
    }
    if archetype.is_latch() {
        let enable = if cx.polarity("EN_POLARITY")? { "EN" } else { "!EN" };
        return Ok(Some(Sequential::Latch {
            width: cx.param("WIDTH")?,
            enable: enable.to_string(),
        }));
    }
    if archetype.is_memory() {
        return Ok(Some(Sequential::Memory {
            ram: cx.param("WR_PORTS")? > 0,
            address_width: cx.param("ABITS")?,
            word_width: cx.param("WIDTH")?,
        }));
    }
    Ok(None)
}

/// Build the model of a cell type from its parameters and record.
/// `read_clock_undefined` selects the unclocked memory variant.
pub fn build_model(
    name: &str,
    archetype: Archetype,
    params: &Params,
    record: &Prediction,
    read_clock_undefined: bool,
    catalog: &OperationCatalog,
    diag: &mut impl Diagnostics,
) -> Result<CellModel> {
    let archetype = match archetype {
        Archetype::MemV2 if read_clock_undefined => Archetype::MemV2Unclk,
        other => other,
    };
    let cx = CellContext { archetype, op: catalog.get(archetype)?, params, record };

    log::info!("Building cell {}: {}, {:?}", name, archetype, params);
    log::debug!("Prediction: {:?}", record);

    let mut ports = IndexMap::new();
    let bit_outputs = cx.op.style == Some(FanoutStyle::All) && !archetype.is_shift();
    for (param, &width) in params.iter().filter(|(k, _)| k.contains("_WIDTH")) {
        let Some(root) = param.chars().next().map(String::from) else {
            continue;
        };
        let width = width.max(0) as usize;
        if root == "Y" && bit_outputs {
            let bits = (0..width)
                .map(|i| build_pin(&format!("Y[{}]", i), 1, Direction::Output, &cx, diag))
                .collect::<Result<Vec<_>>>()?;
            ports.insert(root.clone(), PortModel::BitBus { name: root, bits });
        } else {
            let direction = if root == "Y" { Direction::Output } else { Direction::Input };
            let pin = build_pin(&root, width, direction, &cx, diag)?;
            ports.insert(root, PortModel::Pin(pin));
        }
    }
    for spec in archetype.fixed_ports(params)? {
        let pin = build_pin(spec.name, spec.width, spec.direction, &cx, diag)?;
        ports.insert(spec.name.to_string(), PortModel::Pin(pin));
    }

    Ok(CellModel {
        name: name.to_string(),
        archetype,
        area: record.get("area").copied().unwrap_or(0.0),
        sequential: sequential_header(&cx)?,
        ports,
    })
}

/// Build the model of a cell instance, deciding the memory variant
/// from the read clock wiring.
pub fn build_cell(
    cell: &CellInstance,
    catalog: &OperationCatalog,
    diag: &mut impl Diagnostics,
) -> Result<CellModel> {
    let archetype: Archetype = cell.cell_type.parse()?;
    let read_clock_undefined = archetype.is_memory() && cell.is_fully_undef("RD_CLK");
    build_model(
        &cell.name,
        archetype,
        &cell.parameters,
        &cell.prediction,
        read_clock_undefined,
        catalog,
        diag,
    )
}
