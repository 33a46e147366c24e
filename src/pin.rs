use crate::error::{Diagnostics, LibError, Result};
use crate::timing::{arcs_for_pin, number, CellContext, TimingArc};
use crate::types::{Direction, FanoutStyle};
use crate::catalog::Archetype;
use libertree::Group;

/// Control pins that never load their driver.
const UNLOADED_PINS: [&str; 7] = ["ALOAD", "AD", "CLK", "RD_CLK", "WR_CLK", "RD_ARST", "RD_SRST"];

/// Which memory port a data pin belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAccess {
    Read { clocked: bool },
    /// Writes are either clocked by `WR_CLK` or gated by `WR_EN`.
    Write { clocked: bool },
}

impl MemoryAccess {
    fn to_group(&self) -> (&'static str, Group) {
        match *self {
            MemoryAccess::Read { clocked } => {
                let mut group = Group::new().with_attr("address", "RD_ADDR");
                if clocked {
                    group.set_attr("clocked_on", "RD_CLK");
                }
                ("memory_read", group)
            }
            MemoryAccess::Write { clocked } => {
                let group = Group::new().with_attr("address", "WR_ADDR");
                let group = if clocked {
                    group.with_attr("clocked_on", "WR_CLK")
                } else {
                    group.with_attr("enable", "WR_EN")
                };
                ("memory_write", group)
            }
        }
    }
}

/// One `pin` or `bus` entry of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PinModel {
    pub name: String,
    pub width: usize,
    pub direction: Direction,
    /// Inputs only; `None` when the record lacks the value
    pub capacitance: Option<f64>,
    pub function: Option<String>,
    pub clock: bool,
    pub memory: Option<MemoryAccess>,
    pub arcs: Vec<TimingArc>,
}

impl PinModel {
    pub fn is_bus(&self) -> bool {
        self.width > 1
    }

    /// `bus` or `pin`
    pub fn kind(&self) -> &'static str {
        if self.is_bus() {
            "bus"
        } else {
            "pin"
        }
    }

    pub fn to_group(&self) -> Group {
        let mut group = Group::new();
        if let Some(capacitance) = self.capacitance {
            group.set_attr("capacitance", number(capacitance));
        }
        if let Some(function) = &self.function {
            group.set_attr("function", function.as_str());
        }
        if self.clock {
            group.set_attr("clock", true);
        }
        if self.is_bus() {
            group.set_attr("bus_type", bus_type(self.width));
        }
        group.set_attr("direction", self.direction.to_string());
        if let Some(access) = &self.memory {
            let (kind, port) = access.to_group();
            group.set_group(kind, port);
        }
        for arc in &self.arcs {
            group.push_group("timing", arc.to_group());
        }
        group
    }
}

/// Name of the `type` group describing a bus of `width` bits.
pub fn bus_type(width: usize) -> String {
    format!("bus{}", width)
}

fn is_unloaded(pin: &str, cx: &CellContext) -> bool {
    let archetype = cx.archetype;
    let addressed = cx.record.get("mode").is_some_and(|&m| m == 1.0);
    (addressed && ((pin == "A" && archetype.is_shift()) || (pin == "B" && !archetype.is_shift())))
        || (pin == "A" && archetype == Archetype::Pmux && !cx.record.contains_key("A_cap"))
        || (pin == "RD_EN" && !cx.flag("RD_CLK_ENABLE"))
        || (pin == "WR_EN" && !cx.flag("WR_CLK_ENABLE"))
        || UNLOADED_PINS.contains(&pin)
}

fn capacitance(pin: &str, cx: &CellContext, diag: &mut impl Diagnostics) -> Option<f64> {
    if is_unloaded(pin, cx) {
        return Some(0.0);
    }
    let key = format!("{}_cap", pin.replace('_', ""));
    match cx.record.get(&key) {
        Some(&cap) => Some(cap),
        None => {
            diag.report(LibError::MissingCharacterizationKey { pin: pin.to_string(), key });
            None
        }
    }
}

fn memory_access(pin: &str, cx: &CellContext) -> Option<MemoryAccess> {
    if !cx.archetype.is_memory() {
        return None;
    }
    match pin {
        "RD_DATA" => Some(MemoryAccess::Read { clocked: cx.flag("RD_CLK_ENABLE") }),
        "WR_DATA" => Some(MemoryAccess::Write { clocked: cx.flag("WR_CLK_ENABLE") }),
        _ => None,
    }
}

/// Build the entry of one pin or bus. A missing capacitance is
/// reported and leaves the field out.
pub fn build_pin(
    name: &str,
    width: usize,
    direction: Direction,
    cx: &CellContext,
    diag: &mut impl Diagnostics,
) -> Result<PinModel> {
    let capacitance = match direction {
        Direction::Input => capacitance(name, cx, diag),
        Direction::Output => None,
    };

    let function = (direction.is_output()
        && cx.op.style == Some(FanoutStyle::Across)
        && !cx.op.function.is_empty())
    .then(|| cx.op.function.clone());

    let clock = (name.contains("CLK") || (name == "EN" && cx.archetype.is_latch()))
        && cx.archetype != Archetype::MemV2Unclk;

    Ok(PinModel {
        name: name.to_string(),
        width,
        direction,
        capacitance,
        function,
        clock,
        memory: memory_access(name, cx),
        arcs: arcs_for_pin(name, direction, cx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationCatalog;
    use crate::types::{Params, Prediction};
    use libertree::AttrValue;

    fn params(kv: &[(&str, i64)]) -> Params {
        kv.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn record(kv: &[(&str, f64)]) -> Prediction {
        kv.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn build(
        archetype: Archetype,
        pin: &str,
        width: usize,
        direction: Direction,
        params: &Params,
        record: &Prediction,
    ) -> (PinModel, Vec<LibError>) {
        let catalog = OperationCatalog::builtin();
        let cx = CellContext { archetype, op: catalog.get(archetype).unwrap(), params, record };
        let mut diag = Vec::new();
        let pin = build_pin(pin, width, direction, &cx, &mut diag).unwrap();
        (pin, diag)
    }

    #[test]
    fn capacitance_lookup_strips_underscores() {
        let p = params(&[("WIDTH", 16), ("ABITS", 4), ("RD_PORTS", 1), ("WR_PORTS", 1), ("WR_CLK_POLARITY", 1)]);
        let (pin, diag) = build(
            Archetype::MemV2, "WR_ADDR", 4, Direction::Input, &p, &record(&[("WRADDR_cap", 0.003)]),
        );
        assert_eq!(pin.capacitance, Some(0.003));
        assert!(diag.is_empty());
        assert_eq!(pin.kind(), "bus");
        assert_eq!(pin.arcs.len(), 1);
    }

    #[test]
    fn missing_capacitance_is_reported_and_omitted() {
        let p = params(&[("A_WIDTH", 1), ("B_WIDTH", 1), ("Y_WIDTH", 1)]);
        let (pin, diag) = build(Archetype::And, "B", 1, Direction::Input, &p, &Prediction::new());
        assert_eq!(pin.capacitance, None);
        assert!(matches!(&diag[..], [LibError::MissingCharacterizationKey { key, .. }] if key == "B_cap"));
        assert!(pin.to_group().attr("capacitance").is_none());
    }

    #[test]
    fn unloaded_pins() {
        let p = params(&[("A_WIDTH", 4), ("B_WIDTH", 2), ("Y_WIDTH", 4)]);
        let addressed = record(&[("mode", 1.0)]);
        let (a, _) = build(Archetype::Shl, "A", 4, Direction::Input, &p, &addressed);
        assert_eq!(a.capacitance, Some(0.0));
        let (b, diag) = build(Archetype::Shl, "B", 2, Direction::Input, &p, &addressed);
        assert_eq!(b.capacitance, None);
        assert_eq!(diag.len(), 1);
        let (b, _) = build(Archetype::Add, "B", 2, Direction::Input, &p, &addressed);
        assert_eq!(b.capacitance, Some(0.0));

        let ff = params(&[("WIDTH", 1), ("CLK_POLARITY", 1)]);
        let (clk, diag) = build(Archetype::Dff, "CLK", 1, Direction::Input, &ff, &Prediction::new());
        assert_eq!(clk.capacitance, Some(0.0));
        assert!(clk.clock);
        assert!(diag.is_empty());
    }

    #[test]
    fn pmux_data_without_capacitance() {
        let p = params(&[("WIDTH", 4), ("S_WIDTH", 2)]);
        let (a, diag) = build(Archetype::Pmux, "A", 4, Direction::Input, &p, &Prediction::new());
        assert_eq!(a.capacitance, Some(0.0));
        assert!(diag.is_empty());
        assert_eq!(a.to_group().attr("capacitance"), Some(&AttrValue::Int(0)));

        let (a, _) = build(Archetype::Pmux, "A", 4, Direction::Input, &p, &record(&[("A_cap", 0.02)]));
        assert_eq!(a.capacitance, Some(0.02));
        assert_eq!(a.to_group().attr("capacitance"), Some(&AttrValue::Float(0.02)));
    }

    #[test]
    fn write_enable_load_follows_clock_enable() {
        let rec = record(&[("WREN_cap", 0.005)]);
        for (enable, expected) in [(0, 0.0), (1, 0.005)] {
            let p = params(&[
                ("WIDTH", 8), ("ABITS", 4), ("RD_PORTS", 1), ("WR_PORTS", 1),
                ("WR_CLK_ENABLE", enable), ("WR_CLK_POLARITY", 1),
            ]);
            let (wr_en, diag) = build(Archetype::MemV2, "WR_EN", 8, Direction::Input, &p, &rec);
            assert_eq!(wr_en.capacitance, Some(expected));
            assert!(diag.is_empty());
        }
    }

    #[test]
    fn across_output_gets_function() {
        let p = params(&[("A_WIDTH", 1), ("B_WIDTH", 1), ("Y_WIDTH", 1)]);
        let (y, _) = build(Archetype::Xor, "Y", 1, Direction::Output, &p, &Prediction::new());
        assert_eq!(y.function.as_deref(), Some("(A ^ B)"));
        let (y, _) = build(Archetype::Add, "Y", 1, Direction::Output, &p, &Prediction::new());
        assert_eq!(y.function, None);
    }

    #[test]
    fn latch_enable_is_a_clock() {
        let p = params(&[("WIDTH", 1), ("EN_POLARITY", 1)]);
        let rec = record(&[("EN_cap", 0.001)]);
        let (en, _) = build(Archetype::Adlatch, "EN", 1, Direction::Input, &p, &rec);
        assert!(en.clock);
        assert!(en.arcs.is_empty());
        assert!(en.to_group().groups("timing").is_empty());
    }

    #[test]
    fn memory_linkage() {
        let p = params(&[
            ("WIDTH", 8), ("ABITS", 4), ("RD_PORTS", 1), ("WR_PORTS", 1),
            ("RD_CLK_ENABLE", 0), ("WR_CLK_ENABLE", 1),
            ("RD_CLK_POLARITY", 1), ("WR_CLK_POLARITY", 1),
        ]);
        let (rd, _) = build(Archetype::MemV2, "RD_DATA", 8, Direction::Output, &p, &Prediction::new());
        assert_eq!(rd.memory, Some(MemoryAccess::Read { clocked: false }));
        let group = rd.to_group();
        let read = group.group("memory_read").unwrap();
        assert_eq!(read.attr("address"), Some(&AttrValue::from("RD_ADDR")));
        assert!(read.attr("clocked_on").is_none());
        assert_eq!(group.attr("bus_type"), Some(&AttrValue::from("bus8")));

        let (wr, _) = build(Archetype::MemV2, "WR_DATA", 8, Direction::Input, &p, &record(&[("WRDATA_cap", 0.1)]));
        let write = wr.to_group();
        let write = write.group("memory_write").unwrap();
        assert_eq!(write.attr("clocked_on"), Some(&AttrValue::from("WR_CLK")));
        assert!(write.attr("enable").is_none());

        let (en, _) = build(Archetype::MemV2Unclk, "RD_CLK", 1, Direction::Input, &p, &Prediction::new());
        assert!(!en.clock);
    }

    #[test]
    fn attribute_order() {
        let p = params(&[("A_WIDTH", 1), ("Y_WIDTH", 1)]);
        let (y, _) = build(Archetype::Not, "Y", 1, Direction::Output, &p, &Prediction::new());
        let group = y.to_group();
        let keys: Vec<_> = group.attributes.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["function", "direction"]);
        assert_eq!(group.groups("timing").len(), 1);
    }
}
