//! Timing arcs of one pin.
//!
//! An arc either constrains a data pin against a clock (setup) or
//! describes the propagation delay from a set of related pins to an
//! output. Values come from the characterization record, keyed
//! `"<related>-><pin>.<metric>"`; missing values count as 0.

use crate::catalog::{bmux_bits, flag, param, total_bits, Archetype, OpDescriptor};
use crate::error::Result;
use crate::types::{Direction, FanoutStyle, Params, Prediction, TriUnate};
use itertools::Itertools;
use libertree::{AttrValue, Group};
use std::fmt::{Display, Formatter};

/// Most names a single `related_pin` list may hold. Larger groups
/// are split over several arcs.
pub const MAX_RELATED_PINS: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimingType {
    SetupRising,
    SetupFalling,
    RisingEdge,
    FallingEdge,
}

impl TimingType {
    pub fn setup(polarity: bool) -> Self {
        if polarity {
            TimingType::SetupRising
        } else {
            TimingType::SetupFalling
        }
    }

    pub fn edge(polarity: bool) -> Self {
        if polarity {
            TimingType::RisingEdge
        } else {
            TimingType::FallingEdge
        }
    }
}

impl Display for TimingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingType::SetupRising => write!(f, "setup_rising"),
            TimingType::SetupFalling => write!(f, "setup_falling"),
            TimingType::RisingEdge => write!(f, "rising_edge"),
            TimingType::FallingEdge => write!(f, "falling_edge"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ArcValues {
    Setup {
        rise_constraint: f64,
        fall_constraint: f64,
    },
    Delay {
        cell_rise: f64,
        cell_fall: f64,
        rise_transition: f64,
        fall_transition: f64,
    },
}

impl ArcValues {
    /// `(metric, value)` pairs in emission order.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        match *self {
            ArcValues::Setup { rise_constraint, fall_constraint } => vec![
                ("rise_constraint", rise_constraint),
                ("fall_constraint", fall_constraint),
            ],
            ArcValues::Delay { cell_rise, cell_fall, rise_transition, fall_transition } => vec![
                ("cell_rise", cell_rise),
                ("cell_fall", cell_fall),
                ("rise_transition", rise_transition),
                ("fall_transition", fall_transition),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingArc {
    /// One name or several space separated names
    pub related_pin: String,
    pub timing_sense: Option<TriUnate>,
    pub timing_type: Option<TimingType>,
    pub values: ArcValues,
}

impl TimingArc {
    pub fn related_count(&self) -> usize {
        self.related_pin.split_whitespace().count()
    }

    pub fn to_group(&self) -> Group {
        let mut group = Group::new().with_attr("related_pin", self.related_pin.as_str());
        if let Some(sense) = self.timing_sense {
            group.set_attr("timing_sense", sense.to_string());
        }
        if let Some(timing_type) = self.timing_type {
            group.set_attr("timing_type", timing_type.to_string());
        }
        for (metric, value) in self.values.metrics() {
            group.set_group(metric, scalar_table(value));
        }
        group
    }
}

/// Liberty number of a value; zero prints as a plain `0`.
pub fn number(value: f64) -> AttrValue {
    if value == 0.0 {
        AttrValue::Int(0)
    } else {
        AttrValue::Float(value)
    }
}

/// `metric (scalar) { values ("v"); }`
pub fn scalar_table(value: f64) -> Group {
    Group::new().with_group("scalar", Group::new().with_attr("values", AttrValue::List(vec![number(value)])))
}

/// Name of the port a pin or pin list belongs to.
/// For example, `A[3] A[4]` -> `A`
pub fn pin_root(pin: &str) -> &str {
    pin.split('[').next().unwrap_or(pin)
}

/// Bit of a single pin name, 0 when the pin is not indexed.
/// For example, `Y[3]` -> `3`
pub fn bit_index(pin: &str) -> i64 {
    let Some((head, _)) = pin.split_once(']') else {
        return 0;
    };
    head.rsplit('[').next().and_then(|i| i.parse().ok()).unwrap_or(0)
}

/// Every bit of a port as one space separated list; a 1 bit port
/// keeps its bare name.
pub fn full_bus(root: &str, width: i64) -> String {
    if width > 1 {
        (0..width).map(|i| format!("{}[{}]", root, i)).join(" ")
    } else {
        root.to_string()
    }
}

/// Break every related-pin list longer than [`MAX_RELATED_PINS`].
pub fn split_related(groups: Vec<String>) -> Vec<String> {
    let mut split = Vec::with_capacity(groups.len());
    for group in groups {
        let names = group.split_whitespace().collect_vec();
        split.extend(names.chunks(MAX_RELATED_PINS).map(|chunk| chunk.join(" ")));
    }
    split
}

fn lookup(record: &Prediction, related: &str, pin: &str, metric: &str) -> f64 {
    let key = format!("{}->{}.{}", pin_root(related), pin, metric);
    record.get(&key).copied().unwrap_or(0.0)
}

pub fn setup_arc(pin: &str, related_pin: &str, record: &Prediction, polarity: bool) -> TimingArc {
    TimingArc {
        related_pin: related_pin.to_string(),
        timing_sense: None,
        timing_type: Some(TimingType::setup(polarity)),
        values: ArcValues::Setup {
            rise_constraint: lookup(record, related_pin, pin, "rise_constraint"),
            fall_constraint: lookup(record, related_pin, pin, "fall_constraint"),
        },
    }
}

/// `output_width` enables the partial reduction scaling of
/// `cell_rise`/`cell_fall`.
pub fn delay_arc(
    pin: &str,
    related_pin: &str,
    record: &Prediction,
    unate: Option<TriUnate>,
    polarity: Option<bool>,
    output_width: Option<i64>,
) -> TimingArc {
    // read data always times from the read clock
    let source = if pin == "RD_DATA" { "RD_CLK" } else { related_pin };
    let root = pin_root(pin);
    let mut cell_rise = lookup(record, source, root, "cell_rise");
    let mut cell_fall = lookup(record, source, root, "cell_fall");
    if let Some(width) = output_width {
        let fraction = (bit_index(pin) - bit_index(source) + 1) as f64 / width.max(1) as f64;
        cell_rise *= fraction;
        cell_fall *= fraction;
    }

    TimingArc {
        related_pin: related_pin.to_string(),
        timing_sense: unate,
        timing_type: polarity.map(TimingType::edge),
        values: ArcValues::Delay {
            cell_rise,
            cell_fall,
            rise_transition: lookup(record, source, root, "rise_transition"),
            fall_transition: lookup(record, source, root, "fall_transition"),
        },
    }
}

/// Everything the pin and arc builders read about one cell instance.
#[derive(Debug, Copy, Clone)]
pub struct CellContext<'a> {
    pub archetype: Archetype,
    pub op: &'a OpDescriptor,
    pub params: &'a Params,
    pub record: &'a Prediction,
}

impl CellContext<'_> {
    pub fn param(&self, name: &str) -> Result<i64> {
        param(self.archetype, self.params, name)
    }

    pub fn flag(&self, name: &str) -> bool {
        flag(self.params, name)
    }

    pub fn polarity(&self, name: &str) -> Result<bool> {
        Ok(self.param(name)? != 0)
    }

    /// Output width used to scale partial reductions, only for
    /// `all`-style arithmetic.
    pub fn reduction_width(&self) -> Option<i64> {
        if self.op.style == Some(FanoutStyle::All) && !self.archetype.is_shift() {
            Some(self.params.get("Y_WIDTH").copied().unwrap_or(1))
        } else {
            None
        }
    }

    pub fn setup_arc(&self, pin: &str, related_pin: &str, polarity: bool) -> TimingArc {
        setup_arc(pin, related_pin, self.record, polarity)
    }

    pub fn delay_arc(
        &self,
        pin: &str,
        related_pin: &str,
        unate: Option<TriUnate>,
        polarity: Option<bool>,
    ) -> TimingArc {
        delay_arc(pin, related_pin, self.record, unate, polarity, self.reduction_width())
    }

    fn full_bus(&self, root: &str) -> Result<String> {
        Ok(full_bus(root, self.param(&format!("{}_WIDTH", root))?))
    }
}

/// Arcs of one pin or bus, by cell type and pin name.
pub fn arcs_for_pin(pin: &str, direction: Direction, cx: &CellContext) -> Result<Vec<TimingArc>> {
    use Archetype::*;
    let archetype = cx.archetype;

    if archetype.flop().is_some() && matches!(pin, "D" | "EN") {
        return Ok(vec![cx.setup_arc(pin, "CLK", cx.polarity("CLK_POLARITY")?)]);
    }
    if archetype.is_memory() {
        match pin {
            "WR_EN" | "WR_ADDR" | "WR_DATA" => {
                return Ok(vec![cx.setup_arc(pin, "WR_CLK", cx.polarity("WR_CLK_POLARITY")?)]);
            }
            "RD_EN" | "RD_ADDR" if archetype == MemV2Unclk => return Ok(vec![]),
            "RD_EN" | "RD_ADDR" => {
                return Ok(vec![cx.setup_arc(pin, "RD_CLK", cx.polarity("RD_CLK_POLARITY")?)]);
            }
            "RD_DATA" if archetype == MemV2Unclk => {
                let mut arcs = vec![
                    cx.delay_arc(pin, "RD_ADDR", Some(TriUnate::Non), None),
                    cx.delay_arc(pin, "RD_EN", Some(TriUnate::Non), None),
                ];
                if cx.flag("RD_TRANSPARENCY_MASK") {
                    arcs.push(cx.delay_arc(pin, "WR_DATA", Some(TriUnate::Positive), None));
                }
                return Ok(arcs);
            }
            "RD_DATA" => {
                let polarity = cx.polarity("RD_CLK_POLARITY")?;
                return Ok(vec![cx.delay_arc(pin, "RD_CLK", None, Some(polarity))]);
            }
            _ => {}
        }
    }
    if archetype.is_latch() {
        match pin {
            "D" => return Ok(vec![cx.setup_arc(pin, "EN", !cx.polarity("EN_POLARITY")?)]),
            "Q" => {
                let polarity = cx.polarity("EN_POLARITY")?;
                return Ok(vec![
                    cx.delay_arc(pin, "D", Some(TriUnate::Positive), None),
                    cx.delay_arc(pin, "EN", Some(TriUnate::Non), Some(polarity)),
                ]);
            }
            _ => {}
        }
    }
    if !direction.is_output() {
        return Ok(vec![]);
    }

    let Some(style) = cx.op.style else {
        return Ok(vec![]);
    };
    let related = match style {
        FanoutStyle::Across if cx.op.function.is_empty() => return Ok(vec![]),
        FanoutStyle::Across => {
            let sense = (pin == "Q").then_some(TriUnate::Non);
            let polarity = cx.params.get("CLK_POLARITY").map(|&p| p != 0);
            return Ok(cx
                .op
                .related_ports()
                .map(|related| cx.delay_arc(pin, related, sense, polarity))
                .collect());
        }
        FanoutStyle::All if !archetype.is_shift() => {
            let bit = bit_index(pin);
            let mut related = Vec::new();
            for root in cx.op.related_ports() {
                let width = cx.param(&format!("{}_WIDTH", root))?;
                for j in 0..width.min(bit + 1) {
                    related.push(if width > 1 { format!("{}[{}]", root, j) } else { root.to_string() });
                }
            }
            related
        }
        FanoutStyle::All | FanoutStyle::Reduce | FanoutStyle::ReduceAll => {
            cx.op.related_ports().map(|root| cx.full_bus(root)).collect::<Result<Vec<_>>>()?
        }
        FanoutStyle::Pmux => {
            let (width, s_width) = (cx.param("WIDTH")?, cx.param("S_WIDTH")?);
            let total = total_bits(archetype, cx.params, "WIDTH", "S_WIDTH")?;
            vec!["A".to_string(), full_bus("S", s_width), slices("B", width, total)]
        }
        FanoutStyle::Bmux => {
            let (width, s_width) = (cx.param("WIDTH")?, cx.param("S_WIDTH")?);
            vec![full_bus("S", s_width), slices("A", width, bmux_bits(archetype, cx.params)?)]
        }
    };

    Ok(split_related(related)
        .iter()
        .map(|related| cx.delay_arc(pin, related, cx.op.unate, None))
        .collect())
}

/// `total` bits of a bus as `width`-sized ranges, e.g. `B[3:0] B[7:4]`.
fn slices(root: &str, width: i64, total: i64) -> String {
    if width <= 0 {
        return String::new();
    }
    (0..total)
        .step_by(width as usize)
        .map(|i| format!("{}[{}:{}]", root, i + width - 1, i))
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationCatalog;
    use float_eq::assert_float_eq;

    fn params(kv: &[(&str, i64)]) -> Params {
        kv.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn record(kv: &[(&str, f64)]) -> Prediction {
        kv.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn arcs(archetype: Archetype, pin: &str, direction: Direction, params: &Params, record: &Prediction) -> Vec<TimingArc> {
        let catalog = OperationCatalog::builtin();
        let cx = CellContext { archetype, op: catalog.get(archetype).unwrap(), params, record };
        arcs_for_pin(pin, direction, &cx).unwrap()
    }

    fn delay(arc: &TimingArc) -> (f64, f64, f64, f64) {
        match arc.values {
            ArcValues::Delay { cell_rise, cell_fall, rise_transition, fall_transition } => {
                (cell_rise, cell_fall, rise_transition, fall_transition)
            }
            ArcValues::Setup { .. } => panic!("expected a delay arc"),
        }
    }

    #[test]
    fn pin_names() {
        assert_eq!(pin_root("A[3] A[4]"), "A");
        assert_eq!(pin_root("CLK"), "CLK");
        assert_eq!(bit_index("Y[12]"), 12);
        assert_eq!(bit_index("B[7:4]"), 0);
        assert_eq!(bit_index("S"), 0);
        assert_eq!(full_bus("S", 3), "S[0] S[1] S[2]");
        assert_eq!(full_bus("S", 1), "S");
        assert_eq!(slices("B", 4, 12), "B[3:0] B[7:4] B[11:8]");
    }

    #[test]
    fn setup_type_follows_polarity() {
        let rec = record(&[("CLK->D.rise_constraint", 0.2)]);
        for (polarity, expected) in [(true, TimingType::SetupRising), (false, TimingType::SetupFalling)] {
            let arc = setup_arc("D", "CLK", &rec, polarity);
            assert_eq!(arc.timing_type, Some(expected));
            assert_eq!(
                arc.values,
                ArcValues::Setup { rise_constraint: 0.2, fall_constraint: 0.0 }
            );
        }
    }

    #[test]
    fn read_data_times_from_read_clock() {
        let rec = record(&[("RD_CLK->RD_DATA.cell_rise", 1.5), ("RD_ADDR->RD_DATA.cell_rise", 9.0)]);
        let arc = delay_arc("RD_DATA", "RD_ADDR", &rec, None, None, None);
        assert_eq!(arc.related_pin, "RD_ADDR");
        assert_float_eq!(delay(&arc).0, 1.5, abs <= 1e-12);
        let again = delay_arc("RD_DATA", &arc.related_pin, &rec, None, None, None);
        assert_eq!(again, arc);
    }

    #[test]
    fn partial_reduction_scales_cell_delays_only() {
        let rec = record(&[
            ("A->Y.cell_rise", 8.0),
            ("A->Y.cell_fall", 4.0),
            ("A->Y.rise_transition", 1.0),
        ]);
        let arc = delay_arc("Y[3]", "A[1]", &rec, None, None, Some(4));
        let (rise, fall, rise_tr, _) = delay(&arc);
        assert_float_eq!(rise, 6.0, abs <= 1e-12);
        assert_float_eq!(fall, 3.0, abs <= 1e-12);
        assert_float_eq!(rise_tr, 1.0, abs <= 1e-12);
    }

    #[test]
    fn adder_bits_depend_on_lower_bits() {
        let p = params(&[("A_WIDTH", 4), ("B_WIDTH", 1), ("Y_WIDTH", 4)]);
        let got = arcs(Archetype::Add, "Y[2]", Direction::Output, &p, &Prediction::new());
        let related = got.iter().map(|a| a.related_pin.as_str()).collect_vec();
        assert_eq!(related, ["A[0]", "A[1]", "A[2]", "B"]);
        assert!(got.iter().all(|a| a.timing_sense == Some(TriUnate::Non)));
    }

    #[test]
    fn shift_takes_full_buses() {
        let p = params(&[("A_WIDTH", 3), ("B_WIDTH", 2), ("Y_WIDTH", 3)]);
        let got = arcs(Archetype::Shl, "Y", Direction::Output, &p, &Prediction::new());
        let related = got.iter().map(|a| a.related_pin.as_str()).collect_vec();
        assert_eq!(related, ["A[0] A[1] A[2]", "B[0] B[1]"]);
    }

    #[test]
    fn wide_reductions_are_split() {
        let p = params(&[("A_WIDTH", 150), ("Y_WIDTH", 1)]);
        let got = arcs(Archetype::ReduceOr, "Y", Direction::Output, &p, &Prediction::new());
        assert_eq!(got.iter().map(|a| a.related_count()).collect_vec(), [64, 64, 22]);
        assert!(got.iter().all(|a| a.related_count() <= MAX_RELATED_PINS));
        assert_eq!(got[2].related_pin.split_whitespace().next(), Some("A[128]"));
        assert!(got.iter().all(|a| a.timing_sense == Some(TriUnate::Positive)));
    }

    #[test]
    fn mux_families() {
        let p = params(&[("WIDTH", 2), ("S_WIDTH", 3)]);
        let pmux = arcs(Archetype::Pmux, "Y", Direction::Output, &p, &Prediction::new());
        let related = pmux.iter().map(|a| a.related_pin.as_str()).collect_vec();
        assert_eq!(related, ["A", "S[0] S[1] S[2]", "B[1:0] B[3:2] B[5:4]"]);

        let bmux = arcs(Archetype::Bmux, "Y", Direction::Output, &p, &Prediction::new());
        assert_eq!(bmux.len(), 2);
        assert_eq!(bmux[1].related_count(), 8);
        assert!(bmux[1].related_pin.ends_with("A[15:14]"));
    }

    #[test]
    fn oversized_bmux_select_fails_the_pin() {
        let p = params(&[("WIDTH", 1), ("S_WIDTH", 64)]);
        let rec = Prediction::new();
        let catalog = OperationCatalog::builtin();
        let cx = CellContext {
            archetype: Archetype::Bmux,
            op: catalog.get(Archetype::Bmux).unwrap(),
            params: &p,
            record: &rec,
        };
        let err = arcs_for_pin("Y", Direction::Output, &cx).unwrap_err();
        assert!(matches!(err, crate::error::LibError::InvalidParameter { ref param, .. } if param == "S_WIDTH"));
    }

    #[test]
    fn clocked_read_data_times_from_read_clock() {
        for (polarity, expected) in [(1, TimingType::RisingEdge), (0, TimingType::FallingEdge)] {
            let p = params(&[
                ("WIDTH", 8), ("ABITS", 4), ("RD_PORTS", 1), ("WR_PORTS", 1),
                ("RD_CLK_POLARITY", polarity),
            ]);
            let rec = record(&[("RD_CLK->RD_DATA.cell_rise", 0.7)]);
            let got = arcs(Archetype::MemV2, "RD_DATA", Direction::Output, &p, &rec);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].related_pin, "RD_CLK");
            assert_eq!(got[0].timing_sense, None);
            assert_eq!(got[0].timing_type, Some(expected));
            assert_float_eq!(delay(&got[0]).0, 0.7, abs <= 1e-12);
        }
    }

    #[test]
    fn across_outputs() {
        let p = params(&[("A_WIDTH", 1), ("B_WIDTH", 1), ("Y_WIDTH", 1)]);
        let got = arcs(Archetype::And, "Y", Direction::Output, &p, &Prediction::new());
        assert_eq!(got.iter().map(|a| a.related_pin.as_str()).collect_vec(), ["A", "B"]);
        assert!(got.iter().all(|a| a.timing_sense.is_none() && a.timing_type.is_none()));

        let ff = params(&[("WIDTH", 1), ("CLK_POLARITY", 0)]);
        let q = arcs(Archetype::Dff, "Q", Direction::Output, &ff, &Prediction::new());
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].timing_sense, Some(TriUnate::Non));
        assert_eq!(q[0].timing_type, Some(TimingType::FallingEdge));
    }

    #[test]
    fn flop_and_latch_inputs() {
        let ff = params(&[("WIDTH", 1), ("CLK_POLARITY", 1), ("EN_POLARITY", 1)]);
        let en = arcs(Archetype::Dffe, "EN", Direction::Input, &ff, &Prediction::new());
        assert_eq!(en[0].related_pin, "CLK");
        assert_eq!(en[0].timing_type, Some(TimingType::SetupRising));
        assert!(arcs(Archetype::Dffe, "CLK", Direction::Input, &ff, &Prediction::new()).is_empty());

        let latch = params(&[("WIDTH", 1), ("EN_POLARITY", 1)]);
        let d = arcs(Archetype::Dlatch, "D", Direction::Input, &latch, &Prediction::new());
        assert_eq!(d[0].timing_type, Some(TimingType::SetupFalling));
        let q = arcs(Archetype::Dlatch, "Q", Direction::Output, &latch, &Prediction::new());
        assert_eq!(q[0].timing_sense, Some(TriUnate::Positive));
        assert_eq!(q[1].timing_type, Some(TimingType::RisingEdge));
    }

    #[test]
    fn arc_lowers_to_scalar_tables() {
        let rec = record(&[("A->Y.cell_rise", 0.25)]);
        let group = delay_arc("Y", "A", &rec, Some(TriUnate::Negative), None, None).to_group();
        assert_eq!(group.attr("related_pin").and_then(|v| v.as_str()), Some("A"));
        assert_eq!(group.attr("timing_sense").and_then(|v| v.as_str()), Some("negative_unate"));
        assert!(group.attr("timing_type").is_none());
        let values = group.group("cell_rise").and_then(|t| t.group("scalar")).and_then(|s| s.attr("values"));
        assert_eq!(values.map(|v| v.to_string()), Some("0.25".to_string()));
        assert_eq!(group.groups.len(), 4);
        let missing = group.group("cell_fall").and_then(|t| t.group("scalar")).and_then(|s| s.attr("values"));
        assert_eq!(missing, Some(&AttrValue::List(vec![AttrValue::Int(0)])));
    }
}
