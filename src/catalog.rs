use crate::error::{LibError, Result};
use crate::types::{Direction, FanoutStyle, Params, TriUnate};
use miniserde::Deserialize;
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static OPS_JSON: &str = include_str!("ops.json");

/// Timing policy of one cell type, as listed in the operation catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct OpDescriptor {
    pub unate: Option<TriUnate>,
    pub style: Option<FanoutStyle>,
    /// Liberty boolean function, empty when not expressible
    pub function: String,
    /// Space separated port roots, e.g. `A B S`
    pub related: String,
}

impl OpDescriptor {
    pub fn related_ports(&self) -> impl Iterator<Item = &str> {
        self.related.split_whitespace()
    }
}

/// Immutable table from cell type tag to [`OpDescriptor`].
/// Passed by reference into every builder.
pub struct OperationCatalog {
    ops: FxHashMap<String, OpDescriptor>,
}

impl OperationCatalog {
    pub fn builtin() -> Self {
        Self::from_json(OPS_JSON).expect("built-in operation catalog is valid json")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let ops = miniserde::json::from_str(json).map_err(|e| LibError::Catalog(e.to_string()))?;
        Ok(Self { ops })
    }

    pub fn get(&self, archetype: Archetype) -> Result<&OpDescriptor> {
        let tag = archetype.catalog_tag();
        self.ops
            .get(tag)
            .ok_or_else(|| LibError::UnknownCatalogEntry(tag.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

macro_rules! archetypes {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        /// Closed set of cell types the generator knows how to model.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum Archetype {
            $($variant),+
        }

        impl Archetype {
            pub const ALL: &'static [Archetype] = &[$(Archetype::$variant),+];

            pub fn tag(self) -> &'static str {
                match self {
                    $(Archetype::$variant => $tag),+
                }
            }
        }
    };
}

archetypes! {
    Not => "not", Pos => "pos", Neg => "neg",
    And => "and", Or => "or", Xor => "xor", Xnor => "xnor",
    ReduceAnd => "reduce_and", ReduceOr => "reduce_or", ReduceXor => "reduce_xor",
    ReduceXnor => "reduce_xnor", ReduceBool => "reduce_bool",
    LogicNot => "logic_not", LogicAnd => "logic_and", LogicOr => "logic_or",
    Shl => "shl", Shr => "shr", Sshl => "sshl", Sshr => "sshr", Shift => "shift", Shiftx => "shiftx",
    Lt => "lt", Le => "le", Gt => "gt", Ge => "ge",
    Eq => "eq", Ne => "ne", Eqx => "eqx", Nex => "nex",
    Add => "add", Sub => "sub", Mul => "mul", Div => "div", Mod => "mod",
    DivFloor => "divfloor", ModFloor => "modfloor", Pow => "pow",
    Mux => "mux", Pmux => "pmux", Bmux => "bmux",
    Dff => "dff", Dffe => "dffe", Adff => "adff", Adffe => "adffe",
    Sdff => "sdff", Sdffe => "sdffe", Sdffce => "sdffce",
    Aldff => "aldff", Aldffe => "aldffe", Dffsr => "dffsr", Dffsre => "dffsre",
    Dlatch => "dlatch", Adlatch => "adlatch", Dlatchsr => "dlatchsr",
    Sr => "sr",
    MemV2 => "mem_v2",
    MemV2Unclk => "mem_v2_unclk",
}

/// Extra control ports of a flip-flop type.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FlopTraits {
    pub enable: bool,
    pub sync_reset: bool,
    pub async_reset: bool,
    pub async_load: bool,
    pub set_reset: bool,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LatchTraits {
    pub async_reset: bool,
    pub set_reset: bool,
}

/// One port of a cell type's fixed port list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub width: usize,
    pub direction: Direction,
}

impl PortSpec {
    fn input(name: &'static str, width: i64) -> Self {
        Self { name, width: width.max(0) as usize, direction: Direction::Input }
    }

    fn output(name: &'static str, width: i64) -> Self {
        Self { name, width: width.max(0) as usize, direction: Direction::Output }
    }
}

impl Archetype {
    /// The catalog entry this type reads its timing policy from.
    pub fn catalog_tag(self) -> &'static str {
        match self {
            Archetype::MemV2Unclk => Archetype::MemV2.tag(),
            other => other.tag(),
        }
    }

    pub fn is_shift(self) -> bool {
        use Archetype::*;
        matches!(self, Shl | Shr | Sshl | Sshr | Shift | Shiftx)
    }

    pub fn is_memory(self) -> bool {
        matches!(self, Archetype::MemV2 | Archetype::MemV2Unclk)
    }

    pub fn is_latch(self) -> bool {
        self.latch().is_some()
    }

    pub fn flop(self) -> Option<FlopTraits> {
        use Archetype::*;
        let t = FlopTraits::default();
        Some(match self {
            Dff => t,
            Dffe => FlopTraits { enable: true, ..t },
            Adff => FlopTraits { async_reset: true, ..t },
            Adffe => FlopTraits { async_reset: true, enable: true, ..t },
            Sdff => FlopTraits { sync_reset: true, ..t },
            Sdffe | Sdffce => FlopTraits { sync_reset: true, enable: true, ..t },
            Aldff => FlopTraits { async_load: true, ..t },
            Aldffe => FlopTraits { async_load: true, enable: true, ..t },
            Dffsr => FlopTraits { set_reset: true, ..t },
            Dffsre => FlopTraits { set_reset: true, enable: true, ..t },
            _ => return None,
        })
    }

    pub fn latch(self) -> Option<LatchTraits> {
        use Archetype::*;
        let t = LatchTraits::default();
        Some(match self {
            Dlatch => t,
            Adlatch => LatchTraits { async_reset: true, ..t },
            Dlatchsr => LatchTraits { set_reset: true, ..t },
            _ => return None,
        })
    }

    /// Has per-bit `SET`/`CLR` inputs.
    pub fn has_set_reset(self) -> bool {
        self == Archetype::Sr
            || self.flop().is_some_and(|f| f.set_reset)
            || self.latch().is_some_and(|l| l.set_reset)
    }

    /// Ports every instance of this type has, on top of the ports
    /// derived from `*_WIDTH` parameters.
    pub fn fixed_ports(self, params: &Params) -> Result<Vec<PortSpec>> {
        use Archetype::*;
        let p = |name: &str| param(self, params, name);
        let mut ports = Vec::new();

        match self {
            Mux => {
                let width = p("WIDTH")?;
                ports.push(PortSpec::input("A", width));
                ports.push(PortSpec::input("B", width));
                ports.push(PortSpec::input("S", 1));
                ports.push(PortSpec::output("Y", width));
            }
            Bmux => {
                ports.push(PortSpec::input("A", bmux_bits(self, params)?));
                ports.push(PortSpec::output("Y", p("WIDTH")?));
            }
            Pmux => {
                let width = p("WIDTH")?;
                ports.push(PortSpec::input("A", width));
                ports.push(PortSpec::input("B", total_bits(self, params, "WIDTH", "S_WIDTH")?));
                ports.push(PortSpec::output("Y", width));
            }
            MemV2 | MemV2Unclk => {
                let bits = |width: &str, count: &str| total_bits(self, params, width, count);
                let (rd, wr) = (p("RD_PORTS")?, p("WR_PORTS")?);
                let (rd_data, wr_data) = (bits("WIDTH", "RD_PORTS")?, bits("WIDTH", "WR_PORTS")?);
                ports.push(PortSpec::input("RD_CLK", rd));
                ports.push(PortSpec::input("RD_EN", rd));
                ports.push(PortSpec::input("RD_ADDR", bits("ABITS", "RD_PORTS")?));
                ports.push(PortSpec::output("RD_DATA", rd_data));
                ports.push(PortSpec::input("RD_ARST", rd));
                ports.push(PortSpec::input("RD_SRST", rd));
                ports.push(PortSpec::input("WR_CLK", wr));
                ports.push(PortSpec::input("WR_EN", wr_data));
                ports.push(PortSpec::input("WR_ADDR", bits("ABITS", "WR_PORTS")?));
                ports.push(PortSpec::input("WR_DATA", wr_data));
            }
            _ => {}
        }

        if let Some(ff) = self.flop() {
            let width = p("WIDTH")?;
            ports.push(PortSpec::input("CLK", 1));
            ports.push(PortSpec::input("D", width));
            ports.push(PortSpec::output("Q", width));
            if ff.sync_reset {
                ports.push(PortSpec::input("SRST", 1));
            }
            if ff.async_load {
                ports.push(PortSpec::input("ALOAD", 1));
                ports.push(PortSpec::input("AD", width));
            } else if ff.async_reset {
                ports.push(PortSpec::input("ARST", 1));
            }
            if ff.enable {
                ports.push(PortSpec::input("EN", 1));
            }
        }
        if let Some(latch) = self.latch() {
            let width = p("WIDTH")?;
            ports.push(PortSpec::input("D", width));
            ports.push(PortSpec::input("EN", 1));
            ports.push(PortSpec::output("Q", width));
            if latch.async_reset {
                ports.push(PortSpec::input("ARST", 1));
            }
        }
        if self.has_set_reset() {
            let width = p("WIDTH")?;
            ports.push(PortSpec::input("SET", width));
            ports.push(PortSpec::input("CLR", width));
        }
        if self == Sr {
            ports.push(PortSpec::output("Q", p("WIDTH")?));
        }

        Ok(ports)
    }
}

/// Look up a required integer parameter.
pub fn param(archetype: Archetype, params: &Params, name: &str) -> Result<i64> {
    params.get(name).copied().ok_or_else(|| LibError::MissingParameter {
        cell_type: archetype.tag().to_string(),
        param: name.to_string(),
    })
}

fn invalid(archetype: Archetype, name: &str, value: i64) -> LibError {
    LibError::InvalidParameter {
        cell_type: archetype.tag().to_string(),
        param: name.to_string(),
        value,
    }
}

/// `width * count` bits, e.g. `WIDTH * S_WIDTH` for the `B` input of a pmux.
pub fn total_bits(archetype: Archetype, params: &Params, width: &str, count: &str) -> Result<i64> {
    let (w, n) = (param(archetype, params, width)?, param(archetype, params, count)?);
    w.checked_mul(n).ok_or_else(|| invalid(archetype, count, n))
}

/// `WIDTH << S_WIDTH`, the `A` input of a bmux.
pub fn bmux_bits(archetype: Archetype, params: &Params) -> Result<i64> {
    let (width, s_width) = (param(archetype, params, "WIDTH")?, param(archetype, params, "S_WIDTH")?);
    u32::try_from(s_width)
        .ok()
        .and_then(|s| width.checked_shl(s).filter(|&bits| bits >= 0 && bits >> s == width))
        .ok_or_else(|| invalid(archetype, "S_WIDTH", s_width))
}

/// Parameters that only matter when set; absent counts as 0.
pub fn flag(params: &Params, name: &str) -> bool {
    params.get(name).is_some_and(|&v| v != 0)
}

impl FromStr for Archetype {
    type Err = LibError;

    /// Accepts the normalized tag or the `$`-prefixed internal cell name.
    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim_start_matches('$');
        Archetype::ALL
            .iter()
            .copied()
            .find(|a| a.tag() == tag)
            .ok_or_else(|| LibError::UnknownArchetype(s.to_string()))
    }
}

impl Display for Archetype {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
