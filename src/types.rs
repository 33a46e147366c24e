use miniserde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Resolved cell parameters, e.g. `WIDTH` -> 8
pub type Params = BTreeMap<String, i64>;
/// Characterization record of one cell instance, e.g. `A->Y.cell_rise` -> 0.12
pub type Prediction = BTreeMap<String, f64>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum TriUnate {
    #[serde(rename = "positive_unate")]
    Positive,
    #[serde(rename = "negative_unate")]
    Negative,
    #[serde(rename = "non_unate")]
    Non,
}

impl Display for TriUnate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TriUnate::Positive => write!(f, "positive_unate"),
            TriUnate::Negative => write!(f, "negative_unate"),
            TriUnate::Non => write!(f, "non_unate"),
        }
    }
}

/// How the timing arcs of an output pin connect to its related input pins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum FanoutStyle {
    /// One arc per related port, bitwise
    #[serde(rename = "across")]
    Across,
    /// Output bit `i` depends on input bits `0..=i`
    #[serde(rename = "all")]
    All,
    /// Output depends on every input bit
    #[serde(rename = "reduce")]
    Reduce,
    #[serde(rename = "reduce_all")]
    ReduceAll,
    #[serde(rename = "pmux")]
    Pmux,
    #[serde(rename = "bmux")]
    Bmux,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn is_output(self) -> bool {
        self == Direction::Output
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}
