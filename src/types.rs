//! Type-safe wrappers for logic variables, literals and circuit nodes.
//!
//! These newtypes keep the three kinds of integer ids that flow through the
//! loaders and the evaluator apart at compile time.
use std::fmt;
use std::ops::Neg;

/// A logic variable identifier (1-indexed).
///
/// Logic variables are the weight slots of the circuit. Each one has a
/// positive and a negative polarity, and each polarity carries a weight.
///
/// # Invariants
///
/// - Ids must be >= 1 (0 is reserved, as in the DIMACS-style file formats)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LogicVar(u32);

impl LogicVar {
    /// Creates a new logic variable with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Logic variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Logic variable ids must be >= 1");
        LogicVar(id)
    }

    /// Returns the raw id as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the id as a slot index into weight arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LogicVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A signed literal: a logic variable together with a polarity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Literal(i32);

impl Literal {
    /// Creates a literal from its signed representation.
    ///
    /// Returns `None` for `0`, which does not denote any literal.
    pub const fn from_signed(value: i32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Literal(value))
        }
    }

    pub fn positive(var: LogicVar) -> Self {
        Literal(var.id() as i32)
    }

    pub fn negative(var: LogicVar) -> Self {
        Literal(-(var.id() as i32))
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Return the signed representation.
    pub const fn get(self) -> i32 {
        self.0
    }

    pub fn var(self) -> LogicVar {
        LogicVar(self.0.unsigned_abs())
    }
}

impl Neg for Literal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Literal(-self.0)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.is_negative() { "~" } else { "" }, self.var())
    }
}

/// Position of a node in the circuit (0-indexed, topological).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_var_creation() {
        let x1 = LogicVar::new(1);
        let x2 = LogicVar::new(2);
        assert_eq!(x1.id(), 1);
        assert_eq!(x2.index(), 2);
        assert!(x1 < x2);
    }

    #[test]
    #[should_panic(expected = "Logic variable ids must be >= 1")]
    fn test_logic_var_zero_panics() {
        LogicVar::new(0);
    }

    #[test]
    fn test_literal_polarity() {
        let pos = Literal::from_signed(3).unwrap();
        let neg = -pos;
        assert!(!pos.is_negative());
        assert!(neg.is_negative());
        assert_eq!(neg.get(), -3);
        assert_eq!(pos.var(), neg.var());
        assert_eq!(Literal::positive(LogicVar::new(3)), pos);
        assert_eq!(Literal::negative(LogicVar::new(3)), neg);
        assert_eq!(Literal::from_signed(0), None);
        assert_eq!(neg.to_string(), "~x3");
    }
}
