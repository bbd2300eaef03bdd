//! Arithmetic circuits in flat, topologically ordered form.
//!
//! Reads compiled circuits in the c2d/Ace `nnf` format.
//!
//! # Circuit File Format (.ac)
//!
//! ```text
//! nnf <nodes> <edges> <vars>         # header
//! L <literal>                        # literal leaf
//! A <children> <child>+              # multiply node
//! O <split-var> <children> <child>+  # add node
//! ```
//!
//! Nodes appear bottom-up (children before parents), the last node is the root.
//! Lines starting with `c` are comments.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::types::{Literal, NodeId};

/// Kind of a circuit node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NodeKind {
    /// Fixed value 1, never recomputed.
    Constant,
    /// Leaf carrying the weight of a literal.
    Literal(Literal),
    /// Product of the children.
    Multiply,
    /// Sum of the children.
    Add,
}

/// An immutable arithmetic circuit.
///
/// Children of node `n` occupy `edges[first(n)..last(n)]`, where
/// `first(n) == last(n - 1)` and `first(0) == 0`.
#[derive(Debug, Clone)]
pub struct Circuit {
    kinds: Vec<NodeKind>,
    last_edge: Vec<usize>,
    edges: Vec<NodeId>,
    num_vars: u32,
    pos_lit_node: Vec<Option<NodeId>>,
    neg_lit_node: Vec<Option<NodeId>>,
}

impl Circuit {
    pub fn num_nodes(&self) -> usize {
        self.kinds.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of logic variables declared by the circuit header.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// The root is always the last node.
    pub fn root(&self) -> NodeId {
        NodeId::new(self.kinds.len() - 1)
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.kinds[node.index()]
    }

    fn first_edge(&self, index: usize) -> usize {
        if index == 0 {
            0
        } else {
            self.last_edge[index - 1]
        }
    }

    /// Children of a node, in file order.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        let i = node.index();
        &self.edges[self.first_edge(i)..self.last_edge[i]]
    }

    /// The leaf realizing the given literal, if the circuit mentions it.
    pub fn literal_node(&self, literal: Literal) -> Option<NodeId> {
        let table = if literal.is_negative() {
            &self.neg_lit_node
        } else {
            &self.pos_lit_node
        };
        table.get(literal.var().index()).copied().flatten()
    }

    /// Iterates over all literal leaves.
    pub fn literals(&self) -> impl Iterator<Item = Literal> + '_ {
        self.kinds.iter().filter_map(|kind| match kind {
            NodeKind::Literal(lit) => Some(*lit),
            _ => None,
        })
    }
}

/// Incremental construction of a [`Circuit`].
///
/// Nodes must be added children-first: every child has to exist already.
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    kinds: Vec<NodeKind>,
    last_edge: Vec<usize>,
    edges: Vec<NodeId>,
    num_vars: u32,
    pos_lit_node: Vec<Option<NodeId>>,
    neg_lit_node: Vec<Option<NodeId>>,
}

impl CircuitBuilder {
    /// Creates a builder for a circuit over logic variables `1..=num_vars`.
    pub fn new(num_vars: u32) -> Self {
        Self::with_capacity(0, 0, num_vars)
    }

    /// Pre-allocates room for the given node and edge counts.
    ///
    /// The literal-to-node tables grow with the literals actually added.
    pub fn with_capacity(num_nodes: usize, num_edges: usize, num_vars: u32) -> Self {
        Self {
            kinds: Vec::with_capacity(num_nodes),
            last_edge: Vec::with_capacity(num_nodes),
            edges: Vec::with_capacity(num_edges),
            num_vars,
            pos_lit_node: Vec::new(),
            neg_lit_node: Vec::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.kinds.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.kinds.len());
        self.kinds.push(kind);
        self.last_edge.push(self.edges.len());
        id
    }

    pub fn constant(&mut self) -> NodeId {
        self.push(NodeKind::Constant)
    }

    /// Adds a literal leaf. A later leaf for the same literal replaces the earlier one
    /// in the literal-to-node tables.
    pub fn literal(&mut self, literal: Literal) -> Result<NodeId> {
        let var = literal.var();
        if var.id() > self.num_vars {
            return Err(Error::format(
                0,
                format!("literal {} exceeds declared variable count {}", literal.get(), self.num_vars),
            ));
        }
        let id = self.push(NodeKind::Literal(literal));
        let table = if literal.is_negative() {
            &mut self.neg_lit_node
        } else {
            &mut self.pos_lit_node
        };
        if var.index() >= table.len() {
            table.resize(var.index() + 1, None);
        }
        table[var.index()] = Some(id);
        Ok(id)
    }

    pub fn multiply(&mut self, children: &[NodeId]) -> Result<NodeId> {
        self.gate(NodeKind::Multiply, children)
    }

    pub fn add(&mut self, children: &[NodeId]) -> Result<NodeId> {
        self.gate(NodeKind::Add, children)
    }

    fn gate(&mut self, kind: NodeKind, children: &[NodeId]) -> Result<NodeId> {
        let next = self.kinds.len();
        if let Some(bad) = children.iter().find(|ch| ch.index() >= next) {
            return Err(Error::format(
                0,
                format!("child {} of node {} does not precede its parent", bad.index(), next),
            ));
        }
        self.edges.extend_from_slice(children);
        Ok(self.push(kind))
    }

    pub fn build(self) -> Result<Circuit> {
        if self.kinds.is_empty() {
            return Err(Error::format(0, "circuit has no nodes"));
        }
        Ok(Circuit {
            kinds: self.kinds,
            last_edge: self.last_edge,
            edges: self.edges,
            num_vars: self.num_vars,
            pos_lit_node: self.pos_lit_node,
            neg_lit_node: self.neg_lit_node,
        })
    }
}

// ─── nnf I/O ───

pub(crate) fn parse_token<T: FromStr>(token: Option<&&str>, what: &str, line: usize) -> Result<T> {
    let token = token.ok_or_else(|| Error::format(line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| Error::format(line, format!("invalid {}: {}", what, token)))
}

struct Header {
    nodes: usize,
    edges: usize,
}

impl Circuit {
    /// Reads a circuit from a file in `nnf` format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_nnf_str(&content)
    }

    /// Parses a circuit from `nnf` format string.
    ///
    /// Lines after the last declared node are ignored.
    pub fn from_nnf_str(content: &str) -> Result<Self> {
        let mut header: Option<Header> = None;
        let mut builder = CircuitBuilder::new(0);
        let mut children: Vec<NodeId> = Vec::new();

        for (i, raw) in content.lines().enumerate() {
            let line = i + 1;
            if raw.starts_with('c') {
                continue;
            }
            let parts: Vec<&str> = raw.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            if parts[0] == "nnf" {
                if header.is_some() {
                    return Err(Error::format(line, "duplicate nnf header"));
                }
                let nodes: usize = parse_token(parts.get(1), "node count", line)?;
                let edges: usize = parse_token(parts.get(2), "edge count", line)?;
                let vars: u32 = parse_token(parts.get(3), "variable count", line)?;
                // Counts come from the file; reserve no more than its content could hold.
                builder = CircuitBuilder::with_capacity(
                    nodes.min(content.len() / 4),
                    edges.min(content.len() / 2),
                    vars,
                );
                header = Some(Header { nodes, edges });
                if nodes == 0 {
                    break;
                }
                continue;
            }

            let Some(h) = &header else {
                return Err(Error::format(line, format!("node line before nnf header: {}", raw.trim())));
            };

            let child_start = match parts[0] {
                "A" => Some(2),
                "O" => Some(3),
                "L" => None,
                other => return Err(Error::format(line, format!("unexpected node type: {}", other))),
            };

            match child_start {
                Some(start) => {
                    if parts.len() < start {
                        return Err(Error::format(line, format!("truncated node line: {}", raw.trim())));
                    }
                    children.clear();
                    for token in &parts[start..] {
                        let child: usize = parse_token(Some(token), "child index", line)?;
                        children.push(NodeId::new(child));
                    }
                    if builder.num_edges() + children.len() > h.edges {
                        return Err(Error::format(line, format!("more than {} edges", h.edges)));
                    }
                    let result = if parts[0] == "A" {
                        builder.multiply(&children)
                    } else {
                        builder.add(&children)
                    };
                    result.map_err(|e| e.at_line(line))?;
                }
                None => {
                    let value: i32 = parse_token(parts.get(1), "literal", line)?;
                    let literal =
                        Literal::from_signed(value).ok_or_else(|| Error::format(line, "literal 0 is not allowed"))?;
                    builder.literal(literal).map_err(|e| e.at_line(line))?;
                }
            }

            if builder.num_nodes() == h.nodes {
                break;
            }
        }

        let Some(h) = header else {
            return Err(Error::format(0, "missing nnf header"));
        };
        if builder.num_nodes() < h.nodes {
            return Err(Error::format(
                0,
                format!("expected {} nodes, found {}", h.nodes, builder.num_nodes()),
            ));
        }

        let circuit = builder.build()?;
        debug!(
            "loaded circuit: {} nodes, {} edges, {} variables",
            circuit.num_nodes(),
            circuit.num_edges(),
            circuit.num_vars()
        );
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    const AND_OR: &str = "\
c x1 * x2 + ~x1
nnf 5 4 2
L 1
L 2
A 2 0 1
L -1
O 1 2 2 3
";

    #[test]
    fn test_parse_structure() {
        let circuit = Circuit::from_nnf_str(AND_OR).unwrap();
        assert_eq!(circuit.num_nodes(), 5);
        assert_eq!(circuit.num_edges(), 4);
        assert_eq!(circuit.num_vars(), 2);
        assert_eq!(circuit.root(), NodeId::new(4));
        assert_eq!(circuit.kind(NodeId::new(2)), NodeKind::Multiply);
        assert_eq!(circuit.kind(NodeId::new(4)), NodeKind::Add);
        assert_eq!(circuit.children(NodeId::new(2)), &[NodeId::new(0), NodeId::new(1)]);
        assert_eq!(circuit.children(NodeId::new(4)), &[NodeId::new(2), NodeId::new(3)]);
        assert!(circuit.children(NodeId::new(0)).is_empty());
    }

    #[test]
    fn test_literal_tables() {
        let circuit = Circuit::from_nnf_str(AND_OR).unwrap();
        let x1 = Literal::from_signed(1).unwrap();
        let x2 = Literal::from_signed(2).unwrap();
        assert_eq!(circuit.literal_node(x1), Some(NodeId::new(0)));
        assert_eq!(circuit.literal_node(-x1), Some(NodeId::new(3)));
        assert_eq!(circuit.literal_node(x2), Some(NodeId::new(1)));
        assert_eq!(circuit.literal_node(-x2), None);
        assert_eq!(circuit.literals().count(), 3);
    }

    #[test]
    fn test_trailing_lines_ignored() {
        let content = format!("{}garbage after the root\n", AND_OR);
        let circuit = Circuit::from_nnf_str(&content).unwrap();
        assert_eq!(circuit.num_nodes(), 5);
    }

    #[test]
    fn test_unexpected_token() {
        let err = Circuit::from_nnf_str("nnf 1 0 1\nX 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }), "{}", err);
    }

    #[test]
    fn test_node_before_header() {
        let err = Circuit::from_nnf_str("L 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
    }

    #[test]
    fn test_forward_child_rejected() {
        let err = Circuit::from_nnf_str("nnf 2 1 1\nA 1 1\nL 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }), "{}", err);
    }

    #[test]
    fn test_too_many_edges() {
        let err = Circuit::from_nnf_str("nnf 3 1 2\nL 1\nL 2\nA 2 0 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 4, .. }), "{}", err);
    }

    #[test]
    fn test_literal_out_of_range() {
        let err = Circuit::from_nnf_str("nnf 1 0 1\nL -2\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }), "{}", err);
    }

    #[test]
    fn test_missing_nodes() {
        let err = Circuit::from_nnf_str("nnf 3 0 2\nL 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        let err = Circuit::from_nnf_str("c only comments\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_oversized_header() {
        let err = Circuit::from_nnf_str("nnf 18446744073709551615 0 1\nL 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{}", err);
        let err = Circuit::from_nnf_str("nnf 1 0 4294967296\nL 1\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }), "{}", err);

        let circuit = Circuit::from_nnf_str("nnf 1 18446744073709551615 4294967295\nL -3\n").unwrap();
        assert_eq!(circuit.num_vars(), u32::MAX);
        assert_eq!(circuit.literal_node(Literal::from_signed(-3).unwrap()), Some(NodeId::new(0)));
        assert_eq!(circuit.literal_node(Literal::from_signed(i32::MAX).unwrap()), None);
    }

    #[test]
    fn test_builder() {
        let mut builder = CircuitBuilder::new(1);
        let one = builder.constant();
        let x = builder.literal(Literal::from_signed(1).unwrap()).unwrap();
        let root = builder.multiply(&[one, x]).unwrap();
        assert!(builder.add(&[NodeId::new(7)]).is_err());
        let circuit = builder.build().unwrap();
        assert_eq!(circuit.root(), root);
        assert_eq!(circuit.kind(one), NodeKind::Constant);
        assert!(CircuitBuilder::new(0).build().is_err());
    }
}
