//! Circuit evaluation: upward values and downward derivatives.
//!
//! The [`Evaluator`] owns per-node scratch arrays sized once for its network
//! and overwritten in place by every pass.
//!
//! # Zero handling
//!
//! A multiply node with a zero child has value 0, yet the derivative with
//! respect to that child is the product of the remaining children. The
//! two-pass evaluation therefore keeps, for a node with exactly one zero
//! child, the product of its nonzero children and marks the node as a
//! *degenerate zero*: it reports 0 to its parents ([`NodeValue::computed`])
//! while the downward pass routes its whole gradient to the zero child.
//! With two or more zero children every partial is 0 and the node is skipped.
//!
//! A product of nonzero factors that rounds to exactly 0.0 is an underflow
//! and aborts the pass with [`Error::Underflow`].

use log::debug;

use crate::circuit::NodeKind;
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::model::Network;
use crate::types::NodeId;

/// Value of a node after the most recent pass.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct NodeValue {
    /// Raw value; for a degenerate zero, the product of the nonzero children.
    pub value: f64,
    /// Exactly one child of this multiply node was zero.
    pub degenerate_zero: bool,
}

impl NodeValue {
    const fn plain(value: f64) -> Self {
        Self {
            value,
            degenerate_zero: false,
        }
    }

    /// The value seen by parent nodes.
    pub fn computed(self) -> f64 {
        if self.degenerate_zero {
            0.0
        } else {
            self.value
        }
    }
}

/// Which pass the evaluator state reflects.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Pass {
    /// No successful pass yet (or the last one failed).
    None,
    /// Values only.
    Upward,
    /// Values and derivatives.
    TwoPass,
}

/// Evaluates a network's circuit against an [`Evidence`].
#[derive(Debug, Clone)]
pub struct Evaluator<'n> {
    network: &'n Network,
    values: Vec<NodeValue>,
    derivatives: Vec<f64>,
    pass: Pass,
    snapshot_pos: Vec<f64>,
    snapshot_neg: Vec<f64>,
    evaluations: usize,
}

impl<'n> Evaluator<'n> {
    pub fn new(network: &'n Network) -> Self {
        let circuit = network.circuit();
        let slots = network.domain().default_positive().len();
        let values = (0..circuit.num_nodes())
            .map(|i| match circuit.kind(NodeId::new(i)) {
                NodeKind::Constant => NodeValue::plain(1.0),
                _ => NodeValue::default(),
            })
            .collect();
        Self {
            network,
            values,
            derivatives: vec![0.0; circuit.num_nodes()],
            pass: Pass::None,
            snapshot_pos: vec![0.0; slots],
            snapshot_neg: vec![0.0; slots],
            evaluations: 0,
        }
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// Number of successful passes run so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn value(&self, node: NodeId) -> NodeValue {
        self.values[node.index()]
    }

    pub fn values(&self) -> &[NodeValue] {
        &self.values
    }

    pub fn derivative(&self, node: NodeId) -> f64 {
        self.derivatives[node.index()]
    }

    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    /// Positive weights used by the most recent two-pass evaluation.
    pub(crate) fn snapshot_positive(&self) -> &[f64] {
        &self.snapshot_pos
    }

    /// Negative weights used by the most recent two-pass evaluation.
    pub(crate) fn snapshot_negative(&self) -> &[f64] {
        &self.snapshot_neg
    }

    fn check_network(&self, evidence: &Evidence) -> Result<()> {
        if std::ptr::eq(evidence.network(), self.network) {
            Ok(())
        } else {
            Err(Error::InvalidOperation(
                "evidence belongs to a different network".to_string(),
            ))
        }
    }

    /// Computes node values only. Returns the root value.
    pub fn evaluate(&mut self, evidence: &Evidence) -> Result<f64> {
        self.check_network(evidence)?;
        self.pass = Pass::None;
        let circuit = self.network.circuit();

        for i in 0..circuit.num_nodes() {
            let node = NodeId::new(i);
            match circuit.kind(node) {
                NodeKind::Constant => {}
                NodeKind::Literal(lit) => {
                    self.values[i] = NodeValue::plain(evidence.weight(lit));
                }
                NodeKind::Multiply => {
                    let mut v = 1.0;
                    for ch in circuit.children(node) {
                        let x = self.values[ch.index()].value;
                        if x == 0.0 {
                            v = 0.0;
                            break;
                        }
                        v *= x;
                        if v == 0.0 {
                            return Err(Error::Underflow { node: i });
                        }
                    }
                    self.values[i] = NodeValue::plain(v);
                }
                NodeKind::Add => {
                    let v = circuit.children(node).iter().map(|ch| self.values[ch.index()].value).sum();
                    self.values[i] = NodeValue::plain(v);
                }
            }
        }

        self.pass = Pass::Upward;
        self.evaluations += 1;
        let root = self.values[circuit.root().index()].value;
        debug!("upward pass: root = {}", root);
        Ok(root)
    }

    /// Computes node values and the derivative of the root with respect to every node.
    ///
    /// The evidence weights are snapshotted for marginal queries. Returns the root value.
    pub fn evaluate_with_derivatives(&mut self, evidence: &Evidence) -> Result<f64> {
        self.check_network(evidence)?;
        self.pass = Pass::None;
        self.snapshot_pos.copy_from_slice(evidence.positive_weights());
        self.snapshot_neg.copy_from_slice(evidence.negative_weights());
        self.upward_with_zeros(evidence)?;
        self.downward()?;

        self.pass = Pass::TwoPass;
        self.evaluations += 1;
        let root = self.values[self.network.circuit().root().index()].computed();
        debug!("two-pass evaluation: root = {}", root);
        Ok(root)
    }

    fn upward_with_zeros(&mut self, evidence: &Evidence) -> Result<()> {
        let circuit = self.network.circuit();

        for i in 0..circuit.num_nodes() {
            let node = NodeId::new(i);
            self.derivatives[i] = 0.0;
            match circuit.kind(node) {
                NodeKind::Constant => {}
                NodeKind::Literal(lit) => {
                    self.values[i] = NodeValue::plain(evidence.weight(lit));
                }
                NodeKind::Multiply => {
                    let mut zeros = 0;
                    let mut v = 1.0;
                    for ch in circuit.children(node) {
                        let x = self.values[ch.index()].computed();
                        if x == 0.0 {
                            zeros += 1;
                            if zeros > 1 {
                                v = 0.0;
                                break;
                            }
                        } else {
                            v *= x;
                            if v == 0.0 {
                                return Err(Error::Underflow { node: i });
                            }
                        }
                    }
                    self.values[i] = NodeValue {
                        value: v,
                        degenerate_zero: zeros == 1,
                    };
                }
                NodeKind::Add => {
                    let v = circuit
                        .children(node)
                        .iter()
                        .map(|ch| self.values[ch.index()].computed())
                        .sum();
                    self.values[i] = NodeValue::plain(v);
                }
            }
        }
        Ok(())
    }

    fn downward(&mut self) -> Result<()> {
        let circuit = self.network.circuit();
        let root = circuit.root().index();
        self.derivatives[root] = 1.0;

        for i in (0..=root).rev() {
            let node = NodeId::new(i);
            match circuit.kind(node) {
                NodeKind::Constant | NodeKind::Literal(_) => {}
                NodeKind::Add => {
                    let d = self.derivatives[i];
                    for ch in circuit.children(node) {
                        self.derivatives[ch.index()] += d;
                    }
                }
                NodeKind::Multiply => {
                    let NodeValue {
                        value,
                        degenerate_zero,
                    } = self.values[i];
                    // More than one zero child: every partial is zero.
                    if value == 0.0 {
                        continue;
                    }
                    let d = self.derivatives[i];
                    if d == 0.0 {
                        continue;
                    }
                    let x = d * value;
                    if x == 0.0 {
                        return Err(Error::Underflow { node: i });
                    }
                    let children = circuit.children(node);
                    if degenerate_zero {
                        if let Some(ch) = children.iter().find(|ch| self.values[ch.index()].computed() == 0.0) {
                            self.derivatives[ch.index()] += x;
                        }
                    } else {
                        for ch in children {
                            let c = self.values[ch.index()].computed();
                            self.derivatives[ch.index()] += x / c;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::circuit::CircuitBuilder;
    use crate::model::Domain;
    use crate::types::Literal;

    // f = x1 * x2 + x3 * x1
    const CIRCUIT: &str = "\
nnf 6 6 3
L 1
L 2
L 3
A 2 0 1
A 2 2 0
O 0 2 3 4
";

    const LITERAL_MAP: &str = "\
cc$N$3
cc$V$a$3$v0$v1$v2
cc$I$1$0.5$a$v0$0
cc$I$2$0.2$a$v1$1
cc$I$3$0.3$a$v2$2
";

    fn network() -> Network {
        Network::from_strs(CIRCUIT, LITERAL_MAP).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_upward_value() {
        let net = network();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        let root = eval.evaluate(&ev).unwrap();
        assert!(close(root, 0.5 * 0.2 + 0.3 * 0.5));
        assert_eq!(eval.pass(), Pass::Upward);
        assert_eq!(eval.evaluations(), 1);
    }

    #[test]
    fn test_derivatives_without_zeros() {
        let net = network();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        let root = eval.evaluate_with_derivatives(&ev).unwrap();
        assert!(close(root, 0.25));
        let circuit = net.circuit();
        let node = |l: i32| circuit.literal_node(Literal::from_signed(l).unwrap()).unwrap();
        // df/dx1 = x2 + x3, df/dx2 = x1, df/dx3 = x1
        assert!(close(eval.derivative(node(1)), 0.5));
        assert!(close(eval.derivative(node(2)), 0.5));
        assert!(close(eval.derivative(node(3)), 0.5));
        assert_eq!(eval.derivative(circuit.root()), 1.0);
    }

    #[test]
    fn test_single_zero_routes_gradient() {
        let net = network();
        let a = net.variable("a").unwrap();
        let mut ev = Evidence::new(&net);
        ev.val_commit(a, 0, false).unwrap();
        let mut eval = Evaluator::new(&net);
        let root = eval.evaluate_with_derivatives(&ev).unwrap();
        assert_eq!(root, 0.0);

        let circuit = net.circuit();
        let x1 = circuit.literal_node(Literal::from_signed(1).unwrap()).unwrap();
        let x2 = circuit.literal_node(Literal::from_signed(2).unwrap()).unwrap();
        // x1 = 0 still receives df/dx1 = x2 + x3.
        assert!(close(eval.derivative(x1), 0.5));
        // x2 sits next to the zero: its partial x1 = 0.
        assert_eq!(eval.derivative(x2), 0.0);

        let product = eval.value(NodeId::new(3));
        assert!(product.degenerate_zero);
        assert!(close(product.value, 0.2));
        assert_eq!(product.computed(), 0.0);
    }

    #[test]
    fn test_two_zeros_skip_node() {
        // x1 * x1 with x1 = 0: no single child to blame.
        let net = Network::from_strs("nnf 2 2 1\nL 1\nA 2 0 0\n", "cc$N$1\ncc$A$1$0.0\n").unwrap();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        let root = eval.evaluate_with_derivatives(&ev).unwrap();
        assert_eq!(root, 0.0);
        assert!(!eval.value(NodeId::new(1)).degenerate_zero);
        assert_eq!(eval.derivative(NodeId::new(0)), 0.0);
    }

    #[test]
    fn test_first_zero_gets_gradient() {
        // x1 * x2 * x3 with only x2 = 0.
        let circuit = "nnf 5 4 3\nL 1\nL 2\nL 3\nA 3 0 1 2\nO 0 1 3\n";
        let map = "cc$N$3\ncc$A$1$2.0\ncc$A$2$0.0\ncc$A$3$4.0\n";
        let net = Network::from_strs(circuit, map).unwrap();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        eval.evaluate_with_derivatives(&ev).unwrap();
        assert_eq!(eval.derivative(NodeId::new(1)), 8.0);
        assert_eq!(eval.derivative(NodeId::new(0)), 0.0);
        assert_eq!(eval.derivative(NodeId::new(2)), 0.0);
    }

    #[test]
    fn test_constant_node() {
        let mut builder = CircuitBuilder::new(0);
        let one = builder.constant();
        builder.add(&[one, one]).unwrap();
        let domain = Domain::from_literal_map_str("cc$N$0\n").unwrap();
        let net = Network::new(builder.build().unwrap(), domain).unwrap();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        assert_eq!(eval.evaluate(&ev).unwrap(), 2.0);
        assert_eq!(eval.evaluate_with_derivatives(&ev).unwrap(), 2.0);
        assert_eq!(eval.derivative(one), 2.0);
    }

    #[test]
    fn test_empty_product_is_one() {
        let net = Network::from_strs("nnf 1 0 0\nA 0\n", "cc$N$0\n").unwrap();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        assert_eq!(eval.evaluate(&ev).unwrap(), 1.0);
    }

    #[test]
    fn test_repeated_passes_identical() {
        let net = network();
        let ev = Evidence::new(&net);
        let mut eval = Evaluator::new(&net);
        eval.evaluate_with_derivatives(&ev).unwrap();
        let values = eval.values().to_vec();
        let derivatives = eval.derivatives().to_vec();
        eval.evaluate_with_derivatives(&ev).unwrap();
        assert_eq!(eval.values(), values.as_slice());
        assert_eq!(eval.derivatives(), derivatives.as_slice());
        assert_eq!(eval.evaluations(), 2);
    }

    #[test]
    fn test_foreign_evidence_rejected() {
        let net = network();
        let other = network();
        let ev = Evidence::new(&other);
        let mut eval = Evaluator::new(&net);
        assert!(matches!(eval.evaluate(&ev), Err(Error::InvalidOperation(_))));
    }
}
