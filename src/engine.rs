//! Query engine for search: evidence vectors in, cached probabilities out.
//!
//! Search procedures describe evidence as an ordered list of
//! `(variable id, domain value)` pairs that grows and shrinks at the end as
//! the search descends and backtracks. [`QueryEngine`] keeps the evidence it
//! last evaluated, turns each new vector into the minimal set of commits and
//! retracts against it, and memoizes the per-value results of every
//! `(evidence, target)` query so revisited prefixes cost a hash lookup.
//!
//! Variable ids are positions in [`Network::variables`] (name order); domain
//! values are the integers encoded in value names (`v5` is 5, `v_5` is -5).
//!
//! # Example
//!
//! ```
//! use ac_eval::engine::QueryEngine;
//! use ac_eval::model::Network;
//!
//! // P(a = 0) = 0.25, P(a = 1) = 0.75
//! let circuit = "nnf 7 6 4\nL 1\nL 3\nA 2 0 1\nL 2\nL 4\nA 2 3 4\nO 0 2 2 5\n";
//! let literal_map = "\
//! cc$N$4
//! cc$V$a$2$v0$v1
//! cc$I$1$1.0$a$v0$0
//! cc$I$2$1.0$a$v1$1
//! cc$A$3$0.25
//! cc$A$4$0.75
//! ";
//! let network = Network::from_strs(circuit, literal_map).unwrap();
//! let mut engine = QueryEngine::new(&network).unwrap();
//!
//! let dist = engine.query_marginals(&[], 0).unwrap();
//! assert_eq!(dist, vec![(0, 0.25), (1, 0.75)]);
//! assert_eq!(engine.query_probability(&[(0, 1)]).unwrap(), 0.75);
//! ```

use std::collections::HashMap;

use log::{debug, trace};

use crate::cache::{Memo, TargetStats};
use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::eval::{Evaluator, Pass};
use crate::evidence::Evidence;
use crate::model::{Network, Potential, Variable};

/// One piece of evidence: `(variable id, domain value)`.
pub type Assignment = (usize, i32);

/// Evidence-diffing, memoizing front end over an [`Evidence`] and an [`Evaluator`].
///
/// One engine per search worker; the [`Network`] itself can be shared.
pub struct QueryEngine<'n> {
    network: &'n Network,
    config: QueryConfig,
    evidence: Evidence<'n>,
    evaluator: Evaluator<'n>,
    value_ids: Vec<Vec<i32>>,
    value_index: Vec<HashMap<i32, usize>>,
    /// Evidence currently committed in `evidence`.
    current: Vec<Assignment>,
    /// The evaluator's two-pass state reflects `current`.
    synced: bool,
    memo: Memo,
    /// Variable read for the probability of empty evidence.
    probe: Option<usize>,
    commits: Vec<(usize, usize)>,
    retracts: Vec<usize>,
}

impl<'n> QueryEngine<'n> {
    pub fn new(network: &'n Network) -> Result<Self> {
        Self::with_config(network, QueryConfig::default())
    }

    /// Creates an engine, decoding every variable's value names.
    pub fn with_config(network: &'n Network, config: QueryConfig) -> Result<Self> {
        let mut value_ids = Vec::with_capacity(network.variables().len());
        let mut value_index = Vec::with_capacity(network.variables().len());
        for var in network.variables() {
            let codes = var.value_codes().ok_or_else(|| {
                Error::format(0, format!("value names of {} do not encode integers: {:?}", var.name(), var.values()))
            })?;
            value_index.push(codes.iter().enumerate().map(|(i, &c)| (c, i)).collect());
            value_ids.push(codes);
        }

        let circuit = network.circuit();
        let probe = network
            .variables()
            .iter()
            .position(|var| var.indicators().iter().any(|&lit| circuit.literal_node(lit).is_some()));
        let memo = Memo::new(if config.caching { value_ids.len() } else { 0 }, config.cache_bits);

        Ok(Self {
            network,
            config,
            evidence: Evidence::new(network),
            evaluator: Evaluator::new(network),
            value_ids,
            value_index,
            current: Vec::new(),
            synced: false,
            memo,
            probe,
            commits: Vec::new(),
            retracts: Vec::new(),
        })
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// The variables, indexed by id.
    pub fn variables(&self) -> &'n [Variable] {
        self.network.variables()
    }

    pub fn potentials(&self) -> &'n [Potential] {
        self.network.potentials()
    }

    pub fn num_vars(&self) -> usize {
        self.value_ids.len()
    }

    /// Variable name to id.
    pub fn variable_ids(&self) -> HashMap<String, usize> {
        self.variables()
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name().to_string(), i))
            .collect()
    }

    /// Decoded domain values per variable id, in domain order.
    pub fn value_ids(&self) -> &[Vec<i32>] {
        &self.value_ids
    }

    pub fn domain_size(&self, var: usize) -> Option<usize> {
        self.value_ids.get(var).map(|v| v.len())
    }

    /// Evidence as currently committed.
    pub fn evidence(&self) -> &Evidence<'n> {
        &self.evidence
    }

    pub fn evaluator(&self) -> &Evaluator<'n> {
        &self.evaluator
    }

    /// Number of circuit evaluations run so far.
    pub fn evaluations(&self) -> usize {
        self.evaluator.evaluations()
    }

    pub fn cache_hits(&self) -> usize {
        self.memo.hits()
    }

    pub fn cache_misses(&self) -> usize {
        self.memo.misses()
    }

    /// Cache counters of queries targeting `var`.
    pub fn cache_stats(&self, var: usize) -> TargetStats {
        self.memo.stats(var)
    }

    /// Drops all memoized results; the committed evidence is kept.
    pub fn clear_cache(&mut self) {
        self.memo.clear();
    }

    fn check_var(&self, var: usize) -> Result<()> {
        if var < self.value_ids.len() {
            Ok(())
        } else {
            Err(Error::InvalidOperation(format!("unknown variable id {}", var)))
        }
    }

    fn value_position(&self, var: usize, value: i32) -> Result<usize> {
        self.check_var(var)?;
        self.value_index[var].get(&value).copied().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "value {} is not in the domain of {}",
                value,
                self.variables()[var].name()
            ))
        })
    }

    /// For each value of `target`, the probability of `evidence` extended with `target = value`.
    ///
    /// Each entry is the partial at the value's indicator times the indicator's default weight,
    /// the same quantity [`query_probability_with`][Self::query_probability_with] returns.
    pub fn query_marginals(&mut self, evidence: &[Assignment], target: usize) -> Result<Vec<(i32, f64)>> {
        trace!("query_marginals(target = {}, evidence = {:?})", target, evidence);
        let joints = self.joints(evidence, target)?;
        Ok(self.value_ids[target].iter().copied().zip(joints).collect())
    }

    /// Probability of `evidence`.
    ///
    /// Routed through the results of a variable with leaves in the circuit, so the answer is
    /// served from the same cache as [`query_marginals`][Self::query_marginals]. Without such
    /// a variable the circuit is evaluated directly.
    pub fn query_probability(&mut self, evidence: &[Assignment]) -> Result<f64> {
        trace!("query_probability(evidence = {:?})", evidence);
        match evidence.split_last() {
            Some((&(var, value), rest)) => self.query_probability_with(rest, var, value),
            None => match self.probe {
                Some(probe) => Ok(self.joints(evidence, probe)?.iter().sum()),
                None => {
                    self.sync(evidence)?;
                    self.evaluator.probability_of_evidence()
                }
            },
        }
    }

    /// Probability of `evidence` extended with `var = value`; `var` must not occur in `evidence`.
    pub fn query_probability_with(&mut self, evidence: &[Assignment], var: usize, value: i32) -> Result<f64> {
        let index = self.value_position(var, value)?;
        Ok(self.joints(evidence, var)?[index])
    }

    /// Per-value joint probabilities of `target` under `evidence`, from the cache when possible.
    fn joints(&mut self, evidence: &[Assignment], target: usize) -> Result<Vec<f64>> {
        self.check_var(target)?;

        if self.config.caching {
            if let Some(joints) = self.memo.get(target, evidence) {
                debug!("cache hit for target {} ({} assignments)", target, evidence.len());
                return Ok(joints.to_vec());
            }
            debug!("cache miss for target {} ({} assignments)", target, evidence.len());
        }

        self.sync(evidence)?;
        let var = &self.variables()[target];
        let domain = self.network.domain();
        let joints: Vec<f64> = self
            .evaluator
            .variable_partials(var)?
            .into_iter()
            .zip(var.indicators())
            .map(|(partial, &lit)| partial * domain.default_weight(lit))
            .collect();

        if self.config.caching {
            self.memo.insert(target, evidence, joints.clone());
        }
        Ok(joints)
    }

    /// Brings the committed evidence to `evidence` and runs a two-pass evaluation if anything changed.
    fn sync(&mut self, evidence: &[Assignment]) -> Result<()> {
        self.commits.clear();
        self.retracts.clear();

        let common = evidence.len().min(self.current.len());
        for (new, old) in evidence[..common].iter().zip(&self.current[..common]) {
            if new == old {
                continue;
            }
            let index = self.value_position(new.0, new.1)?;
            if new.0 != old.0 {
                self.retracts.push(old.0);
            }
            self.commits.push((new.0, index));
        }
        for &(var, value) in &evidence[common..] {
            let index = self.value_position(var, value)?;
            self.commits.push((var, index));
        }
        for &(var, _) in &self.current[common..] {
            self.retracts.push(var);
        }

        if self.commits.is_empty() && self.retracts.is_empty() && self.synced {
            return Ok(());
        }

        let variables = self.network.variables();
        for &var in &self.retracts {
            trace!("retract {}", variables[var].name());
            self.evidence.var_retract(&variables[var]);
        }
        for &(var, index) in &self.commits {
            trace!("commit {} = {}", variables[var].name(), variables[var].values()[index]);
            self.evidence.var_commit(&variables[var], index)?;
        }
        self.current.clear();
        self.current.extend_from_slice(evidence);

        self.synced = false;
        self.evaluator.evaluate_with_derivatives(&self.evidence)?;
        self.synced = self.evaluator.pass() == Pass::TwoPass;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    // a in {0, 1}, b in {-1, 1}, P(a) = 0.4 / 0.6, P(b | a) = 0.5 / 0.5 and 0.1 / 0.9.
    const CIRCUIT: &str = "\
nnf 19 20 10
L 1
L 2
L 3
L 4
L 5
L 6
L 7
L 8
L 9
L 10
A 2 4 6
A 2 5 7
O 0 2 10 11
A 3 0 2 12
A 2 4 8
A 2 5 9
O 0 2 14 15
A 3 1 3 16
O 0 2 13 17
";

    const LITERAL_MAP: &str = "\
cc$N$10
cc$V$a$2$v0$v1
cc$V$b$2$v_1$v1
cc$I$1$1.0$a$v0$0
cc$I$2$1.0$a$v1$1
cc$A$3$0.4
cc$A$4$0.6
cc$I$5$1.0$b$v_1$0
cc$I$6$1.0$b$v1$1
cc$A$7$0.5
cc$A$8$0.5
cc$A$9$0.1
cc$A$10$0.9
";

    fn network() -> Network {
        Network::from_strs(CIRCUIT, LITERAL_MAP).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_value_decoding() {
        let net = network();
        let engine = QueryEngine::new(&net).unwrap();
        assert_eq!(engine.num_vars(), 2);
        assert_eq!(engine.value_ids(), &[vec![0, 1], vec![-1, 1]]);
        assert_eq!(engine.variable_ids()["b"], 1);
        assert_eq!(engine.domain_size(1), Some(2));
        assert_eq!(engine.domain_size(2), None);
    }

    #[test]
    fn test_undecodable_values_rejected() {
        let map = LITERAL_MAP.replace("cc$V$a$2$v0$v1", "cc$V$a$2$no$yes");
        let net = Network::from_strs(CIRCUIT, &map).unwrap();
        assert!(matches!(QueryEngine::new(&net), Err(Error::Format { .. })));
    }

    #[test]
    fn test_marginals() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        let a = engine.query_marginals(&[], 0).unwrap();
        assert_eq!(a.len(), 2);
        assert!(close(a[0].1, 0.4) && close(a[1].1, 0.6));

        let b = engine.query_marginals(&[(0, 1)], 1).unwrap();
        assert_eq!(b[0].0, -1);
        assert!(close(b[0].1, 0.06));
        assert!(close(b[1].1, 0.54));
    }

    #[test]
    fn test_repeated_query_hits_cache() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        let first = engine.query_marginals(&[(0, 0)], 1).unwrap();
        let evaluations = engine.evaluations();
        let second = engine.query_marginals(&[(0, 0)], 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.evaluations(), evaluations);
        assert_eq!(engine.cache_hits(), 1);
    }

    #[test]
    fn test_other_target_same_evidence_skips_evaluation() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        engine.query_marginals(&[(1, 1)], 1).unwrap();
        let evaluations = engine.evaluations();
        let a = engine.query_marginals(&[(1, 1)], 0).unwrap();
        assert_eq!(engine.evaluations(), evaluations);
        assert!(close(a[0].1, 0.2));
        assert!(close(a[1].1, 0.54));
    }

    #[test]
    fn test_backtracking_retracts() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        engine.query_marginals(&[(0, 1), (1, -1)], 0).unwrap();
        let b = engine.query_marginals(&[(0, 0)], 1).unwrap();
        assert!(close(b[0].1, 0.2) && close(b[1].1, 0.2));

        let mut expected = Evidence::new(&net);
        expected.var_commit(&net.variables()[0], 0).unwrap();
        assert_eq!(engine.evidence().positive_weights(), expected.positive_weights());
    }

    #[test]
    fn test_probability() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        assert!(close(engine.query_probability(&[]).unwrap(), 1.0));
        assert!(close(engine.query_probability(&[(0, 1)]).unwrap(), 0.6));
        assert!(close(engine.query_probability(&[(0, 1), (1, 1)]).unwrap(), 0.54));
        assert!(close(engine.query_probability_with(&[(0, 0)], 1, -1).unwrap(), 0.2));
    }

    #[test]
    fn test_unknown_value_leaves_state() {
        let net = network();
        let mut engine = QueryEngine::new(&net).unwrap();

        engine.query_marginals(&[(0, 1)], 1).unwrap();
        let before = engine.evidence().positive_weights().to_vec();
        let err = engine.query_marginals(&[(0, 0), (1, 7)], 1).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(engine.evidence().positive_weights(), before.as_slice());
        assert!(matches!(engine.query_marginals(&[], 5), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_marginals_scale_by_indicator_weight() {
        let circuit = "nnf 3 2 2\nL 1\nL 2\nO 0 2 0 1\n";
        let literal_map = "cc$N$2\ncc$V$a$2$v0$v1\ncc$I$1$0.3$a$v0$0\ncc$I$2$0.7$a$v1$1\n";
        let net = Network::from_strs(circuit, literal_map).unwrap();
        let mut engine = QueryEngine::new(&net).unwrap();

        let dist = engine.query_marginals(&[], 0).unwrap();
        assert_eq!(dist[0].0, 0);
        assert!(close(dist[0].1, 0.3) && close(dist[1].1, 0.7));
        assert!(close(engine.query_probability(&[(0, 0)]).unwrap(), dist[0].1));
        assert!(close(engine.query_probability(&[(0, 1)]).unwrap(), dist[1].1));
        assert!(close(engine.query_probability(&[]).unwrap(), 1.0));
    }

    #[test]
    fn test_probe_skips_variables_without_leaves() {
        // `a` sorts first but none of its indicators is in the circuit.
        let circuit = "nnf 7 6 6\nL 3\nL 5\nA 2 0 1\nL 4\nL 6\nA 2 3 4\nO 0 2 2 5\n";
        let literal_map = "\
cc$N$6
cc$V$a$2$v0$v1
cc$V$b$2$v0$v1
cc$I$1$1.0$a$v0$0
cc$I$2$1.0$a$v1$1
cc$I$3$1.0$b$v0$0
cc$I$4$1.0$b$v1$1
cc$A$5$0.25
cc$A$6$0.75
";
        let net = Network::from_strs(circuit, literal_map).unwrap();
        let mut engine = QueryEngine::new(&net).unwrap();

        assert!(close(engine.query_probability(&[]).unwrap(), 1.0));
        assert_eq!(engine.cache_stats(1).misses, 1);
        assert_eq!(engine.cache_stats(0), TargetStats::default());
        assert!(close(engine.query_probability(&[(1, 1)]).unwrap(), 0.75));
    }

    #[test]
    fn test_probability_without_any_leaves() {
        let literal_map = "cc$N$2\ncc$V$a$2$v0$v1\ncc$I$1$1.0$a$v0$0\ncc$I$2$1.0$a$v1$1\n";
        let net = Network::from_strs("nnf 1 0 0\nA 0\n", literal_map).unwrap();
        let mut engine = QueryEngine::new(&net).unwrap();
        assert_eq!(engine.query_probability(&[]).unwrap(), 1.0);
        assert_eq!(engine.evaluations(), 1);
    }

    #[test]
    fn test_without_caching() {
        let net = network();
        let config = QueryConfig::default().with_caching(false);
        let mut engine = QueryEngine::with_config(&net, config).unwrap();

        let first = engine.query_marginals(&[(0, 1)], 1).unwrap();
        let second = engine.query_marginals(&[(0, 1)], 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_hits(), 0);
        // Unchanged evidence still needs no second evaluation.
        assert_eq!(engine.evaluations(), 1);
    }
}
