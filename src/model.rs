//! Domain model: source variables, potentials and the loaded network.
//!
//! A [`Network`] pairs a compiled [`Circuit`] with the [`Domain`] read from its
//! literal map. It is created once and never mutated afterwards, so it can be
//! shared by any number of [`Evidence`][crate::evidence::Evidence] and
//! [`Evaluator`][crate::eval::Evaluator] instances, across threads.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::literal_map::decode_value_name;
use crate::types::{Literal, LogicVar};

/// A source (network) variable with an ordered domain.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Variable {
    name: String,
    values: Vec<String>,
    indicators: Vec<Literal>,
}

impl Variable {
    pub(crate) fn new(name: String, values: Vec<String>, indicators: Vec<Literal>) -> Self {
        debug_assert_eq!(values.len(), indicators.len());
        Self {
            name,
            values,
            indicators,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain value names, in domain order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn domain_size(&self) -> usize {
        self.values.len()
    }

    /// Indicator literal of the value at `index`.
    pub fn indicator(&self, index: usize) -> Option<Literal> {
        self.indicators.get(index).copied()
    }

    pub fn indicators(&self) -> &[Literal] {
        &self.indicators
    }

    /// Decodes every value name into its signed integer value.
    ///
    /// Returns `None` if some name does not follow the `v5` / `v_5` convention.
    pub fn value_codes(&self) -> Option<Vec<i32>> {
        self.values.iter().map(|name| decode_value_name(name)).collect()
    }
}

/// A potential (conditional probability table) with numbered parameter positions.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Potential {
    name: String,
    parameters: Vec<Option<Literal>>,
}

impl Potential {
    pub(crate) fn new(name: String, parameters: Vec<Option<Literal>>) -> Self {
        Self { name, parameters }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_positions(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter literal bound at `pos`.
    ///
    /// `None` for structural positions (shared or never bound) and for `pos` out of range.
    pub fn parameter(&self, pos: usize) -> Option<Literal> {
        self.parameters.get(pos).copied().flatten()
    }

    pub fn parameters(&self) -> &[Option<Literal>] {
        &self.parameters
    }
}

/// Everything the literal map declares: default weights, variables and potentials.
///
/// Variables and potentials are kept sorted by name.
#[derive(Debug, Clone)]
pub struct Domain {
    num_vars: u32,
    default_pos: Vec<f64>,
    default_neg: Vec<f64>,
    variables: Vec<Variable>,
    potentials: Vec<Potential>,
    variable_index: HashMap<String, usize>,
    potential_index: HashMap<String, usize>,
}

impl Domain {
    pub(crate) fn new(
        num_vars: u32,
        default_pos: Vec<f64>,
        default_neg: Vec<f64>,
        mut variables: Vec<Variable>,
        mut potentials: Vec<Potential>,
    ) -> Self {
        debug_assert_eq!(default_pos.len(), default_neg.len());
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        potentials.sort_by(|a, b| a.name.cmp(&b.name));
        let variable_index = variables.iter().enumerate().map(|(i, v)| (v.name.clone(), i)).collect();
        let potential_index = potentials.iter().enumerate().map(|(i, p)| (p.name.clone(), i)).collect();
        Self {
            num_vars,
            default_pos,
            default_neg,
            variables,
            potentials,
            variable_index,
            potential_index,
        }
    }

    /// Number of logic variables (`N` record).
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Default weight of a literal as declared in the literal map (0 if never declared).
    pub fn default_weight(&self, literal: Literal) -> f64 {
        let table = if literal.is_negative() {
            &self.default_neg
        } else {
            &self.default_pos
        };
        table.get(literal.var().index()).copied().unwrap_or(0.0)
    }

    /// Extends the weight tables with zero weights so that `var` has a slot.
    fn cover(&mut self, var: LogicVar) {
        if var.index() >= self.default_pos.len() {
            self.default_pos.resize(var.index() + 1, 0.0);
            self.default_neg.resize(var.index() + 1, 0.0);
        }
    }

    /// Default positive-polarity weights, indexed by logic variable id (slot 0 unused).
    ///
    /// Only as long as the highest literal listed in the literal map or used by the circuit.
    pub fn default_positive(&self) -> &[f64] {
        &self.default_pos
    }

    /// Default negative-polarity weights, indexed by logic variable id (slot 0 unused).
    pub fn default_negative(&self) -> &[f64] {
        &self.default_neg
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn potentials(&self) -> &[Potential] {
        &self.potentials
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variable_index.get(name).map(|&i| &self.variables[i])
    }

    pub fn potential(&self, name: &str) -> Option<&Potential> {
        self.potential_index.get(name).map(|&i| &self.potentials[i])
    }

    /// Position of a variable in name order.
    pub fn variable_position(&self, name: &str) -> Option<usize> {
        self.variable_index.get(name).copied()
    }
}

/// A loaded circuit together with its literal map.
#[derive(Debug, Clone)]
pub struct Network {
    circuit: Circuit,
    domain: Domain,
}

impl Network {
    /// Pairs a circuit with a domain, checking that every circuit leaf has a weight slot.
    pub fn new(circuit: Circuit, mut domain: Domain) -> Result<Self> {
        if let Some(lit) = circuit.literals().find(|lit| lit.var().id() > domain.num_vars()) {
            return Err(Error::format(
                0,
                format!(
                    "circuit literal {} has no weight in a literal map of {} variables",
                    lit.get(),
                    domain.num_vars()
                ),
            ));
        }
        if let Some(var) = circuit.literals().map(|lit| lit.var()).max() {
            domain.cover(var);
        }
        Ok(Self { circuit, domain })
    }

    /// Loads a network from a circuit file and a literal-map file.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(circuit_path: P, literal_map_path: Q) -> Result<Self> {
        debug!(
            "loading network from {} and {}",
            circuit_path.as_ref().display(),
            literal_map_path.as_ref().display()
        );
        let circuit = Circuit::load(circuit_path)?;
        let domain = Domain::load(literal_map_path)?;
        Self::new(circuit, domain)
    }

    /// Parses a network from in-memory circuit and literal-map contents.
    pub fn from_strs(circuit: &str, literal_map: &str) -> Result<Self> {
        let circuit = Circuit::from_nnf_str(circuit)?;
        let domain = Domain::from_literal_map_str(literal_map)?;
        Self::new(circuit, domain)
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// All variables, sorted by name.
    pub fn variables(&self) -> &[Variable] {
        self.domain.variables()
    }

    /// All potentials, sorted by name.
    pub fn potentials(&self) -> &[Potential] {
        self.domain.potentials()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.domain.variable(name)
    }

    pub fn potential(&self, name: &str) -> Option<&Potential> {
        self.domain.potential(name)
    }
}
