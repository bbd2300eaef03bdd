//! Mutable overlay of literal weights.
//!
//! An [`Evidence`] starts out equal to the literal map defaults and is then
//! edited by committing and retracting values of source variables. Every
//! operation touches only the indicators (or the single parameter) involved,
//! so its cost is bounded by the domain size.

use crate::error::{Error, Result};
use crate::model::{Network, Potential, Variable};
use crate::types::Literal;

/// Current positive/negative weights of every logic variable.
///
/// Weights are indexed by logic variable id; slot 0 is unused.
/// The [`Variable`] and [`Potential`] arguments must come from the same [`Network`].
#[derive(Debug, Clone)]
pub struct Evidence<'n> {
    network: &'n Network,
    pos: Vec<f64>,
    neg: Vec<f64>,
}

impl<'n> Evidence<'n> {
    /// Creates evidence with every weight at its default.
    pub fn new(network: &'n Network) -> Self {
        let domain = network.domain();
        Self {
            network,
            pos: domain.default_positive().to_vec(),
            neg: domain.default_negative().to_vec(),
        }
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    /// Current weight of a literal.
    pub fn weight(&self, literal: Literal) -> f64 {
        if literal.is_negative() {
            self.neg[literal.var().index()]
        } else {
            self.pos[literal.var().index()]
        }
    }

    pub fn positive_weights(&self) -> &[f64] {
        &self.pos
    }

    pub fn negative_weights(&self) -> &[f64] {
        &self.neg
    }

    fn set_weight(&mut self, literal: Literal, weight: f64) {
        if literal.is_negative() {
            self.neg[literal.var().index()] = weight;
        } else {
            self.pos[literal.var().index()] = weight;
        }
    }

    fn restore(&mut self, literal: Literal) {
        let weight = self.network.domain().default_weight(literal);
        self.set_weight(literal, weight);
    }

    fn indicator(var: &Variable, value: usize) -> Result<Literal> {
        var.indicator(value).ok_or_else(|| {
            Error::InvalidOperation(format!(
                "value index {} out of range for {} (domain size {})",
                value,
                var.name(),
                var.domain_size()
            ))
        })
    }

    fn parameter(pot: &Potential, pos: usize) -> Result<Literal> {
        if pos == 0 {
            return Err(Error::InvalidOperation(format!(
                "position 0 of {} is reserved and cannot be set",
                pot.name()
            )));
        }
        pot.parameter(pos).ok_or_else(|| {
            Error::InvalidOperation(format!("position {} of {} has no settable parameter", pos, pot.name()))
        })
    }

    /// Resets every weight to its default.
    pub fn retract_all(&mut self) {
        let domain = self.network.domain();
        self.pos.copy_from_slice(domain.default_positive());
        self.neg.copy_from_slice(domain.default_negative());
    }

    /// Asserts `var = value`: all indicators of `var` are zeroed except the chosen one,
    /// which gets its default weight back.
    pub fn var_commit(&mut self, var: &Variable, value: usize) -> Result<()> {
        let chosen = Self::indicator(var, value)?;
        self.var_set(var, 0.0);
        self.restore(chosen);
        Ok(())
    }

    /// Allows (default weight) or disallows (weight 0) a single value, leaving the others untouched.
    pub fn val_commit(&mut self, var: &Variable, value: usize, allow: bool) -> Result<()> {
        let literal = Self::indicator(var, value)?;
        if allow {
            self.restore(literal);
        } else {
            self.set_weight(literal, 0.0);
        }
        Ok(())
    }

    /// Restores all indicators of `var` to their defaults.
    pub fn var_retract(&mut self, var: &Variable) {
        for &literal in var.indicators() {
            self.restore(literal);
        }
    }

    /// Sets every indicator of `var` to `weight` (soft evidence).
    pub fn var_set(&mut self, var: &Variable, weight: f64) {
        for &literal in var.indicators() {
            self.set_weight(literal, weight);
        }
    }

    /// Overrides the weight of the parameter at `pos`.
    pub fn parm_commit(&mut self, pot: &Potential, pos: usize, weight: f64) -> Result<()> {
        let literal = Self::parameter(pot, pos)?;
        self.set_weight(literal, weight);
        Ok(())
    }

    /// Restores the parameter at `pos` to its default.
    pub fn parm_retract(&mut self, pot: &Potential, pos: usize) -> Result<()> {
        let literal = Self::parameter(pot, pos)?;
        self.restore(literal);
        Ok(())
    }
}
