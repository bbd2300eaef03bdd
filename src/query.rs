//! Reading probabilities, partials, marginals and posteriors off an [`Evaluator`].
//!
//! - **Partial**: derivative of the root at a literal's leaf.
//! - **Marginal**: partial times the literal's weight when the pass ran.
//! - **Posterior**: marginal divided by the probability of evidence.
//!
//! Everything except [`Evaluator::probability_of_evidence`] needs a two-pass evaluation.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::eval::{Evaluator, Pass};
use crate::model::{Potential, Variable};
use crate::types::Literal;

impl<'n> Evaluator<'n> {
    /// Root value of the most recent pass.
    pub fn probability_of_evidence(&self) -> Result<f64> {
        let root = self.network().circuit().root();
        match self.pass() {
            Pass::None => Err(Error::InvalidState("no evaluation pass has run".to_string())),
            Pass::Upward => Ok(self.value(root).value),
            Pass::TwoPass => Ok(self.value(root).computed()),
        }
    }

    fn require_two_pass(&self) -> Result<()> {
        if self.pass() == Pass::TwoPass {
            Ok(())
        } else {
            Err(Error::InvalidState(
                "derivatives require a two-pass evaluation".to_string(),
            ))
        }
    }

    /// Derivative at the literal's leaf; a literal absent from the circuit has partial 0.
    fn literal_partial(&self, literal: Literal) -> f64 {
        self.network()
            .circuit()
            .literal_node(literal)
            .map_or(0.0, |node| self.derivative(node))
    }

    fn snapshot_weight(&self, literal: Literal) -> f64 {
        if literal.is_negative() {
            self.snapshot_negative()[literal.var().index()]
        } else {
            self.snapshot_positive()[literal.var().index()]
        }
    }

    pub fn variable_partials(&self, var: &Variable) -> Result<Vec<f64>> {
        self.require_two_pass()?;
        Ok(var.indicators().iter().map(|&lit| self.literal_partial(lit)).collect())
    }

    pub fn variable_marginals(&self, var: &Variable) -> Result<Vec<f64>> {
        self.require_two_pass()?;
        Ok(var
            .indicators()
            .iter()
            .map(|&lit| self.literal_partial(lit) * self.snapshot_weight(lit))
            .collect())
    }

    pub fn variable_posteriors(&self, var: &Variable) -> Result<Vec<f64>> {
        let pe = self.probability_of_evidence()?;
        let mut marginals = self.variable_marginals(var)?;
        for m in marginals.iter_mut() {
            *m /= pe;
        }
        Ok(marginals)
    }

    /// Partials per parameter position; structural positions yield NaN.
    pub fn potential_partials(&self, pot: &Potential) -> Result<Vec<f64>> {
        self.require_two_pass()?;
        Ok(pot
            .parameters()
            .iter()
            .map(|lit| lit.map_or(f64::NAN, |lit| self.literal_partial(lit)))
            .collect())
    }

    pub fn potential_marginals(&self, pot: &Potential) -> Result<Vec<f64>> {
        let mut partials = self.potential_partials(pot)?;
        for (p, lit) in partials.iter_mut().zip(pot.parameters()) {
            if let Some(lit) = lit {
                *p *= self.snapshot_weight(*lit);
            }
        }
        Ok(partials)
    }

    pub fn potential_posteriors(&self, pot: &Potential) -> Result<Vec<f64>> {
        let pe = self.probability_of_evidence()?;
        let mut marginals = self.potential_marginals(pot)?;
        for m in marginals.iter_mut().filter(|m| !m.is_nan()) {
            *m /= pe;
        }
        Ok(marginals)
    }

    pub fn variables_partials<'v>(
        &self,
        vars: impl IntoIterator<Item = &'v Variable>,
    ) -> Result<BTreeMap<&'v str, Vec<f64>>> {
        by_name(vars, Variable::name, |v| self.variable_partials(v))
    }

    pub fn variables_marginals<'v>(
        &self,
        vars: impl IntoIterator<Item = &'v Variable>,
    ) -> Result<BTreeMap<&'v str, Vec<f64>>> {
        by_name(vars, Variable::name, |v| self.variable_marginals(v))
    }

    pub fn variables_posteriors<'v>(
        &self,
        vars: impl IntoIterator<Item = &'v Variable>,
    ) -> Result<BTreeMap<&'v str, Vec<f64>>> {
        by_name(vars, Variable::name, |v| self.variable_posteriors(v))
    }

    pub fn potentials_partials<'p>(
        &self,
        pots: impl IntoIterator<Item = &'p Potential>,
    ) -> Result<BTreeMap<&'p str, Vec<f64>>> {
        by_name(pots, Potential::name, |p| self.potential_partials(p))
    }

    pub fn potentials_marginals<'p>(
        &self,
        pots: impl IntoIterator<Item = &'p Potential>,
    ) -> Result<BTreeMap<&'p str, Vec<f64>>> {
        by_name(pots, Potential::name, |p| self.potential_marginals(p))
    }

    pub fn potentials_posteriors<'p>(
        &self,
        pots: impl IntoIterator<Item = &'p Potential>,
    ) -> Result<BTreeMap<&'p str, Vec<f64>>> {
        by_name(pots, Potential::name, |p| self.potential_posteriors(p))
    }
}

fn by_name<'a, T: 'a>(
    items: impl IntoIterator<Item = &'a T>,
    name: impl Fn(&'a T) -> &'a str,
    mut query: impl FnMut(&T) -> Result<Vec<f64>>,
) -> Result<BTreeMap<&'a str, Vec<f64>>> {
    items.into_iter().map(|item| Ok((name(item), query(item)?))).collect()
}
