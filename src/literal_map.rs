//! Reading Ace literal maps.
//!
//! # Literal Map Format (.lmap)
//!
//! Every record is a line starting with `cc$`; fields are `$`-separated.
//! All other lines are comments.
//!
//! ```text
//! cc$N$<count>                                          # number of logic variables
//! cc$V$<name>$<size>$<value>+                           # source variable
//! cc$T$<name>$<positions>                               # potential
//! cc$I$<literal>$<weight>$<var>$<value-name>$<index>    # indicator literal
//! cc$P$<literal>$<weight>$<pot>$<pos>[,<pos>]*          # parameter literal
//! cc$A$<literal>$<weight>                               # auxiliary literal
//! ```
//!
//! Indicator and parameter records may refer to variables and potentials
//! declared further down; their bindings are resolved after the last record.

use std::fs;
use std::path::Path;

use log::debug;

use crate::circuit::parse_token;
use crate::error::{Error, Result};
use crate::model::{Domain, Potential, Variable};
use crate::types::Literal;

const RECORD_PREFIX: &str = "cc$";

/// Decodes a domain value name into its integer value.
///
/// The first character is a prefix; an underscore right after it negates:
/// `v5` is 5, `v_5` is -5.
pub fn decode_value_name(name: &str) -> Option<i32> {
    let mut chars = name.chars();
    chars.next()?;
    let rest = chars.as_str();
    match rest.strip_prefix('_') {
        Some(digits) => digits.parse::<i32>().ok().map(|v| -v),
        None => rest.parse().ok(),
    }
}

enum Binding {
    Indicator {
        var: String,
        index: usize,
        literal: Literal,
        line: usize,
    },
    Parameter {
        pot: String,
        pos: usize,
        literal: Literal,
        line: usize,
    },
}

struct PendingVariable {
    name: String,
    values: Vec<String>,
    indicators: Vec<Option<Literal>>,
}

impl Domain {
    /// Reads a literal map from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_literal_map_str(&content)
    }

    /// Parses a literal map from a string.
    ///
    /// Parsing stops after `2 * N` literal records.
    pub fn from_literal_map_str(content: &str) -> Result<Self> {
        let mut num_vars: Option<u32> = None;
        let mut default_pos: Vec<f64> = vec![0.0];
        let mut default_neg: Vec<f64> = vec![0.0];
        let mut literal_records = 0usize;
        let mut variables: Vec<PendingVariable> = Vec::new();
        let mut potentials: Vec<(String, Vec<Option<Literal>>)> = Vec::new();
        let mut bindings: Vec<Binding> = Vec::new();

        for (i, raw) in content.lines().enumerate() {
            let line = i + 1;
            if let Some(n) = num_vars {
                if literal_records >= (n as usize).saturating_mul(2) {
                    break;
                }
            }
            if !raw.starts_with(RECORD_PREFIX) {
                continue;
            }
            let parts: Vec<&str> = raw.trim().split('$').filter(|t| !t.is_empty()).collect();
            let kind = parts.get(1).copied().unwrap_or("");

            match kind {
                "N" => {
                    if num_vars.is_some() {
                        return Err(Error::format(line, "duplicate N record"));
                    }
                    let n: u64 = parse_token(parts.get(2), "logic variable count", line)?;
                    // Literals are signed 32-bit, so larger counts cannot be addressed.
                    let n = u32::try_from(n)
                        .ok()
                        .filter(|&n| n <= i32::MAX as u32)
                        .ok_or_else(|| Error::format(line, format!("logic variable count {} is too large", n)))?;
                    num_vars = Some(n);
                }
                "V" => {
                    let name: String = parse_token(parts.get(2), "variable name", line)?;
                    let size: usize = parse_token(parts.get(3), "domain size", line)?;
                    let values: Vec<String> = parts.iter().skip(4).take(size).map(|s| s.to_string()).collect();
                    if values.len() != size {
                        return Err(Error::format(
                            line,
                            format!("variable {} declares {} values but lists {}", name, size, values.len()),
                        ));
                    }
                    if variables.iter().any(|v| v.name == name) {
                        return Err(Error::format(line, format!("duplicate variable {}", name)));
                    }
                    variables.push(PendingVariable {
                        name,
                        values,
                        indicators: vec![None; size],
                    });
                }
                "T" => {
                    let name: String = parse_token(parts.get(2), "potential name", line)?;
                    let count: usize = parse_token(parts.get(3), "parameter count", line)?;
                    if potentials.iter().any(|(n, _)| *n == name) {
                        return Err(Error::format(line, format!("duplicate potential {}", name)));
                    }
                    let mut parameters = Vec::new();
                    parameters
                        .try_reserve_exact(count)
                        .map_err(|_| Error::format(line, format!("parameter count {} is too large", count)))?;
                    parameters.resize(count, None);
                    potentials.push((name, parameters));
                }
                "I" | "P" | "A" => {
                    let Some(n) = num_vars else {
                        return Err(Error::format(line, "literal record before N record"));
                    };
                    let value: i32 = parse_token(parts.get(2), "literal", line)?;
                    let literal =
                        Literal::from_signed(value).ok_or_else(|| Error::format(line, "literal 0 is not allowed"))?;
                    let weight: f64 = parse_token(parts.get(3), "weight", line)?;
                    if literal.var().id() > n {
                        return Err(Error::format(
                            line,
                            format!("literal {} exceeds declared count {}", value, n),
                        ));
                    }
                    // Weight slots grow with the literals actually listed.
                    let slot = literal.var().index();
                    if slot >= default_pos.len() {
                        default_pos.resize(slot + 1, 0.0);
                        default_neg.resize(slot + 1, 0.0);
                    }
                    if literal.is_negative() {
                        default_neg[slot] = weight;
                    } else {
                        default_pos[slot] = weight;
                    }

                    if kind == "I" {
                        let var: String = parse_token(parts.get(4), "variable name", line)?;
                        let index: usize = parse_token(parts.get(6), "value index", line)?;
                        bindings.push(Binding::Indicator {
                            var,
                            index,
                            literal,
                            line,
                        });
                    } else if kind == "P" {
                        let pot: String = parse_token(parts.get(4), "potential name", line)?;
                        let positions = parts
                            .get(5)
                            .ok_or_else(|| Error::format(line, "missing parameter position"))?;
                        // Comma-joined positions denote a shared parameter, bound to none of them.
                        if !positions.contains(',') {
                            let pos: usize = parse_token(Some(positions), "parameter position", line)?;
                            bindings.push(Binding::Parameter {
                                pot,
                                pos,
                                literal,
                                line,
                            });
                        }
                    }
                    literal_records += 1;
                }
                _ => {
                    return Err(Error::format(
                        line,
                        "\"cc\" must be followed by \"N\", \"V\", \"T\", \"I\", \"P\", or \"A\"",
                    ))
                }
            }
        }

        let num_vars = num_vars.ok_or_else(|| Error::format(0, "missing N record"))?;

        for binding in bindings {
            match binding {
                Binding::Indicator {
                    var,
                    index,
                    literal,
                    line,
                } => {
                    let v = variables
                        .iter_mut()
                        .find(|v| v.name == var)
                        .ok_or_else(|| Error::format(line, format!("unknown variable {}", var)))?;
                    let slot = v.indicators.get_mut(index).ok_or_else(|| {
                        Error::format(line, format!("value index {} out of range for {}", index, var))
                    })?;
                    *slot = Some(literal);
                }
                Binding::Parameter {
                    pot,
                    pos,
                    literal,
                    line,
                } => {
                    let (_, parameters) = potentials
                        .iter_mut()
                        .find(|(name, _)| *name == pot)
                        .ok_or_else(|| Error::format(line, format!("unknown potential {}", pot)))?;
                    let slot = parameters.get_mut(pos).ok_or_else(|| {
                        Error::format(line, format!("parameter position {} out of range for {}", pos, pot))
                    })?;
                    *slot = Some(literal);
                }
            }
        }

        let mut resolved = Vec::with_capacity(variables.len());
        for v in variables {
            let indicators = v
                .indicators
                .iter()
                .enumerate()
                .map(|(u, lit)| {
                    lit.ok_or_else(|| Error::format(0, format!("value {} of {} has no indicator", v.values[u], v.name)))
                })
                .collect::<Result<Vec<_>>>()?;
            resolved.push(Variable::new(v.name, v.values, indicators));
        }
        let potentials: Vec<Potential> = potentials
            .into_iter()
            .map(|(name, parameters)| Potential::new(name, parameters))
            .collect();

        let domain = Domain::new(num_vars, default_pos, default_neg, resolved, potentials);
        debug!(
            "loaded literal map: {} logic variables, {} variables, {} potentials",
            domain.num_vars(),
            domain.variables().len(),
            domain.potentials().len()
        );
        Ok(domain)
    }
}
