//! # Grammar
//!
//! A context-free grammar held as an arena of rules. Productions refer to
//! rules by [`RuleId`], so recursive grammars need no reference cycles; the
//! grammar is immutable once built and is shared read-only behind an `Arc`.
//!
//! Building a grammar also analyses it:
//!
//! - the minimum depth of a production is one more than the deepest minimum
//!   depth among its rule symbols, or 0 if it holds literals only; a rule's
//!   minimum depth is the smallest of its productions';
//! - a production is recursive if expanding it can reach its own rule again,
//!   and a rule is recursive if any of its productions is.
//!
//! ## Example
//!
//! ```rust
//! use epochx::grammar::{lit, rule, Grammar};
//!
//! // <S> ::= a | b<S>
//! let grammar = Grammar::builder()
//!     .rule("S", vec![vec![lit("a")], vec![lit("b"), rule("S")]])
//!     .build()
//!     .unwrap();
//!
//! let start = grammar.start_rule();
//! assert_eq!(start.min_depth(), 0);
//! assert_eq!(start.productions()[1].min_depth(), 1);
//! assert!(start.is_recursive());
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{EpochError, Result};

/// Index of a rule in its grammar.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    /// Position of the rule in [`Grammar::rules`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// One symbol on the right-hand side of a production.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarSymbol {
    Rule(RuleId),
    Literal(String),
}

/// One alternative of a rule, with its analysed minimum depth.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarProduction {
    symbols: Vec<GrammarSymbol>,
    min_depth: usize,
    recursive: bool,
}

impl GrammarProduction {
    /// The right-hand side, left to right.
    pub fn symbols(&self) -> &[GrammarSymbol] {
        &self.symbols
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// The rules this production expands into, left to right.
    pub fn rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.symbols.iter().filter_map(|s| match s {
            GrammarSymbol::Rule(id) => Some(*id),
            GrammarSymbol::Literal(_) => None,
        })
    }
}

/// A named rule and its alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarRule {
    name: String,
    productions: Vec<GrammarProduction>,
    min_depth: usize,
    recursive: bool,
}

impl GrammarRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn productions(&self) -> &[GrammarProduction] {
        &self.productions
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

/// A validated grammar.
///
/// With the `serde` feature a grammar is written as its [`GrammarBuilder`]
/// definition and read back through [`GrammarBuilder::build`], so a
/// deserialized grammar is checked and analysed like a built one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "GrammarBuilder", into = "GrammarBuilder")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    rules: Vec<GrammarRule>,
    start: RuleId,
}

impl Grammar {
    /// Starts an empty builder.
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::default()
    }

    /// The rule every derivation starts from.
    pub fn start(&self) -> RuleId {
        self.start
    }

    pub fn start_rule(&self) -> &GrammarRule {
        self.rule(self.start)
    }

    /// The rule behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from a different grammar with fewer rules.
    pub fn rule(&self, id: RuleId) -> &GrammarRule {
        &self.rules[id.0]
    }

    /// All rules, indexed by [`RuleId`].
    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    /// Looks a rule up by name.
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rules.iter().position(|r| r.name == name).map(RuleId)
    }

    /// Depth of the shallowest complete derivation from the start rule.
    pub fn min_depth(&self) -> usize {
        self.start_rule().min_depth
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            write!(f, "<{}> ::=", rule.name)?;
            for (i, production) in rule.productions.iter().enumerate() {
                if i > 0 {
                    f.write_str(" |")?;
                }
                for symbol in &production.symbols {
                    match symbol {
                        GrammarSymbol::Rule(id) => write!(f, " <{}>", self.rule(*id).name)?,
                        GrammarSymbol::Literal(text) => write!(f, " {}", text)?,
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A right-hand-side symbol named before rule ids exist.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSpec {
    Rule(String),
    Literal(String),
}

/// A reference to the rule called `name`.
pub fn rule(name: &str) -> SymbolSpec {
    SymbolSpec::Rule(name.to_string())
}

/// A literal text fragment.
pub fn lit(text: &str) -> SymbolSpec {
    SymbolSpec::Literal(text.to_string())
}

/// Builder for [`Grammar`]. The first rule added is the start rule unless
/// [`GrammarBuilder::start`] names another.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    rules: Vec<(String, Vec<Vec<SymbolSpec>>)>,
    start: Option<String>,
}

impl GrammarBuilder {
    /// Adds a rule with one symbol list per alternative.
    pub fn rule(mut self, name: &str, productions: Vec<Vec<SymbolSpec>>) -> Self {
        self.rules.push((name.to_string(), productions));
        self
    }

    /// Names the start rule.
    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.to_string());
        self
    }

    /// Resolves rule names and analyses depths and recursion.
    ///
    /// ## Errors
    ///
    /// A configuration error for an empty grammar, a duplicate or undefined
    /// rule, a rule without productions, or a rule that can never finish
    /// expanding.
    pub fn build(self) -> Result<Grammar> {
        if self.rules.is_empty() {
            return Err(EpochError::Configuration("grammar has no rules".to_string()));
        }

        let mut ids = HashMap::with_capacity(self.rules.len());
        for (index, (name, productions)) in self.rules.iter().enumerate() {
            if ids.insert(name.as_str(), RuleId(index)).is_some() {
                return Err(EpochError::Configuration(format!(
                    "rule <{}> defined twice",
                    name
                )));
            }
            if productions.is_empty() {
                return Err(EpochError::Configuration(format!(
                    "rule <{}> has no productions",
                    name
                )));
            }
        }

        let resolve = |spec: &SymbolSpec| -> Result<GrammarSymbol> {
            match spec {
                SymbolSpec::Literal(text) => Ok(GrammarSymbol::Literal(text.clone())),
                SymbolSpec::Rule(name) => ids
                    .get(name.as_str())
                    .map(|id| GrammarSymbol::Rule(*id))
                    .ok_or_else(|| {
                        EpochError::Configuration(format!("undefined rule <{}>", name))
                    }),
            }
        };

        let resolved: Vec<Vec<Vec<GrammarSymbol>>> = self
            .rules
            .iter()
            .map(|(_, productions)| {
                productions
                    .iter()
                    .map(|symbols| symbols.iter().map(resolve).collect())
                    .collect()
            })
            .collect::<Result<_>>()?;

        let start = match &self.start {
            Some(name) => *ids.get(name.as_str()).ok_or_else(|| {
                EpochError::Configuration(format!("undefined start rule <{}>", name))
            })?,
            None => RuleId(0),
        };

        let min_depths = rule_min_depths(&resolved);
        if let Some(index) = min_depths.iter().position(Option::is_none) {
            return Err(EpochError::Configuration(format!(
                "rule <{}> never terminates",
                self.rules[index].0
            )));
        }
        let reachable = reachability(&resolved);

        let rules = self
            .rules
            .into_iter()
            .zip(resolved)
            .enumerate()
            .map(|(index, ((name, _), productions))| {
                let productions: Vec<GrammarProduction> = productions
                    .into_iter()
                    .map(|symbols| {
                        let min_depth = production_min_depth(&symbols, &min_depths)
                            .unwrap_or(usize::MAX);
                        let recursive = symbols.iter().any(|s| match s {
                            GrammarSymbol::Rule(id) => id.0 == index || reachable[id.0][index],
                            GrammarSymbol::Literal(_) => false,
                        });
                        GrammarProduction {
                            symbols,
                            min_depth,
                            recursive,
                        }
                    })
                    .collect();
                GrammarRule {
                    name,
                    recursive: productions.iter().any(|p| p.recursive),
                    min_depth: min_depths[index].unwrap_or(usize::MAX),
                    productions,
                }
            })
            .collect::<Vec<_>>();

        debug!(rules = rules.len(), "grammar built");
        Ok(Grammar { rules, start })
    }
}

impl TryFrom<GrammarBuilder> for Grammar {
    type Error = EpochError;

    fn try_from(builder: GrammarBuilder) -> Result<Self> {
        builder.build()
    }
}

impl From<Grammar> for GrammarBuilder {
    fn from(grammar: Grammar) -> Self {
        let name = |id: RuleId| grammar.rules[id.0].name.clone();
        let rules = grammar
            .rules
            .iter()
            .map(|r| {
                let productions = r
                    .productions
                    .iter()
                    .map(|p| {
                        p.symbols
                            .iter()
                            .map(|symbol| match symbol {
                                GrammarSymbol::Rule(id) => SymbolSpec::Rule(name(*id)),
                                GrammarSymbol::Literal(text) => SymbolSpec::Literal(text.clone()),
                            })
                            .collect()
                    })
                    .collect();
                (r.name.clone(), productions)
            })
            .collect();
        GrammarBuilder {
            rules,
            start: Some(name(grammar.start)),
        }
    }
}

fn production_min_depth(symbols: &[GrammarSymbol], rule_depths: &[Option<usize>]) -> Option<usize> {
    symbols.iter().try_fold(0, |depth, symbol| match symbol {
        GrammarSymbol::Literal(_) => Some(depth),
        GrammarSymbol::Rule(id) => rule_depths[id.0].map(|d| depth.max(d + 1)),
    })
}

/// Fixed point of the minimum-depth equations; `None` marks rules with no
/// finite derivation.
fn rule_min_depths(rules: &[Vec<Vec<GrammarSymbol>>]) -> Vec<Option<usize>> {
    let mut depths: Vec<Option<usize>> = vec![None; rules.len()];
    loop {
        let mut changed = false;
        for (index, productions) in rules.iter().enumerate() {
            let best = productions
                .iter()
                .filter_map(|symbols| production_min_depth(symbols, &depths))
                .min();
            if best.is_some() && (depths[index].is_none() || best < depths[index]) {
                depths[index] = best;
                changed = true;
            }
        }
        if !changed {
            return depths;
        }
    }
}

/// `reachable[a][b]` holds when rule `b` can appear somewhere below rule `a`.
fn reachability(rules: &[Vec<Vec<GrammarSymbol>>]) -> Vec<Vec<bool>> {
    let direct: Vec<Vec<usize>> = rules
        .iter()
        .map(|productions| {
            productions
                .iter()
                .flatten()
                .filter_map(|s| match s {
                    GrammarSymbol::Rule(id) => Some(id.0),
                    GrammarSymbol::Literal(_) => None,
                })
                .collect()
        })
        .collect();

    (0..rules.len())
        .map(|from| {
            let mut seen = vec![false; rules.len()];
            let mut stack = direct[from].clone();
            while let Some(next) = stack.pop() {
                if !seen[next] {
                    seen[next] = true;
                    stack.extend(&direct[next]);
                }
            }
            seen
        })
        .collect()
}
