//! # Derivation trees
//!
//! The parse tree produced by expanding a grammar: every non-terminal records
//! the rule it expands and the index of the production chosen, and holds one
//! child per symbol of that production. The phenotype is the concatenation of
//! the terminal text in order.
//!
//! Non-terminals are addressed by their pre-order index among non-terminals
//! only; terminals are never crossover or mutation points. The level of a
//! non-terminal is its nesting depth below the root (root at level 0), and the
//! depth of a tree is the deepest level of any non-terminal.

use std::fmt;

use crate::error::{EpochError, Result};
use crate::grammar::model::{Grammar, GrammarSymbol, RuleId};

/// A literal leaf of a derivation tree.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalSymbol {
    text: String,
}

impl TerminalSymbol {
    /// A terminal printing as `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A child of a non-terminal: another expansion or a literal.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    NonTerminal(NonTerminalSymbol),
    Terminal(TerminalSymbol),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    /// The non-terminal inside, if this symbol is one.
    pub fn as_nonterminal(&self) -> Option<&NonTerminalSymbol> {
        match self {
            Symbol::NonTerminal(nt) => Some(nt),
            Symbol::Terminal(_) => None,
        }
    }

    fn length(&self) -> usize {
        match self {
            Symbol::NonTerminal(nt) => nt.length(),
            Symbol::Terminal(_) => 1,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::NonTerminal(nt) => nt.fmt(f),
            Symbol::Terminal(t) => f.write_str(&t.text),
        }
    }
}

/// An expanded rule.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonTerminalSymbol {
    rule: RuleId,
    production: usize,
    children: Vec<Symbol>,
}

/// A complete derivation, rooted at the grammar's start rule.
pub type DerivationTree = NonTerminalSymbol;

impl NonTerminalSymbol {
    /// An expansion of `rule` by its `production`-th alternative.
    pub fn new(rule: RuleId, production: usize, children: Vec<Symbol>) -> Self {
        Self {
            rule,
            production,
            children,
        }
    }

    /// The rule this symbol expands.
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Index of the chosen production within the rule.
    pub fn production(&self) -> usize {
        self.production
    }

    /// The expansion, one symbol per production symbol.
    pub fn children(&self) -> &[Symbol] {
        &self.children
    }

    /// Deepest non-terminal level below this one; 0 when every child is a
    /// terminal.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .filter_map(Symbol::as_nonterminal)
            .map(|nt| nt.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of symbols, terminals included.
    pub fn length(&self) -> usize {
        1 + self.children.iter().map(Symbol::length).sum::<usize>()
    }

    /// Number of non-terminals, this one included.
    pub fn nonterminal_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .filter_map(Symbol::as_nonterminal)
            .map(NonTerminalSymbol::nonterminal_count)
            .sum::<usize>()
    }

    /// Number of literal leaves.
    pub fn terminal_count(&self) -> usize {
        self.length() - self.nonterminal_count()
    }

    /// Non-terminals in pre-order, this one first.
    pub fn nonterminals(&self) -> NonTerminals<'_> {
        NonTerminals { stack: vec![self] }
    }

    /// The non-terminal at pre-order index `n`; index 0 is `self`.
    pub fn nth_nonterminal(&self, n: usize) -> Option<&NonTerminalSymbol> {
        self.nonterminals().nth(n)
    }

    /// Mutable access to the non-terminal at pre-order index `n`.
    pub fn nth_nonterminal_mut(&mut self, n: usize) -> Option<&mut NonTerminalSymbol> {
        if n == 0 {
            return Some(self);
        }
        let mut remaining = n - 1;
        for child in &mut self.children {
            if let Symbol::NonTerminal(nt) = child {
                let count = nt.nonterminal_count();
                if remaining < count {
                    return nt.nth_nonterminal_mut(remaining);
                }
                remaining -= count;
            }
        }
        None
    }

    /// Replaces the `n`th non-terminal, returning the one removed.
    ///
    /// ## Errors
    ///
    /// `EpochError::Index` if there are `n` or fewer non-terminals.
    pub fn set_nth_nonterminal(
        &mut self,
        n: usize,
        replacement: NonTerminalSymbol,
    ) -> Result<NonTerminalSymbol> {
        let count = self.nonterminal_count();
        let slot = self.nth_nonterminal_mut(n).ok_or_else(|| {
            EpochError::Index(format!("non-terminal index {} out of range 0..{}", n, count))
        })?;
        Ok(std::mem::replace(slot, replacement))
    }

    /// Level of every non-terminal, in pre-order.
    pub fn nonterminal_levels(&self) -> Vec<usize> {
        let mut levels = Vec::with_capacity(self.nonterminal_count());
        self.collect_levels(0, &mut levels);
        levels
    }

    fn collect_levels(&self, level: usize, levels: &mut Vec<usize>) {
        levels.push(level);
        for nt in self.children.iter().filter_map(Symbol::as_nonterminal) {
            nt.collect_levels(level + 1, levels);
        }
    }

    /// Terminal symbols left to right.
    pub fn terminals(&self) -> Vec<&TerminalSymbol> {
        let mut terminals = Vec::new();
        self.collect_terminals(&mut terminals);
        terminals
    }

    fn collect_terminals<'a>(&'a self, terminals: &mut Vec<&'a TerminalSymbol>) {
        for child in &self.children {
            match child {
                Symbol::Terminal(t) => terminals.push(t),
                Symbol::NonTerminal(nt) => nt.collect_terminals(terminals),
            }
        }
    }

    /// Checks that every expansion is one of its rule's productions.
    pub fn conforms_to(&self, grammar: &Grammar) -> bool {
        let Some(rule) = grammar.rules().get(self.rule.index()) else {
            return false;
        };
        let Some(production) = rule.productions().get(self.production) else {
            return false;
        };
        production.symbols().len() == self.children.len()
            && production
                .symbols()
                .iter()
                .zip(&self.children)
                .all(|(expected, actual)| match (expected, actual) {
                    (GrammarSymbol::Literal(text), Symbol::Terminal(t)) => *text == t.text,
                    (GrammarSymbol::Rule(id), Symbol::NonTerminal(nt)) => {
                        nt.rule == *id && nt.conforms_to(grammar)
                    }
                    _ => false,
                })
    }
}

impl fmt::Display for NonTerminalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for child in &self.children {
            child.fmt(f)?;
        }
        Ok(())
    }
}

/// Pre-order iterator over the non-terminals of a derivation tree.
#[derive(Debug, Clone)]
pub struct NonTerminals<'a> {
    stack: Vec<&'a NonTerminalSymbol>,
}

impl<'a> Iterator for NonTerminals<'a> {
    type Item = &'a NonTerminalSymbol;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(
            next.children
                .iter()
                .rev()
                .filter_map(Symbol::as_nonterminal),
        );
        Some(next)
    }
}
