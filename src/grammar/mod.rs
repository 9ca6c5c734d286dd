//! # Grammar-guided Genetic Programming
//!
//! Context-free grammars and the two representations built on them:
//! derivation trees varied directly by Whigham's operators, and codon
//! chromosomes of grammatical evolution that a [`DerivationMapper`] turns
//! into derivation trees.
pub mod chromosome;
pub mod derivation;
pub mod generator;
pub mod mapper;
pub mod model;
pub mod operators;

pub use chromosome::{
    Chromosome, ChromosomeCut, CodonMutationReport, CodonPointMutation, OnePointChromosomeCrossover,
    RandomChromosomeInitialiser,
};
pub use derivation::{DerivationTree, NonTerminalSymbol, NonTerminals, Symbol, TerminalSymbol};
pub use generator::{ChromosomeInitialiser, DerivationGenerator, DerivationInitialiser};
pub use mapper::{
    CodonExhaustion, DerivationMapper, MapperConfig, MapperConfigBuilder, Mapping, MappingOrder,
};
pub use model::{
    lit, rule, Grammar, GrammarBuilder, GrammarProduction, GrammarRule, GrammarSymbol, RuleId,
    SymbolSpec,
};
pub use operators::{DerivationExchange, DerivationReplacement, WhighamCrossover, WhighamMutation};
