//! # DerivationMapper
//!
//! Maps a [`Chromosome`] onto a [`DerivationTree`] of a grammar. Starting from
//! the start rule, every non-terminal is replaced by one of its productions:
//! the next codon modulo the number of productions picks which. Rules with a
//! single production consume no codon.
//!
//! When the codons run out the mapper either wraps back to the first codon or
//! extends the chromosome with a fresh random codon, depending on the
//! configured [`CodonExhaustion`]. Mapping fails, returning `None`, when the
//! wrap limit or the maximum chromosome length is hit, or when a non-terminal
//! would sit deeper than the configured maximum depth. The depth bound is what
//! stops a recursive grammar from expanding forever.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use epochx::grammar::{lit, rule, Chromosome, DerivationMapper, Grammar, MapperConfig};
//! use epochx::rng::RandomNumberGenerator;
//!
//! let grammar = Arc::new(
//!     Grammar::builder()
//!         .rule("S", vec![vec![lit("a")], vec![lit("b"), rule("S")]])
//!         .build()
//!         .unwrap(),
//! );
//! let config = MapperConfig::builder().wrapping(0).max_depth(5).build();
//! let mapper = DerivationMapper::new(grammar, config).unwrap();
//!
//! let mut chromosome = Chromosome::new(vec![1, 1, 1, 0]);
//! let mut rng = RandomNumberGenerator::from_seed(1);
//! let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
//! assert_eq!(mapping.tree.to_string(), "bbba");
//! assert_eq!(mapping.active_codons, 4);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{EpochError, Result};
use crate::grammar::chromosome::Chromosome;
use crate::grammar::derivation::{DerivationTree, NonTerminalSymbol, Symbol, TerminalSymbol};
use crate::grammar::model::{Grammar, GrammarSymbol, RuleId};
use crate::rng::RandomNumberGenerator;

/// Wraps allowed by the default configuration.
pub const DEFAULT_MAX_WRAPS: usize = 10;
/// Derivation depth allowed by the default configuration.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// What the mapper does when it needs a codon past the end of the chromosome.
/// Exactly one policy is in force at a time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodonExhaustion {
    /// Read from the first codon again, at most `max_wraps` times.
    Wrapping { max_wraps: usize },
    /// Append a random codon in `0..=max_codon_size`, while the chromosome is
    /// shorter than `max_chromosome_length`.
    Extending {
        max_codon_size: u32,
        max_chromosome_length: usize,
    },
}

/// The order in which pending non-terminals are expanded.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingOrder {
    /// Left-most non-terminal first.
    #[default]
    DepthFirst,
    /// Every non-terminal of one level before any of the next. Experimental.
    BreadthFirst,
}

/// How a [`DerivationMapper`] reads codons and when it gives up.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperConfig {
    pub exhaustion: CodonExhaustion,
    pub order: MappingOrder,
    pub max_depth: usize,
    pub remove_unused_codons: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            exhaustion: CodonExhaustion::Wrapping {
                max_wraps: DEFAULT_MAX_WRAPS,
            },
            order: MappingOrder::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            remove_unused_codons: false,
        }
    }
}

impl MapperConfig {
    /// Starts a builder whose unset fields keep their defaults.
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::default()
    }

    /// Checks the limits are usable.
    pub fn validate(&self) -> Result<()> {
        if let CodonExhaustion::Extending {
            max_chromosome_length: 0,
            ..
        } = self.exhaustion
        {
            return Err(EpochError::Configuration(
                "Maximum chromosome length cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`MapperConfig`]. `wrapping` and `extending` replace each
/// other; the last one called wins.
#[derive(Debug, Clone, Default)]
pub struct MapperConfigBuilder {
    exhaustion: Option<CodonExhaustion>,
    order: Option<MappingOrder>,
    max_depth: Option<usize>,
    remove_unused_codons: Option<bool>,
}

impl MapperConfigBuilder {
    /// Re-reads the chromosome from its start up to `max_wraps` times.
    /// Replaces any extending policy set earlier.
    pub fn wrapping(mut self, max_wraps: usize) -> Self {
        self.exhaustion = Some(CodonExhaustion::Wrapping { max_wraps });
        self
    }

    /// Appends random codons up to `max_chromosome_length`. Replaces any
    /// wrapping policy set earlier.
    pub fn extending(mut self, max_codon_size: u32, max_chromosome_length: usize) -> Self {
        self.exhaustion = Some(CodonExhaustion::Extending {
            max_codon_size,
            max_chromosome_length,
        });
        self
    }

    pub fn order(mut self, order: MappingOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Deepest non-terminal level a mapping may reach.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Whether codons after the last one read are dropped.
    pub fn remove_unused_codons(mut self, remove: bool) -> Self {
        self.remove_unused_codons = Some(remove);
        self
    }

    pub fn build(self) -> MapperConfig {
        let defaults = MapperConfig::default();
        MapperConfig {
            exhaustion: self.exhaustion.unwrap_or(defaults.exhaustion),
            order: self.order.unwrap_or(defaults.order),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            remove_unused_codons: self
                .remove_unused_codons
                .unwrap_or(defaults.remove_unused_codons),
        }
    }
}

/// A successful mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub tree: DerivationTree,
    /// Codons read while mapping; wrapped codons are counted each time they
    /// are read.
    pub active_codons: usize,
}

struct CodonReader<'a> {
    chromosome: &'a mut Chromosome,
    exhaustion: CodonExhaustion,
    position: usize,
    read: usize,
    wraps: usize,
}

impl<'a> CodonReader<'a> {
    fn new(chromosome: &'a mut Chromosome, exhaustion: CodonExhaustion) -> Self {
        Self {
            chromosome,
            exhaustion,
            position: 0,
            read: 0,
            wraps: 0,
        }
    }

    fn next(&mut self, rng: &mut RandomNumberGenerator) -> Option<u32> {
        if self.position >= self.chromosome.len() {
            match self.exhaustion {
                CodonExhaustion::Wrapping { max_wraps } => {
                    if self.chromosome.is_empty() || self.wraps >= max_wraps {
                        trace!(wraps = self.wraps, "codons exhausted");
                        return None;
                    }
                    self.wraps += 1;
                    self.position = 0;
                }
                CodonExhaustion::Extending {
                    max_codon_size,
                    max_chromosome_length,
                } => {
                    if self.chromosome.len() >= max_chromosome_length {
                        trace!(length = self.chromosome.len(), "chromosome at maximum length");
                        return None;
                    }
                    self.chromosome.push(rng.gen_codon(max_codon_size));
                }
            }
        }
        let codon = self.chromosome.codon(self.position)?;
        self.position += 1;
        self.read += 1;
        Some(codon)
    }
}

/// A non-terminal awaiting or holding its expansion during breadth-first
/// mapping.
struct Pending {
    rule: RuleId,
    production: usize,
    children: Vec<PendingChild>,
}

enum PendingChild {
    Literal(String),
    Node(usize),
}

/// Maps chromosomes to derivation trees of one grammar.
#[derive(Debug, Clone)]
pub struct DerivationMapper {
    grammar: Arc<Grammar>,
    config: MapperConfig,
}

impl DerivationMapper {
    /// ## Errors
    ///
    /// A configuration error if the config is invalid or the maximum depth is
    /// below the grammar's minimum depth.
    pub fn new(grammar: Arc<Grammar>, config: MapperConfig) -> Result<Self> {
        config.validate()?;
        if config.max_depth < grammar.min_depth() {
            return Err(EpochError::Configuration(format!(
                "maximum depth {} is below the grammar's minimum depth {}",
                config.max_depth,
                grammar.min_depth()
            )));
        }
        Ok(Self { grammar, config })
    }

    /// The grammar chromosomes are mapped against.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Maps `chromosome`, extending it in place under the extending policy and
    /// trimming unread codons when configured to. `rng` is only drawn from to
    /// extend.
    pub fn map(
        &self,
        chromosome: &mut Chromosome,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Mapping> {
        let mut reader = CodonReader::new(chromosome, self.config.exhaustion);
        let tree = match self.config.order {
            MappingOrder::DepthFirst => self.expand(self.grammar.start(), 0, &mut reader, rng),
            MappingOrder::BreadthFirst => self.expand_breadth_first(&mut reader, rng),
        };
        let active_codons = reader.read;

        let Some(tree) = tree else {
            debug!(active_codons, length = chromosome.len(), "mapping failed");
            return None;
        };
        if self.config.remove_unused_codons && active_codons < chromosome.len() {
            chromosome.truncate(active_codons);
        }
        Some(Mapping {
            tree,
            active_codons,
        })
    }

    fn choose(
        &self,
        rule: RuleId,
        level: usize,
        reader: &mut CodonReader<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Option<usize> {
        if level > self.config.max_depth {
            trace!(level, "derivation exceeded maximum depth");
            return None;
        }
        let alternatives = self.grammar.rule(rule).productions().len();
        if alternatives == 1 {
            return Some(0);
        }
        Some(reader.next(rng)? as usize % alternatives)
    }

    fn expand(
        &self,
        rule: RuleId,
        level: usize,
        reader: &mut CodonReader<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Option<NonTerminalSymbol> {
        let production = self.choose(rule, level, reader, rng)?;
        let symbols = self.grammar.rule(rule).productions()[production].symbols();

        let mut children = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            children.push(match symbol {
                GrammarSymbol::Literal(text) => Symbol::Terminal(TerminalSymbol::new(text.as_str())),
                GrammarSymbol::Rule(id) => {
                    Symbol::NonTerminal(self.expand(*id, level + 1, reader, rng)?)
                }
            });
        }
        Some(NonTerminalSymbol::new(rule, production, children))
    }

    fn expand_breadth_first(
        &self,
        reader: &mut CodonReader<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Option<NonTerminalSymbol> {
        let mut arena = vec![Pending {
            rule: self.grammar.start(),
            production: 0,
            children: Vec::new(),
        }];
        let mut frontier = vec![0];
        let mut level = 0;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for index in frontier {
                let rule = arena[index].rule;
                let production = self.choose(rule, level, reader, rng)?;
                let mut children = Vec::new();
                for symbol in self.grammar.rule(rule).productions()[production].symbols() {
                    match symbol {
                        GrammarSymbol::Literal(text) => {
                            children.push(PendingChild::Literal(text.clone()))
                        }
                        GrammarSymbol::Rule(id) => {
                            arena.push(Pending {
                                rule: *id,
                                production: 0,
                                children: Vec::new(),
                            });
                            children.push(PendingChild::Node(arena.len() - 1));
                            next.push(arena.len() - 1);
                        }
                    }
                }
                arena[index].production = production;
                arena[index].children = children;
            }
            frontier = next;
            level += 1;
        }

        Some(assemble(&mut arena, 0))
    }

    /// Encodes `tree` as codons that map back onto it in this mapper's order.
    /// Each choice among `n` productions is written as `production + k * n`
    /// for a random `k` keeping the codon within `max_codon`.
    ///
    /// ## Errors
    ///
    /// A configuration error if `max_codon` is too small to encode a chosen
    /// production.
    pub fn encode(
        &self,
        tree: &DerivationTree,
        max_codon: u32,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Chromosome> {
        let order: Vec<&NonTerminalSymbol> = match self.config.order {
            MappingOrder::DepthFirst => tree.nonterminals().collect(),
            MappingOrder::BreadthFirst => {
                let mut order = Vec::new();
                let mut queue = VecDeque::from([tree]);
                while let Some(next) = queue.pop_front() {
                    order.push(next);
                    queue.extend(next.children().iter().filter_map(Symbol::as_nonterminal));
                }
                order
            }
        };

        let mut chromosome = Chromosome::default();
        for nt in order {
            let alternatives = self.grammar.rule(nt.rule()).productions().len();
            if alternatives == 1 {
                continue;
            }
            let production = nt.production() as u32;
            if production > max_codon {
                return Err(EpochError::Configuration(format!(
                    "max codon {} cannot encode production {} of <{}>",
                    max_codon,
                    production,
                    self.grammar.rule(nt.rule()).name()
                )));
            }
            let k = rng.gen_codon((max_codon - production) / alternatives as u32);
            chromosome.push(production + k * alternatives as u32);
        }
        Ok(chromosome)
    }
}

fn assemble(arena: &mut [Pending], index: usize) -> NonTerminalSymbol {
    let children = std::mem::take(&mut arena[index].children)
        .into_iter()
        .map(|child| match child {
            PendingChild::Literal(text) => Symbol::Terminal(TerminalSymbol::new(text)),
            PendingChild::Node(child) => Symbol::NonTerminal(assemble(arena, child)),
        })
        .collect();
    NonTerminalSymbol::new(arena[index].rule, arena[index].production, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{lit, rule};

    fn chain_grammar() -> Arc<Grammar> {
        Arc::new(
            Grammar::builder()
                .rule("S", vec![vec![lit("a")], vec![lit("b"), rule("S")]])
                .build()
                .unwrap(),
        )
    }

    fn expression_grammar() -> Arc<Grammar> {
        Arc::new(
            Grammar::builder()
                .rule(
                    "expr",
                    vec![
                        vec![lit("("), rule("expr"), rule("op"), rule("expr"), lit(")")],
                        vec![rule("var")],
                    ],
                )
                .rule("op", vec![vec![lit("+")], vec![lit("-")], vec![lit("*")]])
                .rule("var", vec![vec![lit("x")]])
                .build()
                .unwrap(),
        )
    }

    fn mapper(config: MapperConfig) -> DerivationMapper {
        DerivationMapper::new(chain_grammar(), config).unwrap()
    }

    #[test]
    fn test_single_codon_terminates() {
        let mapper = mapper(MapperConfig::builder().wrapping(0).max_depth(5).build());
        let mut chromosome = Chromosome::new(vec![0]);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "a");
        assert_eq!(mapping.active_codons, 1);
    }

    #[test]
    fn test_recursive_chain() {
        let mapper = mapper(MapperConfig::builder().wrapping(0).max_depth(5).build());
        let mut chromosome = Chromosome::new(vec![1, 1, 1, 0]);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "bbba");
        assert_eq!(mapping.active_codons, 4);
        assert_eq!(mapping.tree.depth(), 3);
    }

    #[test]
    fn test_codons_past_termination_are_inactive() {
        let mapper = mapper(MapperConfig::builder().remove_unused_codons(true).build());
        let mut chromosome = Chromosome::new(vec![3, 2, 7, 9]);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "ba");
        assert_eq!(mapping.active_codons, 2);
        assert_eq!(chromosome.codons(), &[3, 2]);
    }

    #[test]
    fn test_wrapping() {
        let mut rng = RandomNumberGenerator::from_seed(1);

        // [1, 1] read as 1, 1, 1, 1, then wraps run out
        let strict = mapper(MapperConfig::builder().wrapping(1).build());
        assert!(strict.map(&mut Chromosome::new(vec![1, 1]), &mut rng).is_none());

        // [1, 0] with one wrap: 1 then 0
        let mapping = strict.map(&mut Chromosome::new(vec![1, 0]), &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "ba");

        // [1] always recurses, so the depth bound fails it before the wraps run out
        let shallow = mapper(MapperConfig::builder().wrapping(5).max_depth(2).build());
        assert!(shallow.map(&mut Chromosome::new(vec![1]), &mut rng).is_none());

        // [1, 1, 0] needs no wrap
        let wrapped = mapper(MapperConfig::builder().wrapping(3).max_depth(20).build());
        let mut chromosome = Chromosome::new(vec![1, 1, 0]);
        assert_eq!(wrapped.map(&mut chromosome, &mut rng).unwrap().tree.to_string(), "bba");
        // [0, 1] stops on the first codon
        let mapping = wrapped.map(&mut Chromosome::new(vec![0, 1]), &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "a");
        assert_eq!(mapping.active_codons, 1);
        // [1, 1, 1] keeps recursing until the wraps run out
        assert!(wrapped.map(&mut Chromosome::new(vec![1, 1, 1]), &mut rng).is_none());
    }

    #[test]
    fn test_extending() {
        let mapper = mapper(MapperConfig::builder().extending(100, 50).max_depth(60).build());
        let mut rng = RandomNumberGenerator::from_seed(2);
        let mut chromosome = Chromosome::new(vec![1]);
        if let Some(mapping) = mapper.map(&mut chromosome, &mut rng) {
            assert_eq!(mapping.active_codons, chromosome.len());
            assert!(chromosome.len() <= 50);
            assert!(chromosome.codons()[1..].iter().all(|c| *c <= 100));
        }

        let capped = DerivationMapper::new(
            chain_grammar(),
            MapperConfig::builder().extending(100, 2).build(),
        )
        .unwrap();
        // Two codons, both recursive, and no room to grow
        let mut chromosome = Chromosome::new(vec![1, 1]);
        assert!(capped.map(&mut chromosome, &mut rng).is_none());
        assert_eq!(chromosome.len(), 2);
    }

    #[test]
    fn test_builder_exhaustion_overwrites() {
        let config = MapperConfig::builder().wrapping(3).extending(9, 20).build();
        assert_eq!(
            config.exhaustion,
            CodonExhaustion::Extending {
                max_codon_size: 9,
                max_chromosome_length: 20
            }
        );
        let config = MapperConfig::builder().extending(9, 20).wrapping(3).build();
        assert_eq!(config.exhaustion, CodonExhaustion::Wrapping { max_wraps: 3 });
    }

    #[test]
    fn test_configuration_errors() {
        assert!(DerivationMapper::new(
            chain_grammar(),
            MapperConfig::builder().extending(9, 0).build()
        )
        .is_err());
        assert!(DerivationMapper::new(
            expression_grammar(),
            MapperConfig::builder().max_depth(0).build()
        )
        .is_err());
    }

    #[test]
    fn test_single_production_rules_consume_nothing() {
        let mapper = DerivationMapper::new(expression_grammar(), MapperConfig::default()).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(3);
        // expr -> ( expr op expr ), expr -> var, op -> *, expr -> var
        let mut chromosome = Chromosome::new(vec![0, 1, 2, 1]);
        let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "(x*x)");
        assert_eq!(mapping.active_codons, 4);
    }

    #[test]
    fn test_breadth_first_order() {
        let config = MapperConfig::builder()
            .order(MappingOrder::BreadthFirst)
            .build();
        let mapper = DerivationMapper::new(expression_grammar(), config).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(4);
        // Level 0: expr -> ( expr op expr ); level 1: expr -> var, op -> -, expr -> ( ... )
        // level 2: expr -> var, op -> +, expr -> var
        let mut chromosome = Chromosome::new(vec![0, 1, 1, 0, 1, 0, 1]);
        let mapping = mapper.map(&mut chromosome, &mut rng).unwrap();
        assert_eq!(mapping.tree.to_string(), "(x-(x+x))");
        assert_eq!(mapping.active_codons, 7);
    }

    #[test]
    fn test_encode_round_trip() {
        let mut rng = RandomNumberGenerator::from_seed(5);
        for order in [MappingOrder::DepthFirst, MappingOrder::BreadthFirst] {
            let config = MapperConfig::builder().wrapping(0).order(order).build();
            let mapper = DerivationMapper::new(expression_grammar(), config).unwrap();
            // ((x-x)+x) depth first, ((x+x)-x) breadth first
            let mut source = Chromosome::new(vec![0, 0, 1, 1, 1, 0, 1]);
            let tree = mapper.map(&mut source, &mut rng).unwrap().tree;

            let mut encoded = mapper.encode(&tree, 1000, &mut rng).unwrap();
            assert!(encoded.codons().iter().all(|c| *c <= 1000));
            let mapping = mapper.map(&mut encoded, &mut rng).unwrap();
            assert_eq!(mapping.tree, tree);
            assert_eq!(mapping.active_codons, encoded.len());
        }
    }

    #[test]
    fn test_encode_rejects_small_max_codon() {
        let mapper = DerivationMapper::new(expression_grammar(), MapperConfig::default()).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(6);
        let tree = mapper
            .map(&mut Chromosome::new(vec![0, 1, 2, 1]), &mut rng)
            .unwrap()
            .tree;
        assert!(mapper.encode(&tree, 1, &mut rng).is_err());
    }
}
