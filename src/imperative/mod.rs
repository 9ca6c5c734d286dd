//! # Imperative programs
//!
//! Experimental: statement sequences over expression trees, with mutations
//! that delete and insert whole statements.
pub mod mutation;
pub mod program;

pub use mutation::{
    insertion_points, DeletionMutation, InsertionMutation, InsertionPoint, StatementDeletion,
    StatementInsertion,
};
pub use program::{Block, Program, Statement, DEFAULT_MAX_LOOP_ITERATIONS};
