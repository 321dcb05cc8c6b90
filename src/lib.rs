//! Shared meta-automata over binary decision diagrams.
//!
//! A meta-automaton is a deterministic automaton whose transitions are
//! labeled by letter sets, themselves represented as BDDs. All states of
//! all automata live in one hash-consed master table ([`Universe`]), so
//! language equality is pointer equality, and automata may refer to
//! themselves while being defined ([`Dest::Myself`]).
//!
//! On top of the master table sit an on-the-fly product construction
//! ([`Universe::compose`]) covering intersection, union, and transduction,
//! and an encoding of upward-closed sets of integer vectors ([`Upset`])
//! with bit-serial arithmetic, as used in backward coverability for Petri
//! nets.

pub mod automaton;
pub mod bdd;
pub mod cache;
pub mod letters;
pub mod product;
pub mod reference;
pub mod table;
pub mod upset;

pub use automaton::{Dest, MetaBdd, StateId, Universe, EMPTY, FULL};
pub use bdd::Bdd;
pub use letters::{Letters, Var};
pub use product::LetterMap;
pub use reference::Ref;
pub use upset::{Upset, UpsetStore};
