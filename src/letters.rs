use std::fmt::Debug;
use std::hash::Hash;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// A variable index in the letter alphabet (1-indexed).
pub type Var = u32;

/// Contract for the Boolean-function engine underlying an automaton
/// universe.
///
/// An implementation manages canonical, immutable functions over ordered
/// variables. Letter sets are opaque handles ([`Letters::Set`]); structural
/// equality of handles must coincide with semantic equality of the
/// functions, and handles must be totally ordered and hashable so they can
/// key the canonicalization tables.
///
/// Concrete letters are represented as satisfiable cubes, i.e. letter sets
/// that fix the variables of interest.
pub trait Letters {
    type Set: Copy + Eq + Ord + Hash + Debug;

    /// The empty letter set (constant false).
    fn zero(&self) -> Self::Set;
    /// The full letter set (constant true).
    fn one(&self) -> Self::Set;
    /// The set of letters with variable `v` set.
    fn var(&self, v: Var) -> Self::Set;

    fn negate(&self, f: Self::Set) -> Self::Set;
    fn and(&self, f: Self::Set, g: Self::Set) -> Self::Set;
    fn or(&self, f: Self::Set, g: Self::Set) -> Self::Set;
    fn xor(&self, f: Self::Set, g: Self::Set) -> Self::Set;

    fn is_zero(&self, f: Self::Set) -> bool;
    fn is_one(&self, f: Self::Set) -> bool;
    fn is_terminal(&self, f: Self::Set) -> bool {
        self.is_zero(f) || self.is_one(f)
    }

    /// Top variable of a non-terminal set.
    fn top_var(&self, f: Self::Set) -> Var;
    /// `(low, high)` cofactors with respect to the top variable of a
    /// non-terminal set.
    fn cofactors(&self, f: Self::Set) -> (Self::Set, Self::Set);

    /// Existential quantification over `vars` (sorted).
    fn exists(&self, f: Self::Set, vars: &[Var]) -> Self::Set;
    /// Universal quantification over `vars` (sorted).
    fn forall(&self, f: Self::Set, vars: &[Var]) -> Self::Set;
    /// Order-preserving variable substitution `(from, to)`.
    fn rename(&self, f: Self::Set, map: &[(Var, Var)]) -> Self::Set;

    /// One satisfiable cube of `f`, or `None` if `f` is empty.
    fn pick_cube(&self, f: Self::Set) -> Option<Self::Set>;

    /// Split `a` and `b` into `(a ∧ ¬b, a ∧ b, ¬a ∧ b)`.
    fn split(&self, a: Self::Set, b: Self::Set) -> (Self::Set, Self::Set, Self::Set) {
        (
            self.and(a, self.negate(b)),
            self.and(a, b),
            self.and(self.negate(a), b),
        )
    }

    /// Human-readable rendering of a letter set, for the debug printer.
    fn expr(&self, f: Self::Set) -> String;
}

impl Letters for Bdd {
    type Set = Ref;

    fn zero(&self) -> Ref {
        self.zero
    }
    fn one(&self) -> Ref {
        self.one
    }
    fn var(&self, v: Var) -> Ref {
        self.mk_var(v)
    }

    fn negate(&self, f: Ref) -> Ref {
        -f
    }
    fn and(&self, f: Ref, g: Ref) -> Ref {
        self.apply_and(f, g)
    }
    fn or(&self, f: Ref, g: Ref) -> Ref {
        self.apply_or(f, g)
    }
    fn xor(&self, f: Ref, g: Ref) -> Ref {
        self.apply_xor(f, g)
    }

    fn is_zero(&self, f: Ref) -> bool {
        Bdd::is_zero(self, f)
    }
    fn is_one(&self, f: Ref) -> bool {
        Bdd::is_one(self, f)
    }

    fn top_var(&self, f: Ref) -> Var {
        assert!(!Bdd::is_terminal(self, f), "Terminal has no top variable");
        self.variable(f.index())
    }
    fn cofactors(&self, f: Ref) -> (Ref, Ref) {
        assert!(!Bdd::is_terminal(self, f), "Terminal has no cofactors");
        (self.low_node(f), self.high_node(f))
    }

    fn exists(&self, f: Ref, vars: &[Var]) -> Ref {
        Bdd::exists(self, f, vars)
    }
    fn forall(&self, f: Ref, vars: &[Var]) -> Ref {
        Bdd::forall(self, f, vars)
    }
    fn rename(&self, f: Ref, map: &[(Var, Var)]) -> Ref {
        Bdd::rename(self, f, map)
    }

    fn pick_cube(&self, f: Ref) -> Option<Ref> {
        self.one_cube(f)
    }

    fn expr(&self, f: Ref) -> String {
        self.to_expr_string(f)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_split() {
        let bdd = Bdd::default();
        let x1 = Letters::var(&bdd, 1);
        let x2 = Letters::var(&bdd, 2);

        let (only_a, common, only_b) = bdd.split(x1, x2);
        assert_eq!(only_a, bdd.cube([1, -2]));
        assert_eq!(common, bdd.cube([1, 2]));
        assert_eq!(only_b, bdd.cube([-1, 2]));

        // The three parts cover a ∪ b and are pairwise disjoint.
        let union = bdd.or(only_a, bdd.or(common, only_b));
        assert_eq!(union, bdd.or(x1, x2));
        assert!(bdd.is_zero(bdd.and(only_a, common)));
        assert!(bdd.is_zero(bdd.and(common, only_b)));
    }

    #[test]
    fn test_cube_implies_set() {
        let bdd = Bdd::default();
        let x1 = Letters::var(&bdd, 1);
        let x2 = Letters::var(&bdd, 2);

        let f = bdd.or(bdd.and(x1, x2), bdd.and(bdd.negate(x1), bdd.negate(x2)));
        let cube = bdd.pick_cube(f).unwrap();
        assert_eq!(bdd.and(cube, f), cube);
    }
}
