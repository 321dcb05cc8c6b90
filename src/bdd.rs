use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::positive(0),
            high: Ref::positive(0),
        }
    }
}

type Storage = Table<Node>;

/// A manager for reduced ordered binary decision diagrams with complement
/// edges.
///
/// All operations go through the manager; nodes are hash-consed, so two
/// structurally equal functions always share the same [`Ref`]. Variables are
/// 1-indexed (0 is reserved for terminals). Nodes are never reclaimed.
pub struct Bdd {
    storage: RefCell<Storage>,
    ite_cache: RefCell<Cache<(Ref, Ref, Ref), Ref>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new(bucket_bits: usize) -> Self {
        let mut storage = Storage::new(bucket_bits);

        // Allocate the terminal node:
        let one = storage.alloc();
        assert_eq!(one, 1); // Make sure the terminal node is (1).
        let one = Ref::positive(one as u32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            ite_cache: RefCell::new(Cache::new()),
            zero,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("size", &self.storage.borrow().size())
            .finish()
    }
}

impl Bdd {
    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().value(index as usize).variable
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).high
    }

    /// Low child of `node`, with the complement edge pushed through.
    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    /// High child of `node`, with the complement edge pushed through.
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Canonicity: the high edge is never complemented.
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, self.zero, self.one)
    }

    /// Build the conjunction of the given literals (positive for the
    /// variable, negative for its complement).
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| v.abs());
        literals.reverse();
        let mut current = self.one;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            current = if lit < 0 {
                self.mk_node(-lit as u32, current, self.zero)
            } else {
                self.mk_node(lit as u32, self.zero, current)
            };
        }
        current
    }

    /// Cofactors of `node` with respect to variable `v`, which must not be
    /// below the node's top variable. Returns `(low, high)`.
    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        let i = node.index();
        if self.is_terminal(node) || v < self.variable(i) {
            return (node, node);
        }
        assert_eq!(v, self.variable(i));
        if node.is_negated() {
            (-self.low(i), -self.high(i))
        } else {
            (self.low(i), self.high(i))
        }
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples:
        //   ite(F,F,H)  => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F)  => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        let mut g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let mut h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };

        // Make sure the first argument is regular:
        //   ite(~F,G,H) => ite(F,H,G)
        let mut f = f;
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // Make sure the second argument is regular:
        //   ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        // Re-check the base cases the normalization may have produced.
        if g == h {
            return if n { -g } else { g };
        }
        if self.is_one(g) && self.is_zero(h) {
            return if n { -f } else { f };
        }

        let key = (f, g, h);
        if let Some(&res) = self.ite_cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        // Determine the top variable among the non-terminal arguments:
        let mut m = self.variable(f.index());
        for node in [g, h] {
            if !self.is_terminal(node) {
                m = m.min(self.variable(node.index()));
            }
        }
        debug_assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let low = self.apply_ite(f0, g0, h0);
        let high = self.apply_ite(f1, g1, h1);
        let res = self.mk_node(m, low, high);

        self.ite_cache.borrow_mut().insert(key, res);
        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes.into_iter() {
            res = self.apply_and(res, node);
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes.into_iter() {
            res = self.apply_or(res, node);
        }
        res
    }

    /// Existentially quantify the variables in `vars` (must be sorted).
    pub fn exists(&self, f: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]));
        let mut cache = HashMap::new();
        self.exists_rec(f, vars, &mut cache)
    }

    fn exists_rec(&self, f: Ref, vars: &[u32], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        let v = self.variable(f.index());
        // All remaining quantified variables are above the support of `f`.
        if vars.last().is_some_and(|&last| last < v) {
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.exists_rec(self.low_node(f), vars, cache);
        let high = self.exists_rec(self.high_node(f), vars, cache);
        let res = if vars.binary_search(&v).is_ok() {
            self.apply_or(low, high)
        } else {
            self.mk_node(v, low, high)
        };
        cache.insert(f, res);
        res
    }

    /// Universally quantify the variables in `vars` (must be sorted).
    pub fn forall(&self, f: Ref, vars: &[u32]) -> Ref {
        -self.exists(-f, vars)
    }

    /// Substitute variables according to `map` (pairs `(from, to)`).
    ///
    /// The substitution must preserve the variable order on the support of
    /// `f`, and no `to` variable may already occur in `f`; checked in debug
    /// builds only.
    pub fn rename(&self, f: Ref, map: &[(u32, u32)]) -> Ref {
        let mut cache = HashMap::new();
        let res = self.rename_rec(f, map, &mut cache);
        debug_assert!(!self.is_terminal(res) || self.is_terminal(f));
        res
    }

    fn rename_rec(&self, f: Ref, map: &[(u32, u32)], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f.index());
        let w = map
            .iter()
            .find(|&&(from, _)| from == v)
            .map_or(v, |&(_, to)| to);

        let low = self.rename_rec(self.low_node(f), map, cache);
        let high = self.rename_rec(self.high_node(f), map, cache);
        debug_assert!(self.is_terminal(low) || w < self.variable(low.index()));
        debug_assert!(self.is_terminal(high) || w < self.variable(high.index()));

        let res = self.mk_node(w, low, high);
        cache.insert(f, res);
        res
    }

    /// Return one satisfying cube of `f`, or `None` if `f` is false.
    pub fn one_cube(&self, f: Ref) -> Option<Ref> {
        Some(self.cube(self.one_cube_literals(f)?))
    }

    /// Return the literals of one satisfying cube of `f`.
    pub fn one_cube_literals(&self, f: Ref) -> Option<Vec<i32>> {
        if self.is_zero(f) {
            return None;
        }

        let mut literals = Vec::new();
        let mut current = f;

        // Walk down, always picking a satisfiable branch.
        while !self.is_one(current) {
            let v = self.variable(current.index()) as i32;
            let high = self.high_node(current);
            if !self.is_zero(high) {
                literals.push(v);
                current = high;
            } else {
                literals.push(-v);
                current = self.low_node(current);
            }
        }

        Some(literals)
    }

    /// Render `f` as a sum of cubes, e.g. `x1 & !x2 | x3`. For inspection
    /// only; the output is never parsed back.
    pub fn to_expr_string(&self, f: Ref) -> String {
        if self.is_zero(f) {
            return "0".to_string();
        }
        if self.is_one(f) {
            return "1".to_string();
        }

        let mut cubes = Vec::new();
        self.collect_cubes(f, &mut Vec::new(), &mut cubes);

        cubes
            .iter()
            .map(|lits| {
                lits.iter()
                    .map(|&l| {
                        if l < 0 {
                            format!("!x{}", -l)
                        } else {
                            format!("x{}", l)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" & ")
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn collect_cubes(&self, f: Ref, path: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
        if self.is_zero(f) {
            return;
        }
        if self.is_one(f) {
            out.push(path.clone());
            return;
        }

        let v = self.variable(f.index()) as i32;
        path.push(-v);
        self.collect_cubes(self.low_node(f), path, out);
        path.pop();
        path.push(v);
        self.collect_cubes(self.high_node(f), path, out);
        path.pop();
    }
}
