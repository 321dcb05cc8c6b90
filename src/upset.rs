//! Upward-closed sets of integer vectors, encoded as automata over bit
//! vectors.
//!
//! A vector is read least significant bit first: the k-th letter of a word
//! carries bit k of every component. Component `i` of a `d`-dimensional
//! vector owns two variable tracks: `2i + 1` for the subject value and
//! `2i + 2` for the image value under a transducer. Membership is closed
//! upwards: if the set contains `v`, it contains every `w >= v` pointwise.

use std::cell::RefCell;
use std::ops::{Add, BitAnd, BitOr};

use log::debug;

use crate::automaton::{Dest, MetaBdd, StateId, Universe, EMPTY, FULL};
use crate::cache::Cache;
use crate::letters::{Letters, Var};
use crate::product::LetterMap;

/// Subject track of dimension `i`.
fn input_var(i: usize) -> Var {
    2 * i as Var + 1
}

/// Image track of dimension `i`.
fn output_var(i: usize) -> Var {
    2 * i as Var + 2
}

/// Owner of the automaton universe and the memoization tables for upset
/// construction and arithmetic.
pub struct UpsetStore<L: Letters> {
    mmbdd: Universe<L>,
    seeds: RefCell<Cache<Vec<i64>, StateId>>,
    identities: RefCell<Cache<usize, StateId>>,
    untouched: RefCell<Cache<(usize, usize), L::Set>>,
    transducers: RefCell<Cache<(usize, usize, u64, bool, bool), StateId>>,
    padded: RefCell<Cache<(StateId, usize), StateId>>,
}

impl<L: Letters> UpsetStore<L> {
    pub fn new(letters: L) -> Self {
        Self {
            mmbdd: Universe::new(letters),
            seeds: RefCell::new(Cache::new()),
            identities: RefCell::new(Cache::new()),
            untouched: RefCell::new(Cache::new()),
            transducers: RefCell::new(Cache::new()),
            padded: RefCell::new(Cache::new()),
        }
    }

    pub fn universe(&self) -> &Universe<L> {
        &self.mmbdd
    }

    fn letters(&self) -> &L {
        self.mmbdd.letters()
    }

    /// The upward closure of the single seed vector `v`.
    ///
    /// Precondition: seed components are non-negative.
    pub fn of(&self, v: &[i64]) -> Upset<'_, L> {
        assert!(v.iter().all(|&x| x >= 0), "Seed components must be non-negative");

        let key = v.to_vec();
        if let Some(&cached) = self.seeds.borrow().get(&key) {
            return self.upset(cached, v.len());
        }

        let mut state = FULL;
        for (i, &value) in v.iter().enumerate() {
            let branch = self.high_branch(value, i);
            state = self.mmbdd.compose(state, branch, true, &LetterMap::Identity);
        }
        debug!("upset of {:?} -> {}", v, state);

        self.seeds.borrow_mut().insert(key, state);
        self.upset(state, v.len())
    }

    fn upset(&self, state: StateId, dim: usize) -> Upset<'_, L> {
        Upset {
            store: self,
            state,
            dim,
        }
    }

    /// States accepting `{ w : w >= value }` on dimension `i`, reading the
    /// remaining bits of `value`. The high branch assumes the bits read so
    /// far already exceed those of `value`.
    fn high_branch(&self, value: i64, i: usize) -> StateId {
        let letters = self.letters();
        let var = letters.var(input_var(i));

        if value == 0 {
            return FULL;
        }
        let high = self.high_branch(value >> 1, i);
        if value & 1 == 1 {
            let low = self.low_branch(value >> 1, i);
            self.mmbdd
                .make(
                    [
                        (Dest::State(high), var),
                        (Dest::State(low), letters.negate(var)),
                    ],
                    false,
                )
                .state()
        } else {
            self.mmbdd
                .make([(Dest::State(high), letters.one())], false)
                .state()
        }
    }

    /// As [`Self::high_branch`], but the bits read so far fall strictly
    /// below those of `value`, so the current bit must compensate.
    fn low_branch(&self, value: i64, i: usize) -> StateId {
        let letters = self.letters();
        let var = letters.var(input_var(i));

        if value == 0 {
            return self
                .mmbdd
                .make(
                    [
                        (Dest::Myself, letters.negate(var)),
                        (Dest::State(FULL), var),
                    ],
                    false,
                )
                .state();
        }
        if value & 1 == 0 {
            let high = self.high_branch(value >> 1, i);
            let low = self.low_branch(value >> 1, i);
            self.mmbdd
                .make(
                    [
                        (Dest::State(high), var),
                        (Dest::State(low), letters.negate(var)),
                    ],
                    false,
                )
                .state()
        } else {
            let low = self.low_branch(value >> 1, i);
            self.mmbdd
                .make([(Dest::State(low), letters.one())], false)
                .state()
        }
    }

    /// Membership test: feed the bits of `v`, one letter per position, with
    /// at least one letter even for the zero vector.
    fn contains(&self, state: StateId, dim: usize, v: &[i64]) -> bool {
        assert_eq!(v.len(), dim, "Dimension mismatch");
        debug_assert!(v.iter().all(|&x| x >= 0));

        let letters = self.letters();
        let mut v = v.to_vec();
        let mut word = Vec::new();
        loop {
            let mut bits = letters.one();
            let mut exhausted = true;
            for (i, value) in v.iter_mut().enumerate() {
                let var = letters.var(input_var(i));
                let lit = if *value & 1 == 1 {
                    var
                } else {
                    letters.negate(var)
                };
                bits = letters.and(bits, lit);
                *value >>= 1;
                if *value != 0 {
                    exhausted = false;
                }
            }
            word.push(bits);
            if exhausted {
                break;
            }
        }
        self.mmbdd.accepts(state, &word)
    }

    /// The identity relation over all `dim` track pairs: every subject bit
    /// equals its image bit, forever, accepting.
    fn bit_identities(&self, dim: usize) -> StateId {
        if let Some(&cached) = self.identities.borrow().get(&dim) {
            return cached;
        }

        let letters = self.letters();
        let mut all_eq = letters.one();
        for i in 0..dim {
            let var = letters.var(input_var(i));
            let mapped = letters.var(output_var(i));
            all_eq = letters.and(all_eq, letters.negate(letters.xor(var, mapped)));
        }
        let state = self.mmbdd.make([(Dest::Myself, all_eq)], true).state();

        self.identities.borrow_mut().insert(dim, state);
        state
    }

    /// Equality constraint on every track pair except dimension `idx`.
    fn untouched_components(&self, dim: usize, idx: usize) -> L::Set {
        if let Some(&cached) = self.untouched.borrow().get(&(dim, idx)) {
            return cached;
        }

        let letters = self.letters();
        let mut eq = letters.one();
        for i in 0..dim {
            if i == idx {
                continue;
            }
            let var = letters.var(input_var(i));
            let mapped = letters.var(output_var(i));
            eq = letters.and(eq, letters.negate(letters.xor(var, mapped)));
        }

        self.untouched.borrow_mut().insert((dim, idx), eq);
        eq
    }

    /// Ripple-carry adder relating the subject track of `idx` to its image
    /// track shifted by `delta` (subtracted when `neg`), all other tracks
    /// unchanged. Bit-serial: the remaining `delta` bits and the pending
    /// carry identify the state.
    fn plus_transducer(
        &self,
        idx: usize,
        dim: usize,
        delta: u64,
        neg: bool,
        carry: bool,
    ) -> StateId {
        if delta == 0 && !carry {
            return self.bit_identities(dim);
        }

        let key = (idx, dim, delta, neg, carry);
        if let Some(&cached) = self.transducers.borrow().get(&key) {
            return cached;
        }

        let letters = self.letters();
        let untouched = self.untouched_components(dim, idx);
        let (var, mapped) = {
            let var = letters.var(input_var(idx));
            let mapped = letters.var(output_var(idx));
            // Subtraction runs the same adder with the tracks swapped.
            if neg {
                (mapped, var)
            } else {
                (var, mapped)
            }
        };
        let eq = letters.negate(letters.xor(var, mapped));
        let b = delta & 1 == 1;

        let pairs: Vec<(Dest, L::Set)> = if b && carry {
            // Both the delta bit and the carry are set: the image bit
            // equals the subject bit and a carry is always generated.
            let dest_carry = Dest::State(self.plus_transducer(idx, dim, delta >> 1, neg, true));
            vec![(dest_carry, letters.and(eq, untouched))]
        } else if b || carry {
            // Exactly one of them is set: add one to this position.
            let (dest_carry, dest_nocarry) = if delta == 0 {
                // Pure carry propagation loops on itself until the carry is
                // consumed by a zero subject bit.
                (
                    Dest::Myself,
                    Dest::State(self.plus_transducer(idx, dim, 0, neg, false)),
                )
            } else {
                (
                    Dest::State(self.plus_transducer(idx, dim, delta >> 1, neg, true)),
                    Dest::State(self.plus_transducer(idx, dim, delta >> 1, neg, false)),
                )
            };
            vec![
                (
                    dest_carry,
                    letters.and(letters.and(var, letters.negate(mapped)), untouched),
                ),
                (
                    dest_nocarry,
                    letters.and(letters.and(letters.negate(var), mapped), untouched),
                ),
            ]
        } else {
            // Nothing to add at this position.
            let dest_nocarry = Dest::State(self.plus_transducer(idx, dim, delta >> 1, neg, false));
            vec![(dest_nocarry, letters.and(eq, untouched))]
        };

        let state = self.mmbdd.make(pairs, false).state();
        debug!(
            "plus_transducer: idx {} delta {}{} carry {} -> {}",
            idx,
            if neg { "-" } else { "+" },
            delta,
            carry,
            state
        );

        self.transducers.borrow_mut().insert(key, state);
        state
    }

    /// Intersect with a transducer and project the image tracks back onto
    /// the subject tracks.
    fn transduce(&self, state: StateId, transducer: StateId, dim: usize) -> StateId {
        let map = LetterMap::Rename {
            drop: (0..dim).map(input_var).collect(),
            rename: (0..dim).map(|i| (output_var(i), input_var(i))).collect(),
        };
        self.mmbdd.compose(state, transducer, true, &map)
    }

    /// Fix acceptance so that trailing all-zero letters never matter:
    /// `u · 0*` is accepted iff `u` is.
    fn zero_padded(&self, state: StateId, dim: usize) -> StateId {
        if state == EMPTY || state == FULL {
            return state;
        }
        let key = (state, dim);
        if let Some(&cached) = self.padded.borrow().get(&key) {
            return cached;
        }

        let letters = self.letters();
        let mut all_zero = letters.one();
        for i in 0..dim {
            all_zero = letters.and(all_zero, letters.negate(letters.var(input_var(i))));
        }

        let mut is_accepting = self.mmbdd.is_accepting(state);
        let mut zero_seen = false;
        let mut pairs = Vec::new();

        for (dest, labels) in self.mmbdd.row(state).edges() {
            if dest == state {
                pairs.push((Dest::Myself, labels));
                continue;
            }
            let new_dest = self.zero_padded(dest, dim);
            // Determinism puts the all-zero letter on exactly one edge; if
            // it is this one, acceptance follows the padded destination.
            if !is_accepting && !zero_seen && !letters.is_zero(letters.and(labels, all_zero)) {
                is_accepting = self.mmbdd.is_accepting(new_dest);
                zero_seen = true;
            }
            pairs.push((Dest::State(new_dest), labels));
        }
        let padded = self.mmbdd.make(pairs, is_accepting).state();

        self.padded.borrow_mut().insert(key, padded);
        padded
    }

    /// Component-wise translation of the whole set by `v`, one dimension at
    /// a time. Zero padding after each dimension keeps the automaton small.
    fn plus(&self, state: StateId, dim: usize, v: &[i64]) -> StateId {
        assert_eq!(v.len(), dim, "Dimension mismatch");

        let mut current = state;
        for (i, &delta) in v.iter().enumerate() {
            if delta == 0 {
                continue;
            }
            debug!("plus: dimension {} shift {}", i, delta);
            let transducer = self.plus_transducer(i, dim, delta.unsigned_abs(), delta < 0, false);
            current = self.transduce(current, transducer, dim);
            current = self.zero_padded(current, dim);
        }
        current
    }
}

/// A handle on one upward-closed set of a fixed dimension.
pub struct Upset<'a, L: Letters> {
    store: &'a UpsetStore<L>,
    state: StateId,
    dim: usize,
}

impl<L: Letters> Copy for Upset<'_, L> {}
impl<L: Letters> Clone for Upset<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: Letters> std::fmt::Debug for Upset<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Upset({}, dim {})", self.state, self.dim)
    }
}

impl<L: Letters> PartialEq for Upset<'_, L> {
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(
            std::ptr::eq(self.store, other.store) && self.dim == other.dim,
            "Comparing upsets of different stores or dimensions"
        );
        self.state == other.state
    }
}
impl<L: Letters> Eq for Upset<'_, L> {}

impl<'a, L: Letters> Upset<'a, L> {
    pub fn dim(self) -> usize {
        self.dim
    }

    pub fn mbdd(self) -> MetaBdd<'a, L> {
        self.store.mmbdd.handle(self.state)
    }

    pub fn contains(self, v: &[i64]) -> bool {
        self.store.contains(self.state, self.dim, v)
    }

    /// Translate the set by `v`: the result contains `w` iff this set
    /// contains `w - v` (clamped to upward closure at zero).
    pub fn plus(self, v: &[i64]) -> Self {
        self.store.upset(self.store.plus(self.state, self.dim, v), self.dim)
    }

    pub fn is_full(self) -> bool {
        self.state == FULL
    }

    pub fn is_empty(self) -> bool {
        self.state == EMPTY
    }
}

impl<'a, L: Letters> Add<&[i64]> for Upset<'a, L> {
    type Output = Upset<'a, L>;

    fn add(self, v: &[i64]) -> Self::Output {
        self.plus(v)
    }
}

impl<'a, L: Letters> BitAnd for Upset<'a, L> {
    type Output = Upset<'a, L>;

    fn bitand(self, other: Self) -> Self::Output {
        debug_assert!(std::ptr::eq(self.store, other.store) && self.dim == other.dim);
        let state = self
            .store
            .mmbdd
            .compose(self.state, other.state, true, &LetterMap::Identity);
        self.store.upset(state, self.dim)
    }
}

impl<'a, L: Letters> BitOr for Upset<'a, L> {
    type Output = Upset<'a, L>;

    fn bitor(self, other: Self) -> Self::Output {
        debug_assert!(std::ptr::eq(self.store, other.store) && self.dim == other.dim);
        let state = self
            .store
            .mmbdd
            .compose(self.state, other.state, false, &LetterMap::Identity);
        self.store.upset(state, self.dim)
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;

    fn setup() -> UpsetStore<Bdd> {
        UpsetStore::new(Bdd::default())
    }

    #[test]
    fn test_seed_membership() {
        let store = setup();
        let u = store.of(&[2]);

        assert!(u.contains(&[2]));
        assert!(u.contains(&[3]));
        assert!(u.contains(&[4]));
        assert!(u.contains(&[5]));
        assert!(!u.contains(&[0]));
        assert!(!u.contains(&[1]));
    }

    #[test]
    fn test_seed_zero_is_full() {
        let store = setup();
        assert!(store.of(&[0]).is_full());
        assert!(store.of(&[0, 0]).is_full());
    }

    #[test]
    fn test_seed_multi_dim() {
        let store = setup();
        let u = store.of(&[3, 1, 4, 9]);

        assert!(u.contains(&[3, 1, 4, 9]));
        assert!(u.contains(&[4, 2, 4, 10]));
        assert!(!u.contains(&[1, 1, 4, 9]));
        assert!(!u.contains(&[3, 1, 4, 0]));
    }

    #[test]
    fn test_seed_cached() {
        let store = setup();
        let u1 = store.of(&[2, 3]);
        let u2 = store.of(&[2, 3]);
        assert_eq!(u1, u2);
    }

    #[test]
    fn test_plus_zero_is_identity() {
        let store = setup();
        let u = store.of(&[1, 0]);
        assert_eq!(u.plus(&[0, 0]), u);

        // Decrementing at zero is a no-op: the set is already closed there.
        let z = store.of(&[0]);
        assert_eq!(z.plus(&[-1]), z);
        assert_eq!(u.plus(&[0, -1]), u);
    }

    #[test]
    fn test_plus_decrement() {
        let store = setup();
        let u = store.of(&[2]).plus(&[-1]);

        assert!(!u.mbdd().accepts(&[]));
        assert!(u.contains(&[1]));
        assert!(!u.contains(&[0]));
    }

    #[test]
    fn test_plus_increment() {
        let store = setup();
        let u = store.of(&[0, 0]).plus(&[2, 0]);

        assert!(u.contains(&[2, 0]));
        assert!(!u.contains(&[1, 0]));
    }

    #[test]
    fn test_bit_identities_is_canonical() {
        let store = setup();
        let a = store.bit_identities(2);
        let b = store.bit_identities(2);
        assert_eq!(a, b);
        assert!(store.universe().is_accepting(a));
    }

    #[test]
    fn test_plus_carry_chain() {
        let store = setup();
        let u = store.of(&[2, 1]).plus(&[5, 1]);

        assert!(!u.contains(&[6, 1]));
        assert!(!u.contains(&[7, 1]));
        assert!(u.contains(&[9, 2]));
        assert!(u.contains(&[10, 2]));
        assert!(!u.contains(&[0, 1]));
        assert!(!u.contains(&[1, 1]));
    }

    #[test]
    fn test_plus_all_positive() {
        let store = setup();
        let u = store.of(&[3, 1, 4, 9]).plus(&[3, 2, 3, 0]);

        assert!(u.contains(&[6, 3, 7, 9]));
        assert!(!u.contains(&[5, 3, 7, 9]));
        assert!(!u.contains(&[6, 2, 7, 9]));
        assert!(!u.contains(&[6, 3, 6, 9]));
        assert!(!u.contains(&[6, 3, 7, 8]));
    }

    #[test]
    fn test_plus_mixed_signs() {
        let store = setup();
        // Lands on {6, 0, 7, 8}.
        let mut u = store.of(&[3, 1, 4, 9]).plus(&[3, -2, 3, -1]);

        assert!(u.contains(&[6, 3, 7, 9]));
        assert!(!u.contains(&[5, 3, 7, 9]));
        assert!(u.contains(&[6, 2, 7, 9]));
        assert!(u.contains(&[6, 0, 7, 9]));
        assert!(!u.contains(&[6, 3, 6, 9]));
        assert!(u.contains(&[6, 3, 7, 8]));
        assert!(!u.contains(&[6, 3, 7, 7]));

        u = u & store.of(&[2, 2, 1, 8]);
        assert!(u.contains(&[6, 3, 7, 9]));
        assert!(u.contains(&[6, 2, 7, 8]));
        assert!(!u.contains(&[5, 2, 7, 8]));
        assert!(!u.contains(&[6, 2, 5, 8]));
    }

    #[test]
    fn test_decrement_to_full() {
        let store = setup();
        let u = store.of(&[0]).plus(&[1]);

        assert!(u.contains(&[7]));
        assert!(!u.contains(&[0]));
        assert!((u | store.of(&[0])).is_full());
        assert_eq!(u & store.of(&[0]), u);

        assert!(store.of(&[2]).plus(&[-2]).is_full());
        assert!(store
            .of(&[1, 2, 3])
            .plus(&[-1, -2, -3])
            .is_full());
    }

    #[test]
    fn test_increment_then_decrement() {
        let store = setup();
        let u = store.of(&[0, 1]);

        let w1 = u.plus(&[1, 0]);
        assert_eq!(w1, store.of(&[1, 1]));

        let w2 = u.plus(&[0, -1]);
        assert_eq!(w2, store.of(&[0, 0]));

        let w = w1.plus(&[0, -1]);
        assert_eq!(w, store.of(&[1, 0]));
        assert!(!w.mbdd().accepts(&[]));
        assert!(w.contains(&[1, 1]));
        assert!(!w.contains(&[0, 0]));
        assert!(!w.contains(&[0, 1]));
        assert!(w.contains(&[2, 2]));
    }

    #[test]
    fn test_union_of_seeds() {
        let store = setup();
        let u = store.of(&[0, 1, 1]) | store.of(&[0, 0, 2]) | store.of(&[0, 2, 0]);

        assert!(u.plus(&[0, -2, -2]).is_full());

        let w = u.plus(&[1, -1, 0]);
        assert!(w.contains(&[1, 1, 1]));
        assert!(w.contains(&[2, 1, 0]));
        assert!(!w.contains(&[2, 0, 0]));
        assert!(w.contains(&[1, 1, 0]));
        assert!(!w.mbdd().accepts(&[]));
        assert!(!w.contains(&[1, 0, 0]));
        assert!(!w.contains(&[0, 0, 0]));
    }

    #[test]
    fn test_union_keeps_minimal_elements() {
        let store = setup();
        let u = store.of(&[3, 1, 1, 3]) | store.of(&[1, 3, 2, 2]);

        assert!(u.contains(&[3, 1, 1, 3]));
        assert!(u.contains(&[1, 3, 2, 2]));
        assert!(!u.contains(&[1, 2, 2, 2]));
        assert!(!u.contains(&[2, 0, 0, 3]));

        assert!(u.plus(&[-3, -3, -2, -3]).is_full());
    }

    #[test]
    fn test_upset_laws() {
        let store = setup();
        for v in [[2, 1], [0, 3], [5, 5], [1, 0]] {
            let u = store.of(&v);
            assert!(u.contains(&v));
            for i in 0..2 {
                if v[i] > 0 {
                    let mut below = v;
                    below[i] -= 1;
                    assert!(!u.contains(&below), "{:?} below {:?}", below, v);
                }
            }
        }
    }

    #[test]
    fn test_addition_consistency_bounded() {
        let store = setup();
        for a in 0..3i64 {
            for b in 0..3i64 {
                let u = store.of(&[a, b]);
                for da in -1..3i64 {
                    for db in -1..3i64 {
                        let shifted = u.plus(&[da, db]);
                        let expected = store.of(&[(a + da).max(0), (b + db).max(0)]);
                        for wa in 0..6i64 {
                            for wb in 0..6i64 {
                                assert_eq!(
                                    shifted.contains(&[wa, wb]),
                                    expected.contains(&[wa, wb]),
                                    "{:?} + {:?} at {:?}",
                                    [a, b],
                                    [da, db],
                                    [wa, wb]
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_one_word_agreement() {
        let store = setup();
        let m = store.of(&[2, 1]).mbdd();

        let w = m.one_word(true).expect("some vector is in the set");
        assert!(m.accepts(&w));
        let w = m.one_word(false).expect("some vector is not in the set");
        assert!(m.rejects(&w));
    }

    struct TransitionView {
        budgets: Vec<i64>,
        backward_deltas: Vec<i64>,
    }

    /// Backward coverability for a Petri net: iterate the predecessor basis
    /// of the target's upward closure to fixpoint, reporting whether the
    /// initial marking falls in.
    fn backward_coverability(
        store: &UpsetStore<Bdd>,
        init: &[i64],
        target: &[i64],
        transitions: &[TransitionView],
    ) -> bool {
        let mut frontier = store.of(target);
        loop {
            let before = frontier;
            for t in transitions {
                let mt = before.plus(&t.backward_deltas) & store.of(&t.budgets);
                if mt.contains(init) {
                    return true;
                }
                frontier = frontier | mt;
            }
            if before == frontier {
                return false;
            }
        }
    }

    #[test]
    fn test_coverability_producer() {
        let store = setup();
        // One place, one transition producing a token from nothing.
        let transitions = [TransitionView {
            budgets: vec![0],
            backward_deltas: vec![-1],
        }];
        assert!(backward_coverability(&store, &[0], &[1], &transitions));
    }

    #[test]
    fn test_coverability_consumer_only() {
        let store = setup();
        // One place, one transition consuming a token: the target is out of
        // reach from an empty net.
        let transitions = [TransitionView {
            budgets: vec![1],
            backward_deltas: vec![1],
        }];
        assert!(!backward_coverability(&store, &[0], &[1], &transitions));
    }

    #[test]
    fn test_coverability_token_passing() {
        let store = setup();
        // Two places; t1 moves a token from the first place to the second.
        let t1 = TransitionView {
            budgets: vec![1, 0],
            backward_deltas: vec![1, -1],
        };
        assert!(backward_coverability(
            &store,
            &[1, 0],
            &[0, 1],
            std::slice::from_ref(&t1)
        ));
        // With an empty net, the token never appears.
        assert!(!backward_coverability(
            &store,
            &[0, 0],
            &[0, 1],
            std::slice::from_ref(&t1)
        ));
    }

    #[test]
    fn test_successor_deterministic_fuzz() {
        let store = setup();

        // Populate the table with a mix of seeds, arithmetic, and products.
        let a = store.of(&[2, 1]).plus(&[1, -1]);
        let b = store.of(&[0, 3]);
        let _ = (a & b) | store.of(&[1, 1]);

        let mmbdd = store.universe();
        let letters = mmbdd.letters();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for s in 0..mmbdd.num_states() as u32 {
            let state = StateId(s);
            for _ in 0..20 {
                let mut letter = letters.one();
                for v in 1..=4 {
                    let var = letters.var(v);
                    let lit = if rng.random_bool(0.5) {
                        var
                    } else {
                        letters.negate(var)
                    };
                    letter = letters.and(letter, lit);
                }
                // successor asserts that at most one edge matches.
                let dest = mmbdd.successor(state, letter);
                assert!(dest.index() < mmbdd.num_states());
            }
        }
    }
}
