use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use log::debug;

use crate::cache::Cache;
use crate::letters::Letters;
use crate::product::LetterMap;

/// A canonical automaton state: a small stable integer id into the master
/// table of its [`Universe`]. Ids are append-only; a state, once minted,
/// lives for the lifetime of the universe.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StateId(pub(crate) u32);

/// The state rejecting every word.
pub const EMPTY: StateId = StateId(0);
/// The state accepting every word.
pub const FULL: StateId = StateId(1);

impl StateId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Destination of an edge under construction.
///
/// `Myself` refers to the state currently being defined, enabling
/// self-referential transitions before an id exists; it is substituted for
/// the concrete id exactly once, when the id is minted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Dest {
    Myself,
    State(StateId),
}

impl From<StateId> for Dest {
    fn from(state: StateId) -> Self {
        Dest::State(state)
    }
}

/// A total, deterministic transition relation: every letter maps to exactly
/// one destination. Edges to concrete states are kept sorted by state id;
/// the labels of the `Myself` edge, if any, are stored apart.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Transition<S> {
    edges: Vec<(StateId, S)>,
    self_labels: Option<S>,
}

impl<S: Copy + Eq> Transition<S> {
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            self_labels: None,
        }
    }

    /// Merge the given edges, OR-ing labels of duplicate destinations and
    /// dropping empty labels.
    pub fn from_pairs<L>(letters: &L, pairs: impl IntoIterator<Item = (Dest, S)>) -> Self
    where
        L: Letters<Set = S>,
    {
        let mut trans = Self::new();
        for (dest, labels) in pairs {
            trans.add(letters, dest, labels);
        }
        trans
    }

    pub fn add<L>(&mut self, letters: &L, dest: Dest, labels: S)
    where
        L: Letters<Set = S>,
    {
        if letters.is_zero(labels) {
            return;
        }
        match dest {
            Dest::Myself => {
                self.self_labels = Some(match self.self_labels {
                    Some(old) => letters.or(old, labels),
                    None => labels,
                });
            }
            Dest::State(state) => match self.edges.binary_search_by_key(&state, |&(s, _)| s) {
                Ok(i) => self.edges[i].1 = letters.or(self.edges[i].1, labels),
                Err(i) => self.edges.insert(i, (state, labels)),
            },
        }
    }

    pub fn self_labels(&self) -> Option<S> {
        self.self_labels
    }

    pub fn edges(&self) -> impl Iterator<Item = (StateId, S)> + '_ {
        self.edges.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Make totality explicit: route every uncovered letter to [`EMPTY`].
    pub fn complete<L>(&mut self, letters: &L)
    where
        L: Letters<Set = S>,
    {
        let mut present = self.self_labels.unwrap_or_else(|| letters.zero());
        for &(_, labels) in &self.edges {
            present = letters.or(present, labels);
        }
        let absent = letters.negate(present);
        if !letters.is_zero(absent) {
            self.add(letters, Dest::State(EMPTY), absent);
        }
    }

    /// Rewrite the `Myself` edge to a concrete edge to `state`.
    fn self_to_state<L>(&self, letters: &L, state: StateId) -> Self
    where
        L: Letters<Set = S>,
    {
        let Some(labels) = self.self_labels else {
            return self.clone();
        };
        let mut concrete = Self {
            edges: self.edges.clone(),
            self_labels: None,
        };
        debug_assert!(concrete
            .edges
            .binary_search_by_key(&state, |&(s, _)| s)
            .is_err());
        concrete.add(letters, Dest::State(state), labels);
        concrete
    }
}

impl<S: Copy + Eq> Default for Transition<S> {
    fn default() -> Self {
        Self::new()
    }
}

const REJ: usize = 0;
const ACC: usize = 1;

/// The master automaton table: the single owner of every canonical state.
///
/// Each state is a total deterministic transition relation over letter sets
/// plus an acceptance flag. `make` hash-conses: structurally equal
/// transitions -- up to substituting [`Dest::Myself`] for the state's own
/// id -- collapse to one id. The table is append-only; there is no merging,
/// eviction, or garbage collection.
///
/// Interior mutability follows the manager pattern: all methods take
/// `&self`, and the universe is single-threaded by construction.
pub struct Universe<L: Letters> {
    letters: L,
    delta: RefCell<Vec<Transition<L::Set>>>,
    accepting: RefCell<Vec<bool>>,
    /// Keyed by the transition with `Myself` left symbolic.
    by_self: RefCell<[HashMap<Transition<L::Set>, StateId>; 2]>,
    /// Keyed by the transition with `Myself` substituted for the concrete id.
    by_concrete: RefCell<[HashMap<Transition<L::Set>, StateId>; 2]>,
    pub(crate) product_cache: RefCell<Cache<(bool, StateId, StateId, LetterMap), StateId>>,
    pub(crate) apply_cache: RefCell<Cache<(StateId, LetterMap), StateId>>,
}

impl<L: Letters> Universe<L> {
    /// Create a universe with the [`EMPTY`] and [`FULL`] rows installed.
    pub fn new(letters: L) -> Self {
        let one = letters.one();

        let mut self_trans = Transition::new();
        self_trans.add(&letters, Dest::Myself, one);

        let mut empty_row = Transition::new();
        empty_row.add(&letters, Dest::State(EMPTY), one);
        let mut full_row = Transition::new();
        full_row.add(&letters, Dest::State(FULL), one);

        let universe = Self {
            delta: RefCell::new(vec![empty_row.clone(), full_row.clone()]),
            accepting: RefCell::new(vec![false, true]),
            by_self: RefCell::new([HashMap::new(), HashMap::new()]),
            by_concrete: RefCell::new([HashMap::new(), HashMap::new()]),
            product_cache: RefCell::new(Cache::new()),
            apply_cache: RefCell::new(Cache::new()),
            letters,
        };

        {
            let mut by_self = universe.by_self.borrow_mut();
            let mut by_concrete = universe.by_concrete.borrow_mut();
            by_self[REJ].insert(self_trans.clone(), EMPTY);
            by_self[ACC].insert(self_trans, FULL);
            by_concrete[REJ].insert(empty_row, EMPTY);
            by_concrete[ACC].insert(full_row, FULL);
        }

        universe
    }

    pub fn letters(&self) -> &L {
        &self.letters
    }

    /// Number of live states.
    pub fn num_states(&self) -> usize {
        self.delta.borrow().len()
    }

    pub fn empty(&self) -> MetaBdd<'_, L> {
        self.handle(EMPTY)
    }

    pub fn full(&self) -> MetaBdd<'_, L> {
        self.handle(FULL)
    }

    /// Wrap a state id into a handle tied to this universe.
    pub fn handle(&self, state: StateId) -> MetaBdd<'_, L> {
        debug_assert!(state.index() < self.num_states());
        MetaBdd {
            mmbdd: self,
            state,
        }
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.borrow()[state.index()]
    }

    pub(crate) fn row(&self, state: StateId) -> Transition<L::Set> {
        self.delta.borrow()[state.index()].clone()
    }

    /// Create (or find) the canonical state with the given transition and
    /// acceptance. Uncovered letters are routed to [`EMPTY`].
    ///
    /// Precondition: the merged edges are deterministic (pairwise disjoint
    /// labels); asserted in debug builds, undefined behavior otherwise.
    pub fn make(
        &self,
        pairs: impl IntoIterator<Item = (Dest, L::Set)>,
        is_accepting: bool,
    ) -> MetaBdd<'_, L> {
        let mut trans = Transition::from_pairs(&self.letters, pairs);

        debug_assert!(
            self.is_deterministic(&trans),
            "Transition is not deterministic"
        );

        trans.complete(&self.letters);

        if let Some(found) = self.find(&trans, is_accepting) {
            debug!("make: cached -> {}", found);
            return self.handle(found);
        }

        // Not found: mint the next id.
        let state = StateId(self.num_states() as u32);
        let concrete = trans.self_to_state(&self.letters, state);
        debug!("make: minting {} (accepting = {})", state, is_accepting);

        self.delta.borrow_mut().push(concrete.clone());
        self.accepting.borrow_mut().push(is_accepting);
        let acc = is_accepting as usize;
        self.by_self.borrow_mut()[acc].insert(trans, state);
        self.by_concrete.borrow_mut()[acc].insert(concrete, state);

        #[cfg(debug_assertions)]
        self.check_consistency(state);

        self.handle(state)
    }

    /// Canonicalization lookup, both keyings.
    ///
    /// A transition carrying `Myself` labels also matches a registered
    /// concrete transition that differs on exactly one edge -- the
    /// candidate's own self-loop -- by folding the `Myself` labels into it.
    fn find(&self, trans: &Transition<L::Set>, is_accepting: bool) -> Option<StateId> {
        let acc = is_accepting as usize;

        let Some(self_labels) = trans.self_labels() else {
            return self.by_concrete.borrow()[acc].get(trans).copied();
        };

        // Only a self-loop and rejecting: that's the empty language.
        if !is_accepting && trans.is_empty() {
            return Some(EMPTY);
        }

        if let Some(&state) = self.by_self.borrow()[acc].get(trans) {
            return Some(state);
        }

        for (other, &candidate) in self.by_concrete.borrow()[acc].iter() {
            if other.len() != trans.len() {
                continue;
            }
            let mut discrepancy = false;
            let mut matched = true;
            for ((state, labels), (other_state, other_labels)) in trans.edges().zip(other.edges())
            {
                if state != other_state {
                    matched = false;
                    break;
                }
                if labels != other_labels {
                    // Only the candidate's own self-loop may differ, and only
                    // by exactly the Myself labels.
                    if discrepancy || other_state != candidate {
                        matched = false;
                        break;
                    }
                    discrepancy = true;
                    if self.letters.or(labels, self_labels) != other_labels {
                        matched = false;
                        break;
                    }
                }
            }
            if matched && discrepancy {
                return Some(candidate);
            }
        }
        None
    }

    /// One deterministic step. Precondition: exactly one destination is
    /// implied by `letter`; checked in debug builds.
    pub fn successor(&self, state: StateId, letter: L::Set) -> StateId {
        let delta = self.delta.borrow();
        let mut matches = delta[state.index()]
            .edges()
            .filter(|&(_, labels)| !self.letters.is_zero(self.letters.and(labels, letter)));

        let dest = matches.next().map_or(EMPTY, |(dest, _)| dest);
        debug_assert!(
            matches.next().is_none(),
            "Letter implies more than one destination from {}",
            state
        );
        dest
    }

    /// Does `state` accept the given word?
    pub fn accepts(&self, state: StateId, word: &[L::Set]) -> bool {
        let mut current = state;
        for &letter in word {
            current = self.successor(current, letter);
            if current == FULL {
                return true;
            }
            if current == EMPTY {
                return false;
            }
        }
        self.is_accepting(current)
    }

    /// A shortest word leading from `state` to a state whose acceptance is
    /// `accepted`, or `None` if no such word exists.
    pub fn one_word(&self, state: StateId, accepted: bool) -> Option<Vec<L::Set>> {
        if self.is_accepting(state) == accepted {
            return Some(Vec::new());
        }

        // BFS over the reachable part of the table.
        let mut prev: HashMap<StateId, (StateId, L::Set)> = HashMap::new();
        let mut queue = std::collections::VecDeque::from([state]);

        while let Some(current) = queue.pop_front() {
            for (dest, labels) in self.row(current).edges() {
                if dest == current || prev.contains_key(&dest) || dest == state {
                    continue;
                }
                prev.insert(dest, (current, labels));
                if self.is_accepting(dest) == accepted {
                    // Walk the path backwards, picking one letter per edge.
                    let mut word = Vec::new();
                    let mut at = dest;
                    while at != state {
                        let (from, labels) = prev[&at];
                        let letter = self
                            .letters
                            .pick_cube(labels)
                            .expect("edge labels are never empty");
                        word.push(letter);
                        at = from;
                    }
                    word.reverse();
                    return Some(word);
                }
                queue.push_back(dest);
            }
        }
        None
    }

    fn is_deterministic(&self, trans: &Transition<L::Set>) -> bool {
        let mut all = trans.self_labels().unwrap_or_else(|| self.letters.zero());
        for (_, labels) in trans.edges() {
            if !self.letters.is_zero(self.letters.and(labels, all)) {
                return false;
            }
            all = self.letters.or(all, labels);
        }
        true
    }

    /// Verify that the freshly minted row is deterministic. Rows are
    /// immutable once created, so checking each new row keeps the whole
    /// table consistent inductively.
    #[cfg(debug_assertions)]
    fn check_consistency(&self, state: StateId) {
        let row = self.row(state);
        assert!(
            self.is_deterministic(&row),
            "Internal error: state {} has overlapping edge labels",
            state
        );
    }
}

/// A copyable handle to a canonical state of a [`Universe`].
pub struct MetaBdd<'a, L: Letters> {
    pub(crate) mmbdd: &'a Universe<L>,
    pub(crate) state: StateId,
}

impl<L: Letters> Copy for MetaBdd<'_, L> {}
impl<L: Letters> Clone for MetaBdd<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: Letters> fmt::Debug for MetaBdd<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaBdd({})", self.state)
    }
}

impl<L: Letters> PartialEq for MetaBdd<'_, L> {
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(
            std::ptr::eq(self.mmbdd, other.mmbdd),
            "Comparing states of different universes"
        );
        self.state == other.state
    }
}
impl<L: Letters> Eq for MetaBdd<'_, L> {}

impl<'a, L: Letters> MetaBdd<'a, L> {
    pub fn state(self) -> StateId {
        self.state
    }

    pub fn universe(self) -> &'a Universe<L> {
        self.mmbdd
    }

    pub fn is_accepting(self) -> bool {
        self.mmbdd.is_accepting(self.state)
    }

    pub fn accepts(self, word: &[L::Set]) -> bool {
        self.mmbdd.accepts(self.state, word)
    }

    pub fn rejects(self, word: &[L::Set]) -> bool {
        !self.accepts(word)
    }

    pub fn one_step(self, letter: L::Set) -> Self {
        self.mmbdd.handle(self.mmbdd.successor(self.state, letter))
    }

    pub fn one_word(self, accepted: bool) -> Option<Vec<L::Set>> {
        self.mmbdd.one_word(self.state, accepted)
    }
}

impl<L: Letters> fmt::Display for MetaBdd<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printed = HashSet::new();
        print_rec(self.mmbdd, self.state, f, &mut printed)
    }
}

/// Debug printer: `id(acc)?: qj * (expr) + ...`, every reachable state
/// listed once. Edges to [`EMPTY`] are omitted. For inspection only.
fn print_rec<L: Letters>(
    mmbdd: &Universe<L>,
    state: StateId,
    f: &mut fmt::Formatter<'_>,
    printed: &mut HashSet<StateId>,
) -> fmt::Result {
    printed.insert(state);

    write!(f, "{}", state)?;
    if mmbdd.is_accepting(state) {
        write!(f, "(acc)")?;
    }
    write!(f, ": ")?;

    let row = mmbdd.row(state);
    let mut first = true;
    for (dest, labels) in row.edges() {
        if dest == EMPTY {
            continue;
        }
        if !first {
            write!(f, " + ")?;
        }
        first = false;
        write!(f, "{} * ({})", dest, mmbdd.letters().expr(labels))?;
    }
    writeln!(f)?;

    for (dest, _) in row.edges() {
        if dest != EMPTY && !printed.contains(&dest) {
            print_rec(mmbdd, dest, f, printed)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;
    use crate::reference::Ref;

    fn setup() -> Universe<Bdd> {
        Universe::new(Bdd::default())
    }

    #[test]
    fn test_constants() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);

        assert!(mmbdd.full().is_accepting());
        assert!(!mmbdd.empty().is_accepting());
        assert!(mmbdd.full().accepts(&[x0, x0, x0, x0]));
        assert!(!mmbdd.empty().accepts(&[x0, x0, x0, x0]));
    }

    #[test]
    fn test_make_simple() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x2 = bdd.mk_var(2);

        // Accept words starting with x1 & !x2.
        let first = bdd.cube([1, -2]);
        let q = mmbdd.make([(Dest::State(FULL), first)], false);

        assert!(q.accepts(&[bdd.cube([1, -2])]));
        assert!(q.accepts(&[bdd.cube([1, -2]), bdd.cube([1, 2]), -x2]));
        assert!(!q.accepts(&[bdd.cube([-1, 2])]));
        assert!(!q.accepts(&[bdd.cube([1, 2]), bdd.cube([1, 2])]));
    }

    #[test]
    fn test_make_idempotent() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);

        let q1 = mmbdd.make([(Dest::State(FULL), x0)], false);
        let q2 = mmbdd.make([(Dest::State(FULL), x0)], false);
        assert_eq!(q1, q2);

        // Same language, different construction: EMPTY edge made explicit.
        let q3 = mmbdd.make([(Dest::State(FULL), x0), (Dest::State(EMPTY), -x0)], false);
        assert_eq!(q1, q3);
    }

    #[test]
    fn test_self_collapses_with_concrete() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);

        // A state waiting for x0, then accepting everything.
        let q = mmbdd.make([(Dest::Myself, -x0), (Dest::State(FULL), x0)], false);
        let q_state = q.state();

        // Re-derive it naming the concrete id instead of Myself.
        let q2 = mmbdd.make([(Dest::State(q_state), -x0), (Dest::State(FULL), x0)], false);
        assert_eq!(q, q2);

        // And with the self labels split between Myself and the concrete id.
        let a = bdd.cube([-1, 2]);
        let b = bdd.cube([-1, -2]);
        assert_eq!(bdd.apply_or(a, b), -x0);
        let q3 = mmbdd.make(
            [(Dest::Myself, a), (Dest::State(q_state), b), (Dest::State(FULL), x0)],
            false,
        );
        assert_eq!(q, q3);
    }

    #[test]
    fn test_all_self_rejecting_is_empty() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();

        let q = mmbdd.make([(Dest::Myself, bdd.one)], false);
        assert_eq!(q, mmbdd.empty());

        let q = mmbdd.make([(Dest::Myself, bdd.one)], true);
        assert_eq!(q, mmbdd.full());
    }

    #[test]
    fn test_successor_total() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);

        let q = mmbdd.make([(Dest::State(FULL), x0)], false);
        assert_eq!(mmbdd.successor(q.state(), bdd.cube([1])), FULL);
        assert_eq!(mmbdd.successor(q.state(), bdd.cube([-1])), EMPTY);

        assert_eq!(q.one_step(bdd.cube([1])), mmbdd.full());
        assert_eq!(q.one_step(bdd.cube([-1])), mmbdd.empty());
    }

    #[test]
    fn test_one_word() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);
        let x1 = bdd.mk_var(2);

        let inner = mmbdd.make([(Dest::State(FULL), x1)], false);
        let q = mmbdd.make([(Dest::State(inner.state()), x0)], false);

        let w = q.one_word(true).expect("an accepted word exists");
        assert!(q.accepts(&w));
        assert_eq!(w.len(), 2);

        let w = q.one_word(false).expect("a rejected word exists");
        assert!(q.rejects(&w));

        assert_eq!(mmbdd.full().one_word(false), None);
        assert_eq!(mmbdd.empty().one_word(true), None);
        assert_eq!(mmbdd.full().one_word(true), Some(Vec::<Ref>::new()));
    }

    #[test]
    fn test_print() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x0 = bdd.mk_var(1);

        let q = mmbdd.make([(Dest::Myself, -x0), (Dest::State(FULL), x0)], false);
        let out = format!("{}", q);
        assert!(out.contains("q1(acc)"));
        assert!(out.contains(&format!("{}", q.state())));
    }
}
