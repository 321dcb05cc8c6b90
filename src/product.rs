use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr};

use log::debug;

use crate::automaton::{Dest, MetaBdd, StateId, Universe, EMPTY, FULL};
use crate::letters::{Letters, Var};

/// A letter rewrite applied on the fly during product construction.
///
/// `Rename` existentially quantifies the `drop` variables out of each
/// product label and then substitutes `rename` pairs `(from, to)`; it turns
/// an intersection with a relation over paired variables into a
/// transduction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LetterMap {
    Identity,
    Rename {
        /// Variables to quantify away, sorted.
        drop: Vec<Var>,
        /// Order-preserving substitution pairs `(from, to)`.
        rename: Vec<(Var, Var)>,
    },
}

impl LetterMap {
    pub fn is_identity(&self) -> bool {
        matches!(self, LetterMap::Identity)
    }

    pub fn apply<L: Letters>(&self, letters: &L, f: L::Set) -> L::Set {
        match self {
            LetterMap::Identity => f,
            LetterMap::Rename { drop, rename } => {
                letters.rename(letters.exists(f, drop), rename)
            }
        }
    }
}

impl<L: Letters> Universe<L> {
    /// On-the-fly product construction: the intersection (or union) of two
    /// states, with `map` rewriting every product label.
    ///
    /// Terminates on self-referential inputs: when the destination pair
    /// loops back to the operand pair, the product edge targets
    /// [`Dest::Myself`] instead of recursing.
    pub fn compose(
        &self,
        state: StateId,
        other: StateId,
        intersection: bool,
        map: &LetterMap,
    ) -> StateId {
        // The construction is symmetric in its operands, so normalize the
        // cache key.
        let (s1, s2) = if state <= other {
            (state, other)
        } else {
            (other, state)
        };
        let key = (intersection, s1, s2, map.clone());
        if let Some(&cached) = self.product_cache.borrow().get(&key) {
            return cached;
        }

        let result = self.compose_uncached(s1, s2, intersection, map);
        debug!(
            "compose: {} {} {} -> {}",
            s1,
            if intersection { "&" } else { "|" },
            s2,
            result
        );
        self.product_cache.borrow_mut().insert(key, result);
        result
    }

    fn compose_uncached(
        &self,
        state: StateId,
        other: StateId,
        intersection: bool,
        map: &LetterMap,
    ) -> StateId {
        let nomap = map.is_identity();

        if state == other {
            return if nomap { state } else { self.apply(state, map) };
        }

        // A map cannot turn EMPTY into anything else, but it can turn FULL
        // into a new state.
        if intersection {
            if state == EMPTY || other == EMPTY {
                return EMPTY;
            }
            if nomap {
                if state == FULL {
                    return other;
                }
                if other == FULL {
                    return state;
                }
            }
        } else {
            if nomap && (state == FULL || other == FULL) {
                return FULL;
            }
            if state == EMPTY {
                return if nomap { other } else { self.apply(other, map) };
            }
            if other == EMPTY {
                return if nomap { state } else { self.apply(state, map) };
            }
        }

        let letters = self.letters();
        let row1 = self.row(state);
        let row2 = self.row(other);

        let mut m: BTreeMap<Dest, L::Set> = BTreeMap::new();
        let mut all_labels = letters.zero();

        for (dest1, labels1) in row1.edges() {
            for (dest2, labels2) in row2.edges() {
                let conj = letters.and(labels1, labels2);
                if letters.is_zero(conj) {
                    continue;
                }

                // Intersecting with EMPTY yields nothing; skipping the pair
                // here (rather than making an explicit EMPTY edge) is what
                // transductions rely on.
                if intersection && (dest1 == EMPTY || dest2 == EMPTY) {
                    continue;
                }

                let this_label = map.apply(letters, conj);

                let merge = if dest1 == dest2 {
                    if nomap {
                        Dest::State(dest1)
                    } else {
                        Dest::State(self.apply(dest1, map))
                    }
                } else if (dest1 == state && dest2 == other)
                    || (dest2 == state && dest1 == other)
                {
                    Dest::Myself
                } else {
                    Dest::State(self.compose(dest1, dest2, intersection, map))
                };

                if merge == Dest::Myself
                    || letters.is_zero(letters.and(all_labels, this_label))
                {
                    // Post-unambiguity: a label reaching the self loop never
                    // overlaps the labels already placed.
                    debug_assert!(
                        letters.is_zero(letters.and(all_labels, this_label)),
                        "Transduction is post-ambiguous in states {}, {}",
                        state,
                        other
                    );
                    or_into(letters, &mut m, merge, this_label);
                } else {
                    self.resolve_conflict(&mut m, merge, this_label);
                }

                all_labels = letters.or(all_labels, this_label);
            }
        }

        let is_accepting = if intersection {
            self.is_accepting(state) && self.is_accepting(other)
        } else {
            self.is_accepting(state) || self.is_accepting(other)
        };

        self.make(m, is_accepting).state()
    }

    /// `labels` overlaps an already placed edge: split off the common part
    /// and route it to the union of the two destinations.
    fn resolve_conflict(
        &self,
        m: &mut BTreeMap<Dest, L::Set>,
        merge: Dest,
        labels: L::Set,
    ) {
        let letters = self.letters();

        let conflict = m.iter().find_map(|(&dest, &placed)| {
            let (only_this, common, only_other) = letters.split(labels, placed);
            if letters.is_zero(common) {
                None
            } else {
                Some((dest, only_this, common, only_other))
            }
        });

        let Some((entry, only_this, common, only_other)) = conflict else {
            unreachable!("Overlap with placed labels but no overlapping edge");
        };

        // Post-unambiguity rules out overlap at the self loop.
        debug_assert!(entry != Dest::Myself, "Transduction is post-ambiguous");
        let (Dest::State(merge_state), Dest::State(entry_state)) = (merge, entry) else {
            unreachable!("Conflicting edges must target concrete states");
        };

        let union = self.compose(merge_state, entry_state, false, &LetterMap::Identity);

        m.remove(&entry);
        or_into(letters, m, Dest::State(union), common);
        if !letters.is_zero(only_this) {
            or_into(letters, m, merge, only_this);
        }
        if !letters.is_zero(only_other) {
            or_into(letters, m, entry, only_other);
        }
    }

    /// Rewrite every label of the automaton rooted at `state` through `map`,
    /// keeping the structure.
    pub fn apply(&self, state: StateId, map: &LetterMap) -> StateId {
        if map.is_identity() {
            return state;
        }
        let key = (state, map.clone());
        if let Some(&cached) = self.apply_cache.borrow().get(&key) {
            return cached;
        }

        let letters = self.letters();
        let mut m: BTreeMap<Dest, L::Set> = BTreeMap::new();
        for (dest, labels) in self.row(state).edges() {
            // Letters not covered below are re-routed to EMPTY when the row
            // is completed; mapping the explicit EMPTY labels could overlap
            // the mapped live edges.
            if dest == EMPTY {
                continue;
            }
            let mapped_dest = if dest == state {
                Dest::Myself
            } else {
                Dest::State(self.apply(dest, map))
            };
            or_into(letters, &mut m, mapped_dest, map.apply(letters, labels));
        }
        let result = self.make(m, self.is_accepting(state)).state();

        self.apply_cache.borrow_mut().insert(key, result);
        result
    }
}

fn or_into<L: Letters>(
    letters: &L,
    m: &mut BTreeMap<Dest, L::Set>,
    dest: Dest,
    labels: L::Set,
) {
    if letters.is_zero(labels) {
        return;
    }
    m.entry(dest)
        .and_modify(|placed| *placed = letters.or(*placed, labels))
        .or_insert(labels);
}

impl<'a, L: Letters> MetaBdd<'a, L> {
    /// Transduction, seen as an intersection with on-the-fly projection:
    /// `other` is a relation over paired variables, and `map` projects each
    /// product label back onto the subject variables.
    pub fn transduct(self, other: Self, map: &LetterMap) -> Self {
        self.mmbdd
            .handle(self.mmbdd.compose(self.state, other.state, true, map))
    }

    pub fn apply(self, map: &LetterMap) -> Self {
        self.mmbdd.handle(self.mmbdd.apply(self.state, map))
    }
}

impl<'a, L: Letters> BitAnd for MetaBdd<'a, L> {
    type Output = MetaBdd<'a, L>;

    fn bitand(self, other: Self) -> Self::Output {
        self.mmbdd.handle(
            self.mmbdd
                .compose(self.state, other.state, true, &LetterMap::Identity),
        )
    }
}

impl<'a, L: Letters> BitOr for MetaBdd<'a, L> {
    type Output = MetaBdd<'a, L>;

    fn bitor(self, other: Self) -> Self::Output {
        self.mmbdd.handle(
            self.mmbdd
                .compose(self.state, other.state, false, &LetterMap::Identity),
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;

    fn setup() -> Universe<Bdd> {
        Universe::new(Bdd::default())
    }

    #[test]
    fn test_constants_absorb() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x1 = bdd.mk_var(1);

        let q = mmbdd.make([(Dest::State(FULL), x1)], false);

        assert_eq!(q & mmbdd.empty(), mmbdd.empty());
        assert_eq!(q | mmbdd.full(), mmbdd.full());
        assert_eq!(q & mmbdd.full(), q);
        assert_eq!(q | mmbdd.empty(), q);
        assert_eq!(q & q, q);
        assert_eq!(q | q, q);
    }

    #[test]
    fn test_intersection_union_first_letter() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);

        let a = mmbdd.make([(Dest::State(FULL), x1)], false);
        let b = mmbdd.make([(Dest::State(FULL), x2)], false);

        let both = a & b;
        let either = a | b;

        assert!(both.accepts(&[bdd.cube([1, 2])]));
        assert!(both.rejects(&[bdd.cube([1, -2])]));
        assert!(both.rejects(&[bdd.cube([-1, 2])]));

        assert!(either.accepts(&[bdd.cube([1, -2])]));
        assert!(either.accepts(&[bdd.cube([-1, 2])]));
        assert!(either.rejects(&[bdd.cube([-1, -2])]));

        // Operands commute to the same canonical state.
        assert_eq!(both, b & a);
        assert_eq!(either, b | a);
    }

    #[test]
    fn test_self_referential_product() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);

        // "Some letter has x1 set", resp. x2.
        let ev1 = mmbdd.make([(Dest::Myself, -x1), (Dest::State(FULL), x1)], false);
        let ev2 = mmbdd.make([(Dest::Myself, -x2), (Dest::State(FULL), x2)], false);

        let both = ev1 & ev2;
        assert!(both.accepts(&[bdd.cube([1, 2])]));
        assert!(both.accepts(&[bdd.cube([1, -2]), bdd.cube([-1, 2])]));
        assert!(both.accepts(&[bdd.cube([-1, 2]), bdd.cube([-1, -2]), bdd.cube([1, -2])]));
        assert!(both.rejects(&[bdd.cube([1, -2])]));
        assert!(both.rejects(&[]));

        let either = ev1 | ev2;
        assert!(either.accepts(&[bdd.cube([1, -2])]));
        assert!(either.accepts(&[bdd.cube([-1, 2])]));
        assert!(either.rejects(&[bdd.cube([-1, -2]), bdd.cube([-1, -2])]));
    }

    #[test]
    fn test_distributivity() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let a = mmbdd.make([(Dest::Myself, -x1), (Dest::State(FULL), x1)], false);
        let b = mmbdd.make([(Dest::State(FULL), x2)], false);
        let c = mmbdd.make([(Dest::State(FULL), x3)], false);

        // Canonicity turns language equality into state equality.
        assert_eq!(a & (b | c), (a & b) | (a & c));
        assert_eq!(a | (b & c), (a | b) & (a | c));
    }

    #[test]
    fn test_apply_rename() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();
        let x1 = bdd.mk_var(1);

        let q = mmbdd.make([(Dest::Myself, -x1), (Dest::State(FULL), x1)], false);
        let map = LetterMap::Rename {
            drop: vec![],
            rename: vec![(1, 2)],
        };
        let renamed = q.apply(&map);

        assert!(renamed.accepts(&[bdd.cube([-2]), bdd.cube([2])]));
        assert!(renamed.rejects(&[bdd.cube([1, -2])]));

        // Applying the identity is free.
        assert_eq!(q.apply(&LetterMap::Identity), q);
    }

    #[test]
    fn test_apply_drop() {
        let mmbdd = setup();
        let bdd = mmbdd.letters();

        // First letter must have x1 and x2 set.
        let q = mmbdd.make([(Dest::State(FULL), bdd.cube([1, 2]))], false);
        let map = LetterMap::Rename {
            drop: vec![1],
            rename: vec![],
        };
        let projected = q.apply(&map);

        assert!(projected.accepts(&[bdd.cube([-1, 2])]));
        assert!(projected.rejects(&[bdd.cube([1, -2])]));
    }
}
