//! Bounded table of consecutive key pairs

use heapless::Vec;

/// Default number of distinct pairs kept
pub const MAX_BIGRAMS: usize = 64;

/// An ordered pair of consecutive, distinct key positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bigram {
    /// Linear index of the first key
    pub first: u8,
    /// Linear index of the key pressed right after
    pub second: u8,
    /// Times the sequence occurred
    pub count: u16,
}

/// Fixed-capacity pair table.
///
/// Once `N` distinct pairs are stored, new pairs are dropped rather than
/// evicting anything. Entries keep insertion order, which breaks ties when
/// ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigramTable<const N: usize = MAX_BIGRAMS> {
    entries: Vec<Bigram, N>,
}

impl<const N: usize> Default for BigramTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BigramTable<N> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Entry at a table slot, in insertion order
    pub fn get(&self, slot: usize) -> Option<&Bigram> {
        self.entries.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bigram> {
        self.entries.iter()
    }

    /// Count one `first -> second` transition.
    ///
    /// Returns whether the table changed. Self-pairs, saturated counts and
    /// new pairs arriving at a full table leave it untouched.
    pub fn record_sequence(&mut self, first: u8, second: u8) -> bool {
        if first == second {
            return false;
        }

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.first == first && e.second == second)
        {
            if entry.count == u16::MAX {
                return false;
            }
            entry.count += 1;
            return true;
        }

        self.entries
            .push(Bigram {
                first,
                second,
                count: 1,
            })
            .is_ok()
    }

    /// Restore an entry verbatim, used when decoding a persisted table
    pub(crate) fn push_raw(&mut self, bigram: Bigram) -> bool {
        self.entries.push(bigram).is_ok()
    }

    /// Fill `out` with the highest counts, best first.
    ///
    /// Selection is a repeated arg-max over entries not yet picked; equal
    /// counts resolve to the earliest inserted entry. Returns how many
    /// slots of `out` were written.
    pub fn top_k(&self, out: &mut [Bigram]) -> usize {
        let mut used = [false; N];
        let mut written = 0;

        for slot in out.iter_mut() {
            let mut best: Option<usize> = None;
            let mut best_count = 0u16;

            for (i, entry) in self.entries.iter().enumerate() {
                if used[i] {
                    continue;
                }
                if entry.count > best_count {
                    best_count = entry.count;
                    best = Some(i);
                }
            }

            let Some(i) = best else { break };
            used[i] = true;
            *slot = self.entries[i];
            written += 1;
        }

        written
    }

    /// The single most frequent pair
    pub fn most_used(&self) -> Option<Bigram> {
        let mut top = [Bigram::default()];
        match self.top_k(&mut top) {
            0 => None,
            _ => Some(top[0]),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const N: usize>(table: &mut BigramTable<N>, presses: &[u8]) {
        let mut last: Option<u8> = None;
        for &pos in presses {
            if let Some(prev) = last {
                if prev != pos {
                    table.record_sequence(prev, pos);
                }
            }
            last = Some(pos);
        }
    }

    #[test]
    fn alternating_pair_counts() {
        let mut table = BigramTable::<MAX_BIGRAMS>::new();
        feed(&mut table, &[5, 12, 5, 12, 5, 12]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some(&Bigram { first: 5, second: 12, count: 3 }));
        assert_eq!(table.get(1), Some(&Bigram { first: 12, second: 5, count: 2 }));
        assert_eq!(
            table.most_used(),
            Some(Bigram { first: 5, second: 12, count: 3 })
        );
    }

    #[test]
    fn self_pairs_ignored() {
        let mut table = BigramTable::<8>::new();
        assert!(!table.record_sequence(3, 3));
        assert!(table.is_empty());
    }

    #[test]
    fn full_table_drops_new_pairs() {
        let mut table = BigramTable::<2>::new();
        assert!(table.record_sequence(1, 2));
        assert!(table.record_sequence(2, 3));
        assert!(table.is_full());

        assert!(!table.record_sequence(3, 4));
        assert_eq!(table.len(), 2);

        // existing pairs keep counting
        assert!(table.record_sequence(1, 2));
        assert_eq!(table.get(0).unwrap().count, 2);
    }

    #[test]
    fn count_saturates() {
        let mut table = BigramTable::<4>::new();
        table.push_raw(Bigram { first: 1, second: 2, count: u16::MAX });
        assert!(!table.record_sequence(1, 2));
        assert_eq!(table.get(0).unwrap().count, u16::MAX);
    }

    #[test]
    fn top_k_descending_with_insertion_tiebreak() {
        let mut table = BigramTable::<8>::new();
        table.push_raw(Bigram { first: 1, second: 2, count: 4 });
        table.push_raw(Bigram { first: 2, second: 3, count: 9 });
        table.push_raw(Bigram { first: 3, second: 4, count: 4 });
        table.push_raw(Bigram { first: 4, second: 5, count: 1 });

        let mut out = [Bigram::default(); 3];
        assert_eq!(table.top_k(&mut out), 3);
        assert_eq!(out[0], Bigram { first: 2, second: 3, count: 9 });
        assert_eq!(out[1], Bigram { first: 1, second: 2, count: 4 });
        assert_eq!(out[2], Bigram { first: 3, second: 4, count: 4 });
    }

    #[test]
    fn top_k_larger_than_table() {
        let mut table = BigramTable::<8>::new();
        table.record_sequence(1, 2);

        let mut out = [Bigram::default(); 5];
        assert_eq!(table.top_k(&mut out), 1);
    }

    #[test]
    fn top_k_does_not_mutate() {
        let mut table = BigramTable::<8>::new();
        feed(&mut table, &[1, 2, 1, 2]);
        let before = table.clone();

        let mut out = [Bigram::default(); 2];
        table.top_k(&mut out);
        assert_eq!(table, before);
    }

    #[test]
    fn clear_empties_table() {
        let mut table = BigramTable::<8>::new();
        feed(&mut table, &[1, 2, 3]);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.most_used(), None);
    }
}
