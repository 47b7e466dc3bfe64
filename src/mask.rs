/// Bits per mask word. One word covers exactly one chunk of slots.
pub const WORD_BITS: usize = 128;

/// Growable slot bitset stored as 128-bit words.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SlotMask {
    words: Vec<u128>,
    len: usize,
}

impl SlotMask {
    pub fn new() -> Self {
        SlotMask {
            words: Vec::new(),
            len: 0,
        }
    }

    pub fn with_len(len: usize) -> Self {
        SlotMask {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        debug_assert!(i < self.len, "slot {} out of bounds ({})", i, self.len);
        self.words[i / WORD_BITS] |= 1u128 << (i % WORD_BITS);
    }

    #[inline]
    pub fn unset(&mut self, i: usize) {
        debug_assert!(i < self.len, "slot {} out of bounds ({})", i, self.len);
        self.words[i / WORD_BITS] &= !(1u128 << (i % WORD_BITS));
    }

    #[inline]
    pub fn assign(&mut self, i: usize, value: bool) {
        if value {
            self.set(i);
        } else {
            self.unset(i);
        }
    }

    /// Grows or shrinks to `len` bits. New bits are unset.
    pub fn resize(&mut self, len: usize) {
        if len < self.len {
            self.truncate(len);
            return;
        }

        self.words.resize(len.div_ceil(WORD_BITS), 0);
        self.len = len;
    }

    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }

        self.words.truncate(len.div_ceil(WORD_BITS));

        // Keep bits past the end cleared so later growth starts unset
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u128 << tail) - 1;
            }
        }

        self.len = len;
    }

    /// Drops bits `[from, from + count)` and shifts the tail down.
    pub fn remove_range(&mut self, from: usize, count: usize) {
        if from >= self.len || count == 0 {
            return;
        }

        let count = count.min(self.len - from);
        for i in from..self.len - count {
            let bit = self.get(i + count);
            self.assign(i, bit);
        }

        self.truncate(self.len - count);
    }

    /// Clears every bit and resizes to `len`.
    pub fn reset(&mut self, len: usize) {
        self.words.clear();
        self.words.resize(len.div_ceil(WORD_BITS), 0);
        self.len = len;
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn words(&self) -> &[u128] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u128] {
        &mut self.words
    }

    /// Iterates set bits in ascending order, walking whole runs at a time.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let base = wi * WORD_BITS;
            let mut runs = Vec::new();
            let mut m = word;

            while m != 0 {
                let start = m.trailing_zeros();
                let run = (m >> start).trailing_ones();

                runs.push(base + start as usize..base + (start + run) as usize);

                let range_mask = if run == 128 {
                    u128::MAX
                } else {
                    ((1u128 << run) - 1) << start
                };
                m &= !range_mask;
            }

            runs.into_iter().flatten()
        })
    }
}

impl std::fmt::Debug for SlotMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotMask")
            .field("len", &self.len)
            .field("ones", &self.iter_ones().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_across_words() {
        let mut mask = SlotMask::with_len(300);
        mask.set(0);
        mask.set(127);
        mask.set(128);
        mask.set(299);

        assert!(mask.get(0));
        assert!(mask.get(127));
        assert!(mask.get(128));
        assert!(mask.get(299));
        assert!(!mask.get(1));
        assert!(!mask.get(300));
        assert_eq!(mask.count_ones(), 4);
        assert_eq!(mask.words().len(), 3);
    }

    #[test]
    fn test_iter_ones_runs() {
        let mut mask = SlotMask::with_len(260);
        // 0, 1, 2 and 6, 7, 8, plus a run spanning the word boundary
        for i in [0, 1, 2, 6, 7, 8, 126, 127, 128, 129] {
            mask.set(i);
        }

        let ones: Vec<usize> = mask.iter_ones().collect();
        assert_eq!(ones, vec![0, 1, 2, 6, 7, 8, 126, 127, 128, 129]);
    }

    #[test]
    fn test_full_word_run() {
        let mut mask = SlotMask::with_len(128);
        for i in 0..128 {
            mask.set(i);
        }
        assert_eq!(mask.iter_ones().count(), 128);
        assert_eq!(mask.words()[0], u128::MAX);
    }

    #[test]
    fn test_truncate_clears_tail() {
        let mut mask = SlotMask::with_len(10);
        mask.set(8);
        mask.set(3);

        mask.truncate(5);
        mask.resize(10);

        assert!(mask.get(3));
        assert!(!mask.get(8));
        assert_eq!(mask.len(), 10);
    }

    #[test]
    fn test_remove_range_shifts() {
        let mut mask = SlotMask::with_len(6);
        mask.set(0);
        mask.set(4);
        mask.set(5);

        mask.remove_range(1, 2);

        assert_eq!(mask.len(), 4);
        assert_eq!(mask.iter_ones().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn test_reset() {
        let mut mask = SlotMask::with_len(4);
        mask.set(1);
        mask.reset(200);
        assert_eq!(mask.len(), 200);
        assert_eq!(mask.count_ones(), 0);
    }
}
