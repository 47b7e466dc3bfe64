//! Slot batching for the parallel phases.
//!
//! A chunk is the unit of work handed to one task: [`CHUNK_SIZE`] consecutive
//! slots, which is also exactly one [`crate::mask::SlotMask`] word.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::mask::WORD_BITS;

pub const CHUNK_SIZE: usize = WORD_BITS;

/// The slot range assigned to one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u32,
    pub count: u32,
}

impl ChunkRange {
    pub fn slots(&self) -> std::ops::Range<u32> {
        self.start..self.start + self.count
    }

    pub fn end(&self) -> u32 {
        self.start + self.count
    }
}

pub fn chunk_count(slot_count: usize) -> usize {
    slot_count.div_ceil(CHUNK_SIZE)
}

/// Count and start index of chunk `index`, or `None` past the end.
pub fn chunk_at(slot_count: usize, index: usize) -> Option<ChunkRange> {
    if index * CHUNK_SIZE >= slot_count {
        return None;
    }

    Some(chunk_range(slot_count, index))
}

fn chunk_range(slot_count: usize, index: usize) -> ChunkRange {
    let start = index * CHUNK_SIZE;

    ChunkRange {
        index,
        start: start as u32,
        count: (slot_count - start).min(CHUNK_SIZE) as u32,
    }
}

pub fn chunks(slot_count: usize) -> impl Iterator<Item = ChunkRange> {
    (0..chunk_count(slot_count)).filter_map(move |i| chunk_at(slot_count, i))
}

/// Runs `f` once per chunk and returns the results in chunk order.
pub fn map_chunks<R, F>(slot_count: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ChunkRange) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..chunk_count(slot_count))
            .into_par_iter()
            .map(|i| f(chunk_range(slot_count, i)))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        chunks(slot_count).map(f).collect()
    }
}

/// Walks a dense value slice and its mask words chunk by chunk, handing each
/// task its own disjoint window of both.
pub fn for_each_chunk_mut<T, F>(values: &mut [T], words: &mut [u128], f: F)
where
    T: Send,
    F: Fn(ChunkRange, &mut [T], &mut u128) + Sync + Send,
{
    debug_assert!(
        words.len() >= chunk_count(values.len()),
        "mask has {} words for {} slots",
        words.len(),
        values.len()
    );

    let slot_count = values.len();

    #[cfg(feature = "parallel")]
    {
        values
            .par_chunks_mut(CHUNK_SIZE)
            .zip(words.par_iter_mut())
            .enumerate()
            .for_each(|(i, (values, word))| f(chunk_range(slot_count, i), values, word));
    }
    #[cfg(not(feature = "parallel"))]
    {
        values
            .chunks_mut(CHUNK_SIZE)
            .zip(words.iter_mut())
            .enumerate()
            .for_each(|(i, (values, word))| f(chunk_range(slot_count, i), values, word));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_at() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(128), 1);
        assert_eq!(chunk_count(129), 2);

        let last = chunk_at(300, 2).unwrap();
        assert_eq!(last.start, 256);
        assert_eq!(last.count, 44);
        assert_eq!(last.end(), 300);
        assert!(chunk_at(300, 3).is_none());
    }

    #[test]
    fn test_chunks_cover_all_slots() {
        let covered: u32 = chunks(1000).map(|c| c.count).sum();
        assert_eq!(covered, 1000);
    }

    #[test]
    fn test_map_chunks_keeps_order() {
        let starts = map_chunks(400, |c| c.start);
        assert_eq!(starts, vec![0, 128, 256, 384]);
    }

    #[test]
    fn test_for_each_chunk_mut_disjoint() {
        let mut values = vec![0u32; 300];
        let mut words = vec![0u128; 3];

        for_each_chunk_mut(&mut values, &mut words, |range, values, word| {
            for (i, v) in values.iter_mut().enumerate() {
                *v = range.start + i as u32;
            }
            *word = range.count as u128;
        });

        assert!(values.iter().enumerate().all(|(i, &v)| v == i as u32));
        assert_eq!(words, vec![128, 128, 44]);
    }
}
