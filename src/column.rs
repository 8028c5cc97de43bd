//! Column stitching primitives.
//!
//! A round of the stitching sort materializes the selected raw columns next
//! to a row id ("stitching"), sorts the resulting fixed-width tuples, and
//! reads back the permutation together with the runs of still-equal keys
//! ("groups") that the next round has to break.
//!
//! Tuples are compared by the raw bytes of their key words, exactly as
//! `memcmp` would see them in memory. Group boundary detection uses the same
//! byte view, so the sort order and the grouping always agree. Note that on
//! little-endian hosts this order is not numeric order on the individual
//! keys; it is the contract of the whole pipeline.

use std::cmp::Ordering;

use crate::error::StitchError;

/// A raw table column: one 32-bit value per row, indexed by row id.
pub type RawColumn = Vec<u32>;

/// Widest tuple the sort dispatch specializes for.
pub const MAX_COMPARE_FACTOR: usize = 8;

/// A contiguous run of rows whose keys examined so far are all equal.
///
/// `start` and `length` index into the current permutation, not into the
/// original row order. A group of length 1 is resolved: no later round can
/// move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortingGroup {
    pub start: usize,
    pub length: usize,
}

/// Output of one round: the permutation of row ids produced so far plus the
/// groups a later round still has to refine.
#[derive(Debug, Clone, Default)]
pub struct SortingState {
    pub indices: Vec<u32>,
    pub groups: Vec<SortingGroup>,
}

impl SortingState {
    /// The identity permutation over `row_count` rows, with no groups.
    pub fn identity(row_count: usize) -> Self {
        SortingState {
            indices: (0..row_count as u32).collect(),
            groups: Vec::new(),
        }
    }
}

/// Fixed-width working tuple: one row id word followed by `W` key words.
///
/// Layout-compatible with `W + 1` consecutive `u32`s of the word buffer, so a
/// `StitchedColumn` can expose its buffer as a tuple slice for sorting.
#[derive(Clone, Copy)]
#[repr(C)]
struct Tuple<const W: usize> {
    row_id: u32,
    keys: [u32; W],
}

impl<const W: usize> Tuple<W> {
    /// Compare the key words the way `memcmp` compares their in-memory bytes.
    ///
    /// Each word is compared via its native-endian byte representation; the
    /// first differing word decides. With `W` known at compile time the loop
    /// unrolls into a fixed-size compare.
    #[inline]
    fn key_cmp(&self, other: &Self) -> Ordering {
        for k in 0..W {
            let ord = self.keys[k]
                .to_ne_bytes()
                .cmp(&other.keys[k].to_ne_bytes());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sort order: key bytes, then row id. The row id tie-break keeps the
    /// permutation deterministic, so plans with the same flattened column
    /// sequence produce identical output even when full keys collide.
    #[inline]
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
            .then_with(|| self.row_id.cmp(&other.row_id))
    }
}

/// The working set of one sorting round.
///
/// Owns a contiguous buffer of `num_values` tuples, each `compare_factor + 1`
/// words wide: the row id followed by the key words in stitch order. Cloning
/// duplicates the buffer; moving transfers it.
#[derive(Clone)]
pub struct StitchedColumn {
    data: Vec<u32>,
    num_values: usize,
    compare_factor: usize,
}

impl Default for StitchedColumn {
    fn default() -> Self {
        StitchedColumn {
            data: Vec::new(),
            num_values: 0,
            compare_factor: 1,
        }
    }
}

impl StitchedColumn {
    /// Materialize `(row_id, cols[0][row_id], .., cols[W-1][row_id])` tuples
    /// for every row id in `indices`, in `indices` order.
    ///
    /// Empty `cols` or empty `indices` yield the empty column. Row ids are
    /// not bounds-checked against the column lengths; the executor only ever
    /// passes permutations drawn from the shared row count.
    pub fn stitch(cols: &[&RawColumn], indices: &[u32]) -> Self {
        if cols.is_empty() || indices.is_empty() {
            return Self::default();
        }
        let compare_factor = cols.len();
        let num_values = indices.len();

        let mut data = Vec::with_capacity(num_values * (compare_factor + 1));
        for &row_id in indices {
            data.push(row_id);
            for col in cols {
                data.push(col[row_id as usize]);
            }
        }

        StitchedColumn {
            data,
            num_values,
            compare_factor,
        }
    }

    /// Number of tuples.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Number of key words per tuple.
    pub fn compare_factor(&self) -> usize {
        self.compare_factor
    }

    /// Length of the backing buffer in 32-bit words.
    pub fn word_count(&self) -> usize {
        self.data.len()
    }

    /// Sort all tuples by their key bytes.
    pub fn sort(&mut self) -> Result<(), StitchError> {
        match self.compare_factor {
            1 => self.sort_all::<1>(),
            2 => self.sort_all::<2>(),
            3 => self.sort_all::<3>(),
            4 => self.sort_all::<4>(),
            5 => self.sort_all::<5>(),
            6 => self.sort_all::<6>(),
            7 => self.sort_all::<7>(),
            8 => self.sort_all::<8>(),
            w => return Err(StitchError::UnsupportedWidth(w)),
        }
        Ok(())
    }

    /// Sort tuples by their key bytes within each group slice, leaving tuples
    /// in different groups where they are. Length-1 groups are skipped.
    pub fn sort_within(&mut self, groups: &[SortingGroup]) -> Result<(), StitchError> {
        match self.compare_factor {
            1 => self.sort_groups::<1>(groups),
            2 => self.sort_groups::<2>(groups),
            3 => self.sort_groups::<3>(groups),
            4 => self.sort_groups::<4>(groups),
            5 => self.sort_groups::<5>(groups),
            6 => self.sort_groups::<6>(groups),
            7 => self.sort_groups::<7>(groups),
            8 => self.sort_groups::<8>(groups),
            w => return Err(StitchError::UnsupportedWidth(w)),
        }
        Ok(())
    }

    fn sort_all<const W: usize>(&mut self) {
        self.tuples_mut::<W>().sort_unstable_by(Tuple::sort_cmp);
    }

    fn sort_groups<const W: usize>(&mut self, groups: &[SortingGroup]) {
        let tuples = self.tuples_mut::<W>();
        for group in groups {
            if group.length <= 1 {
                continue;
            }
            tuples[group.start..group.start + group.length].sort_unstable_by(Tuple::sort_cmp);
        }
    }

    /// View the word buffer as a slice of `W`-key tuples.
    fn tuples_mut<const W: usize>(&mut self) -> &mut [Tuple<W>] {
        debug_assert_eq!(W, self.compare_factor);
        debug_assert_eq!(self.data.len(), self.num_values * (W + 1));
        // SAFETY: Tuple<W> is repr(C) with W + 1 u32 fields and no padding,
        // and the buffer holds exactly num_values * (W + 1) words.
        unsafe {
            std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut Tuple<W>, self.num_values)
        }
    }

    #[inline]
    fn row_id(&self, i: usize) -> u32 {
        self.data[i * (self.compare_factor + 1)]
    }

    /// Key words of tuple `i`. Word equality equals byte equality, so group
    /// boundary detection can compare these slices directly.
    #[inline]
    fn keys(&self, i: usize) -> &[u32] {
        let stride = self.compare_factor + 1;
        &self.data[i * stride + 1..(i + 1) * stride]
    }

    /// Read back only the permutation, discarding group boundaries. Used on
    /// the last round, where no further refinement happens.
    pub fn indices_only(&self) -> Vec<u32> {
        self.data
            .chunks_exact(self.compare_factor + 1)
            .map(|tuple| tuple[0])
            .collect()
    }

    /// Read back the permutation and the maximal runs of equal keys, with no
    /// prior grouping: a boundary is emitted wherever adjacent tuples differ.
    /// The returned groups tile `[0, num_values)` exactly.
    pub fn groups_and_indices(&self) -> SortingState {
        let n = self.num_values;
        let mut state = SortingState {
            indices: Vec::with_capacity(n),
            groups: Vec::new(),
        };
        if n == 0 {
            return state;
        }

        let mut start = 0;
        for i in 0..n - 1 {
            state.indices.push(self.row_id(i));
            if self.keys(i) != self.keys(i + 1) {
                state.groups.push(SortingGroup {
                    start,
                    length: i - start + 1,
                });
                start = i + 1;
            }
        }
        state.indices.push(self.row_id(n - 1));
        state.groups.push(SortingGroup {
            start,
            length: n - start,
        });
        state
    }

    /// Read back the permutation and subdivide each input group wherever
    /// adjacent tuples inside it differ. Singleton input groups pass through
    /// without a key compare.
    ///
    /// The output partition is a refinement of `groups`: every output group
    /// lies wholly inside one input group, and the tiling of
    /// `[0, num_values)` is preserved. Boundaries between input groups are
    /// never crossed, even when the tuples on both sides happen to carry
    /// equal keys in this round.
    pub fn refine_groups(&self, groups: &[SortingGroup]) -> SortingState {
        let mut state = SortingState {
            indices: Vec::with_capacity(self.num_values),
            groups: Vec::new(),
        };

        for group in groups {
            if group.length == 1 {
                state.indices.push(self.row_id(group.start));
                state.groups.push(*group);
                continue;
            }

            let end = group.start + group.length;
            let mut start = group.start;
            for i in group.start..end - 1 {
                state.indices.push(self.row_id(i));
                if self.keys(i) != self.keys(i + 1) {
                    state.groups.push(SortingGroup {
                        start,
                        length: i - start + 1,
                    });
                    start = i + 1;
                }
            }
            state.indices.push(self.row_id(end - 1));
            state.groups.push(SortingGroup {
                start,
                length: end - start,
            });
        }
        state
    }
}
