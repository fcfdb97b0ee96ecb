//! Block and subtensor access protocol shared by every layout.
//!
//! # Overview
//!
//! Callers acquire a [`BlockDescriptor`] from a table or tensor, read or
//! modify its buffer, and release it:
//!
//! ```
//! use numtab::{HomogenTable, NumericTable, ReadWriteMode};
//!
//! let mut table = HomogenTable::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], 2, 2).unwrap();
//!
//! // Read rows 1..2 as f32: the table stores f64, so values are converted.
//! let block = table.get_block_of_rows::<f32>(1, 1).unwrap();
//! assert_eq!(block.as_slice(), &[3.0, 4.0]);
//! assert!(!block.is_zero_copy());
//! block.release().unwrap();
//!
//! // Modify column 0 through an i32 buffer; release converts it back.
//! let mut column = table
//!     .get_block_of_column_values_mut::<i32>(0, 0, 2, ReadWriteMode::ReadWrite)
//!     .unwrap();
//! column.as_mut_slice().unwrap()[1] = 30;
//! column.release().unwrap();
//! assert_eq!(table.read_rows::<f64>(1, 1).unwrap(), vec![30.0, 4.0]);
//! ```
//!
//! # Zero-copy and conversion
//!
//! When a layout stores the requested element type contiguously, the
//! descriptor borrows storage directly and release is a no-op. Otherwise
//! the descriptor owns a converted staging buffer; for write acquisitions
//! release converts it back into storage.
//!
//! Read acquisitions borrow the table shared, write acquisitions borrow it
//! exclusively, so one table cannot hand out overlapping writable blocks.
//! `release` consumes the descriptor, so each acquisition is released at
//! most once.

use std::fmt;
use std::ops::Deref;

use tracing::warn;

use crate::dictionary::DataDictionary;
use crate::dtype::{try_alloc, Element, NumericKind};
use crate::error::{check_index, Error, Result};

/// Access intent for a block acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadWriteMode {
    #[default]
    ReadOnly,
    /// Buffer contents are written back on release; initial contents of a
    /// converted buffer are unspecified (zero).
    WriteOnly,
    ReadWrite,
}

impl ReadWriteMode {
    #[inline]
    pub fn reads(self) -> bool {
        matches!(self, ReadWriteMode::ReadOnly | ReadWriteMode::ReadWrite)
    }

    #[inline]
    pub fn writes(self) -> bool {
        matches!(self, ReadWriteMode::WriteOnly | ReadWriteMode::ReadWrite)
    }
}

/// Write-back run by [`BlockDescriptor::release`] for converted buffers.
pub(crate) type Commit<'a, T> = Box<dyn FnOnce(&[T]) -> Result<()> + 'a>;

enum BlockData<'a, T> {
    View(&'a [T]),
    ViewMut(&'a mut [T]),
    Owned(Vec<T>),
}

/// A block of rows, one column's values, or a subtensor.
///
/// Values are laid out row-major: `n_rows * n_cols` elements. For column
/// blocks `n_cols` is 1; for subtensors `n_rows` is the count along the
/// varying dimension and `n_cols` the size of one slice below it.
pub struct BlockDescriptor<'a, T: Element> {
    data: BlockData<'a, T>,
    commit: Option<Commit<'a, T>>,
    n_rows: usize,
    n_cols: usize,
    mode: ReadWriteMode,
}

impl<'a, T: Element> BlockDescriptor<'a, T> {
    pub(crate) fn borrowed(values: &'a [T], n_rows: usize, n_cols: usize) -> Self {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        Self {
            data: BlockData::View(values),
            commit: None,
            n_rows,
            n_cols,
            mode: ReadWriteMode::ReadOnly,
        }
    }

    pub(crate) fn borrowed_mut(
        values: &'a mut [T],
        n_rows: usize,
        n_cols: usize,
        mode: ReadWriteMode,
    ) -> Self {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        Self {
            data: BlockData::ViewMut(values),
            commit: None,
            n_rows,
            n_cols,
            mode,
        }
    }

    pub(crate) fn owned(values: Vec<T>, n_rows: usize, n_cols: usize) -> Self {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        Self {
            data: BlockData::Owned(values),
            commit: None,
            n_rows,
            n_cols,
            mode: ReadWriteMode::ReadOnly,
        }
    }

    /// Converted buffer that is written back through `commit` on release.
    ///
    /// `commit` is dropped unused for read-only acquisitions.
    pub(crate) fn converted(
        values: Vec<T>,
        n_rows: usize,
        n_cols: usize,
        mode: ReadWriteMode,
        commit: Commit<'a, T>,
    ) -> Self {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        Self {
            data: BlockData::Owned(values),
            commit: mode.writes().then_some(commit),
            n_rows,
            n_cols,
            mode,
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn mode(&self) -> ReadWriteMode {
        self.mode
    }

    /// Element kind of the buffer.
    #[inline]
    pub fn kind(&self) -> NumericKind {
        T::KIND
    }

    /// Whether the buffer aliases the object's storage.
    pub fn is_zero_copy(&self) -> bool {
        !matches!(self.data, BlockData::Owned(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.data {
            BlockData::View(values) => *values,
            BlockData::ViewMut(values) => &values[..],
            BlockData::Owned(values) => values.as_slice(),
        }
    }

    /// Mutable access to the buffer.
    ///
    /// Fails with [`Error::IllegalState`] for read-only acquisitions.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        if !self.mode.writes() {
            return Err(Error::IllegalState("block was acquired read-only"));
        }
        match &mut self.data {
            BlockData::View(_) => Err(Error::IllegalState("block was acquired read-only")),
            BlockData::ViewMut(values) => Ok(&mut values[..]),
            BlockData::Owned(values) => Ok(values.as_mut_slice()),
        }
    }

    /// Row `i` of the block.
    pub fn row(&self, i: usize) -> Result<&[T]> {
        check_index("block row", i, self.n_rows)?;
        let start = i * self.n_cols;
        Ok(&self.as_slice()[start..start + self.n_cols])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// End the acquisition.
    ///
    /// Converted buffers of write acquisitions are converted back into the
    /// object's storage; everything else is a no-op.
    pub fn release(mut self) -> Result<()> {
        match self.commit.take() {
            Some(commit) => commit(self.as_slice()),
            None => Ok(()),
        }
    }

    /// End the acquisition without writing anything back.
    ///
    /// Writes made through a zero-copy view are already in storage.
    pub fn abandon(mut self) {
        self.commit = None;
    }
}

impl<T: Element> Deref for BlockDescriptor<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> fmt::Debug for BlockDescriptor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("kind", &T::KIND)
            .field("n_rows", &self.n_rows)
            .field("n_cols", &self.n_cols)
            .field("mode", &self.mode)
            .field("zero_copy", &self.is_zero_copy())
            .finish()
    }
}

impl<T: Element> Drop for BlockDescriptor<'_, T> {
    fn drop(&mut self) {
        if self.commit.is_some() {
            warn!(
                kind = %T::KIND,
                rows = self.n_rows,
                cols = self.n_cols,
                "write block dropped without release; pending writes discarded"
            );
        }
    }
}

/// Allocate a staging buffer, filling it through `fill` when `mode` reads.
pub(crate) fn staging<T: Element>(
    len: usize,
    mode: ReadWriteMode,
    fill: impl FnOnce(&mut [T]),
) -> Result<Vec<T>> {
    let mut values = try_alloc(len)?;
    if mode.reads() {
        fill(&mut values);
    }
    Ok(values)
}

// =============================================================================
// Capability traits
// =============================================================================

/// Uniform block access to a 2-D numeric table.
///
/// Implemented by every table layout and by [`Table`](crate::Table), which
/// dispatches to the concrete layout.
pub trait NumericTable {
    fn n_rows(&self) -> usize;

    fn n_columns(&self) -> usize;

    /// Per-column descriptors.
    fn dictionary(&self) -> &DataDictionary;

    /// Storage kind shared by every column, `None` for mixed-kind tables.
    fn numeric_kind(&self) -> Option<NumericKind>;

    fn n_elements(&self) -> usize {
        self.n_rows() * self.n_columns()
    }

    /// Rows `[start, start + count)` in row-major order.
    fn get_block_of_rows<T: Element>(&self, start: usize, count: usize)
        -> Result<BlockDescriptor<'_, T>>;

    /// Writable rows `[start, start + count)`.
    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>>;

    /// Values of column `feature` for rows `[start, start + count)`.
    fn get_block_of_column_values<T: Element>(
        &self,
        feature: usize,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>>;

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        feature: usize,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>>;

    /// Set every element to `value`, converted per column kind.
    fn assign<T: Element>(&mut self, value: T) -> Result<()>;

    /// Copy rows out as an owned vector.
    fn read_rows<T: Element>(&self, start: usize, count: usize) -> Result<Vec<T>> {
        let block = self.get_block_of_rows::<T>(start, count)?;
        let values = block.to_vec();
        block.release()?;
        Ok(values)
    }

    /// Copy one column's values out as an owned vector.
    fn read_column<T: Element>(&self, feature: usize, start: usize, count: usize) -> Result<Vec<T>> {
        let block = self.get_block_of_column_values::<T>(feature, start, count)?;
        let values = block.to_vec();
        block.release()?;
        Ok(values)
    }
}

/// Uniform subtensor access to an N-D numeric array.
pub trait NumericTensor {
    fn dims(&self) -> &[usize];

    fn numeric_kind(&self) -> NumericKind;

    fn n_dims(&self) -> usize {
        self.dims().len()
    }

    fn n_elements(&self) -> usize {
        self.dims().iter().product()
    }

    /// Subtensor with the leading dimensions pinned to `fixed_dims` and
    /// dimension `fixed_dims.len()` ranging over `[start, start + count)`.
    fn get_subtensor<T: Element>(
        &self,
        fixed_dims: &[usize],
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>>;

    fn get_subtensor_mut<T: Element>(
        &mut self,
        fixed_dims: &[usize],
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>>;

    fn assign<T: Element>(&mut self, value: T) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn modes() {
        assert!(ReadWriteMode::ReadOnly.reads());
        assert!(!ReadWriteMode::ReadOnly.writes());
        assert!(!ReadWriteMode::WriteOnly.reads());
        assert!(ReadWriteMode::ReadWrite.reads() && ReadWriteMode::ReadWrite.writes());
    }

    #[test]
    fn read_only_block_rejects_mutation() {
        let values = [1i32, 2, 3, 4];
        let mut block = BlockDescriptor::borrowed(&values, 2, 2);
        assert!(block.is_zero_copy());
        assert_eq!(block.row(1).unwrap(), &[3, 4]);
        assert!(matches!(block.row(2), Err(Error::OutOfRange { index: 2, bound: 2, .. })));
        assert!(matches!(block.as_mut_slice(), Err(Error::IllegalState(_))));
        block.release().unwrap();
    }

    #[test]
    fn converted_block_commits_once_on_release() {
        let sink = RefCell::new(Vec::new());
        let mut block = BlockDescriptor::converted(
            vec![0.0f32; 2],
            1,
            2,
            ReadWriteMode::WriteOnly,
            Box::new(|values: &[f32]| {
                sink.borrow_mut().extend_from_slice(values);
                Ok(())
            }),
        );
        block.as_mut_slice().unwrap().copy_from_slice(&[1.5, 2.5]);
        block.release().unwrap();
        assert_eq!(*sink.borrow(), vec![1.5, 2.5]);
    }

    #[test]
    fn abandoned_block_does_not_commit() {
        let sink = RefCell::new(0usize);
        let block = BlockDescriptor::converted(
            vec![0i64; 3],
            3,
            1,
            ReadWriteMode::ReadWrite,
            Box::new(|_: &[i64]| {
                *sink.borrow_mut() += 1;
                Ok(())
            }),
        );
        block.abandon();
        assert_eq!(*sink.borrow(), 0);
    }

    #[test]
    fn read_only_conversion_drops_commit() {
        let block = BlockDescriptor::converted(
            vec![1.0f64],
            1,
            1,
            ReadWriteMode::ReadOnly,
            Box::new(|_: &[f64]| Err(Error::IllegalState("must not run"))),
        );
        assert!(block.release().is_ok());
    }

    #[test]
    fn staging_skips_fill_for_write_only() {
        let filled = staging::<i32>(3, ReadWriteMode::WriteOnly, |v| v.fill(9)).unwrap();
        assert_eq!(filled, vec![0, 0, 0]);
        let filled = staging::<i32>(3, ReadWriteMode::ReadWrite, |v| v.fill(9)).unwrap();
        assert_eq!(filled, vec![9, 9, 9]);
    }
}
