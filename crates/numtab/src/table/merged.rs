//! Composite tables: logical concatenation of owned tables by rows
//! ([`RowMergedTable`]) or by columns ([`MergedTable`]).
//!
//! A global row (or column) maps to a component table and a local index
//! through prefix sums over component sizes. Block requests spanning
//! several components acquire one sub-block per component, assemble the
//! result in global order, and release every sub-block before returning.
//! Write blocks keep their sub-blocks until release, then scatter the
//! buffer back and release each sub-block; the first error wins.

use tracing::debug;

use crate::access::{BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::DataDictionary;
use crate::dtype::{try_alloc, Element, NumericKind};
use crate::error::{check_index, check_range, Error, Result};
use crate::table::Table;

/// Part of a global range that falls into one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    table: usize,
    local: usize,
    len: usize,
}

/// Prefix sums of component sizes; `offsets[i]` is the first global index
/// of component `i`, the last entry is the total.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Offsets(Vec<usize>);

impl Default for Offsets {
    fn default() -> Self {
        Self(vec![0])
    }
}

impl Offsets {
    fn total(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    fn push(&mut self, size: usize) {
        let total = self.total();
        self.0.push(total + size);
    }

    /// Component and local index of global index `index`.
    fn locate(&self, index: usize) -> (usize, usize) {
        let table = self.0.partition_point(|&o| o <= index) - 1;
        (table, index - self.0[table])
    }

    /// Split `[start, start + count)` into per-component segments.
    ///
    /// The range must lie within the total.
    fn segments(&self, start: usize, count: usize) -> Vec<Segment> {
        let mut out = Vec::new();
        if count == 0 {
            return out;
        }
        let end = start + count;
        let (mut table, _) = self.locate(start);
        let mut pos = start;
        while pos < end {
            let take = (self.0[table + 1] - pos).min(end - pos);
            if take > 0 {
                out.push(Segment {
                    table,
                    local: pos - self.0[table],
                    len: take,
                });
            }
            pos += take;
            table += 1;
        }
        out
    }
}

/// Numeric kind shared by every component, if any.
fn shared_kind(tables: &[Table]) -> Option<NumericKind> {
    let mut kinds = tables.iter().map(Table::numeric_kind);
    let first = kinds.next()??;
    kinds.all(|k| k == Some(first)).then_some(first)
}

/// Empty write block for zero-length requests.
fn empty_block<'a, T: Element>(n_cols: usize, mode: ReadWriteMode) -> BlockDescriptor<'a, T> {
    BlockDescriptor::converted(Vec::new(), 0, n_cols, mode, Box::new(|_: &[T]| Ok(())))
}

/// Release every sub-block, keeping the first error.
fn release_all<T: Element>(blocks: Vec<BlockDescriptor<'_, T>>) -> Result<()> {
    let mut first = None;
    for block in blocks {
        if let Err(err) = block.release() {
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

fn abandon_all<T: Element>(blocks: Vec<BlockDescriptor<'_, T>>) {
    for block in blocks {
        block.abandon();
    }
}

/// Acquire one writable block per segment from the segment's own component.
///
/// Segments are ordered by component and skip empty components. On failure
/// the blocks acquired so far are abandoned.
fn acquire_segments<'a, T: Element>(
    tables: &'a mut [Table],
    segments: &[Segment],
    mut acquire: impl FnMut(&'a mut Table, &Segment) -> Result<BlockDescriptor<'a, T>>,
) -> Result<Vec<BlockDescriptor<'a, T>>> {
    let selected = tables
        .iter_mut()
        .enumerate()
        .filter(|(i, _)| segments.binary_search_by_key(i, |s| s.table).is_ok())
        .map(|(_, table)| table);
    let mut blocks = Vec::with_capacity(segments.len());
    for (table, seg) in selected.zip(segments) {
        match acquire(table, seg) {
            Ok(block) => blocks.push(block),
            Err(err) => {
                abandon_all(blocks);
                return Err(err);
            }
        }
    }
    Ok(blocks)
}

// =============================================================================
// RowMergedTable
// =============================================================================

/// Tables stacked vertically; every component has the same column count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowMergedTable {
    tables: Vec<Table>,
    offsets: Offsets,
    dictionary: DataDictionary,
}

impl RowMergedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from components, failing on the first column count mismatch.
    pub fn from_tables(tables: Vec<Table>) -> Result<Self> {
        let mut merged = Self::new();
        for table in tables {
            merged.add_table(table)?;
        }
        Ok(merged)
    }

    /// Append a component below the existing rows.
    ///
    /// The first component fixes the column count and the dictionary. A
    /// table with a different column count is rejected and nothing is
    /// added.
    pub fn add_table(&mut self, table: impl Into<Table>) -> Result<()> {
        let table = table.into();
        if self.tables.is_empty() {
            self.dictionary = table.dictionary().clone();
        } else if table.n_columns() != self.dictionary.len() {
            debug!(
                expected = self.dictionary.len(),
                actual = table.n_columns(),
                "row-merged table rejected component"
            );
            return Err(Error::mismatch(
                "column count",
                self.dictionary.len(),
                table.n_columns(),
            ));
        }
        debug!(
            index = self.tables.len(),
            rows = table.n_rows(),
            layout = ?table.layout(),
            "row-merged table added component"
        );
        self.offsets.push(table.n_rows());
        self.tables.push(table);
        Ok(())
    }

    pub fn n_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }

    /// Component index and local row of global row `row`.
    pub fn locate_row(&self, row: usize) -> Result<(usize, usize)> {
        check_index("row", row, self.offsets.total())?;
        Ok(self.offsets.locate(row))
    }
}

impl NumericTable for RowMergedTable {
    fn n_rows(&self) -> usize {
        self.offsets.total()
    }

    fn n_columns(&self) -> usize {
        self.dictionary.len()
    }

    fn dictionary(&self) -> &DataDictionary {
        &self.dictionary
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        shared_kind(&self.tables)
    }

    fn get_block_of_rows<T: Element>(
        &self,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows())?;
        let n_cols = self.n_columns();
        let segments = self.offsets.segments(start, count);
        if let [seg] = segments.as_slice() {
            return self.tables[seg.table].get_block_of_rows(seg.local, seg.len);
        }
        let mut values = try_alloc(count * n_cols)?;
        let mut pos = 0;
        for seg in segments {
            let block = self.tables[seg.table].get_block_of_rows::<T>(seg.local, seg.len)?;
            values[pos..pos + block.len()].copy_from_slice(block.as_slice());
            pos += block.len();
            block.release()?;
        }
        Ok(BlockDescriptor::owned(values, count, n_cols))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows())?;
        let n_cols = self.n_columns();
        let segments = self.offsets.segments(start, count);
        match segments.as_slice() {
            [] => return Ok(empty_block(n_cols, mode)),
            [seg] => return self.tables[seg.table].get_block_of_rows_mut(seg.local, seg.len, mode),
            _ => {}
        }

        let mut values = try_alloc(count * n_cols)?;
        let mut blocks = acquire_segments(&mut self.tables, &segments, |table, seg| {
            table.get_block_of_rows_mut::<T>(seg.local, seg.len, mode)
        })?;
        if mode.reads() {
            let mut pos = 0;
            for block in &blocks {
                values[pos..pos + block.len()].copy_from_slice(block.as_slice());
                pos += block.len();
            }
        }
        Ok(BlockDescriptor::converted(
            values,
            count,
            n_cols,
            mode,
            Box::new(move |src: &[T]| {
                let mut pos = 0;
                for block in blocks.iter_mut() {
                    let len = block.len();
                    block.as_mut_slice()?.copy_from_slice(&src[pos..pos + len]);
                    pos += len;
                }
                release_all(blocks)
            }),
        ))
    }

    fn get_block_of_column_values<T: Element>(
        &self,
        feature: usize,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_index("column", feature, self.n_columns())?;
        check_range("row", start, count, self.n_rows())?;
        let segments = self.offsets.segments(start, count);
        if let [seg] = segments.as_slice() {
            return self.tables[seg.table].get_block_of_column_values(feature, seg.local, seg.len);
        }
        let mut values = try_alloc(count)?;
        let mut pos = 0;
        for seg in segments {
            let block = self.tables[seg.table]
                .get_block_of_column_values::<T>(feature, seg.local, seg.len)?;
            values[pos..pos + seg.len].copy_from_slice(block.as_slice());
            pos += seg.len;
            block.release()?;
        }
        Ok(BlockDescriptor::owned(values, count, 1))
    }

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        feature: usize,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_index("column", feature, self.n_columns())?;
        check_range("row", start, count, self.n_rows())?;
        let segments = self.offsets.segments(start, count);
        match segments.as_slice() {
            [] => return Ok(empty_block(1, mode)),
            [seg] => {
                return self.tables[seg.table]
                    .get_block_of_column_values_mut(feature, seg.local, seg.len, mode)
            }
            _ => {}
        }

        let mut values = try_alloc(count)?;
        let mut blocks = acquire_segments(&mut self.tables, &segments, |table, seg| {
            table.get_block_of_column_values_mut::<T>(feature, seg.local, seg.len, mode)
        })?;
        if mode.reads() {
            let mut pos = 0;
            for block in &blocks {
                values[pos..pos + block.len()].copy_from_slice(block.as_slice());
                pos += block.len();
            }
        }
        Ok(BlockDescriptor::converted(
            values,
            count,
            1,
            mode,
            Box::new(move |src: &[T]| {
                let mut pos = 0;
                for block in blocks.iter_mut() {
                    let len = block.len();
                    block.as_mut_slice()?.copy_from_slice(&src[pos..pos + len]);
                    pos += len;
                }
                release_all(blocks)
            }),
        ))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        self.tables.iter_mut().try_for_each(|t| t.assign(value))
    }
}

// =============================================================================
// MergedTable
// =============================================================================

/// Tables placed side by side; every component has the same row count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedTable {
    tables: Vec<Table>,
    offsets: Offsets,
    n_rows: usize,
    dictionary: DataDictionary,
}

impl MergedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from components, failing on the first row count mismatch.
    pub fn from_tables(tables: Vec<Table>) -> Result<Self> {
        let mut merged = Self::new();
        for table in tables {
            merged.add_table(table)?;
        }
        Ok(merged)
    }

    /// Append a component to the right of the existing columns.
    ///
    /// The first component fixes the row count; a table with a different
    /// row count is rejected and nothing is added. The dictionary grows by
    /// the component's descriptors.
    pub fn add_table(&mut self, table: impl Into<Table>) -> Result<()> {
        let table = table.into();
        if self.tables.is_empty() {
            self.n_rows = table.n_rows();
        } else if table.n_rows() != self.n_rows {
            debug!(
                expected = self.n_rows,
                actual = table.n_rows(),
                "column-merged table rejected component"
            );
            return Err(Error::mismatch("row count", self.n_rows, table.n_rows()));
        }
        debug!(
            index = self.tables.len(),
            columns = table.n_columns(),
            layout = ?table.layout(),
            "column-merged table added component"
        );
        self.dictionary.extend_from(table.dictionary());
        self.offsets.push(table.n_columns());
        self.tables.push(table);
        Ok(())
    }

    pub fn n_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }

    /// Component index and local column of global column `column`.
    pub fn locate_column(&self, column: usize) -> Result<(usize, usize)> {
        check_index("column", column, self.offsets.total())?;
        Ok(self.offsets.locate(column))
    }
}

impl NumericTable for MergedTable {
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_columns(&self) -> usize {
        self.offsets.total()
    }

    fn dictionary(&self) -> &DataDictionary {
        &self.dictionary
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        shared_kind(&self.tables)
    }

    fn get_block_of_rows<T: Element>(
        &self,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        if let [table] = self.tables.as_slice() {
            return table.get_block_of_rows(start, count);
        }
        let n_cols = self.n_columns();
        let mut values = try_alloc(count * n_cols)?;
        for (t, table) in self.tables.iter().enumerate() {
            let block = table.get_block_of_rows::<T>(start, count)?;
            interleave(&mut values, n_cols, self.offsets.0[t], &block);
            block.release()?;
        }
        Ok(BlockDescriptor::owned(values, count, n_cols))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        let n_cols = self.n_columns();
        match self.tables.len() {
            0 => return Ok(empty_block(n_cols, mode)),
            1 => return self.tables[0].get_block_of_rows_mut(start, count, mode),
            _ => {}
        }

        let offsets = &self.offsets;
        let mut blocks = Vec::with_capacity(self.tables.len());
        for table in self.tables.iter_mut() {
            match table.get_block_of_rows_mut::<T>(start, count, mode) {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    abandon_all(blocks);
                    return Err(err);
                }
            }
        }

        let mut values = try_alloc(count * n_cols)?;
        if mode.reads() {
            for (t, block) in blocks.iter().enumerate() {
                interleave(&mut values, n_cols, offsets.0[t], block);
            }
        }
        Ok(BlockDescriptor::converted(
            values,
            count,
            n_cols,
            mode,
            Box::new(move |src: &[T]| {
                for (t, block) in blocks.iter_mut().enumerate() {
                    let width = block.n_cols();
                    let at = offsets.0[t];
                    let dst = block.as_mut_slice()?;
                    for (i, row) in dst.chunks_exact_mut(width.max(1)).enumerate() {
                        row.copy_from_slice(&src[i * n_cols + at..i * n_cols + at + width]);
                    }
                }
                release_all(blocks)
            }),
        ))
    }

    fn get_block_of_column_values<T: Element>(
        &self,
        feature: usize,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        let (t, local) = self.locate_column(feature)?;
        self.tables[t].get_block_of_column_values(local, start, count)
    }

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        feature: usize,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        let (t, local) = self.locate_column(feature)?;
        self.tables[t].get_block_of_column_values_mut(local, start, count, mode)
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        self.tables.iter_mut().try_for_each(|t| t.assign(value))
    }
}

/// Copy each row of `block` into columns `[at, at + width)` of `dst`.
fn interleave<T: Element>(dst: &mut [T], n_cols: usize, at: usize, block: &BlockDescriptor<'_, T>) {
    let width = block.n_cols();
    if width == 0 {
        return;
    }
    let rows = dst.chunks_exact_mut(n_cols).zip(block.as_slice().chunks_exact(width));
    for (dst_row, src_row) in rows {
        dst_row[at..at + width].copy_from_slice(src_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{HomogenTable, SoaTable};
    use crate::NumericBuffer;
    use rstest::rstest;

    fn rows(n_rows: usize, first: i32) -> HomogenTable {
        let values: Vec<i32> = (0..n_rows as i32 * 2).map(|v| first + v).collect();
        HomogenTable::from_vec(values, n_rows, 2).unwrap()
    }

    #[test]
    fn segments_skip_empty_components() {
        let mut offsets = Offsets::default();
        for size in [3, 0, 5, 2] {
            offsets.push(size);
        }
        assert_eq!(offsets.total(), 10);
        assert_eq!(offsets.locate(3), (2, 0));
        assert_eq!(
            offsets.segments(2, 7),
            vec![
                Segment { table: 0, local: 2, len: 1 },
                Segment { table: 2, local: 0, len: 5 },
                Segment { table: 3, local: 0, len: 1 },
            ]
        );
        assert!(offsets.segments(4, 0).is_empty());
    }

    #[test]
    fn row_merged_single_segment_delegates() {
        let merged = RowMergedTable::from_tables(vec![rows(3, 0).into(), rows(2, 100).into()]).unwrap();
        let block = merged.get_block_of_rows::<i32>(3, 2).unwrap();
        assert!(block.is_zero_copy());
        assert_eq!(block.as_slice(), &[100, 101, 102, 103]);
    }

    #[test]
    fn row_merged_write_spans_components() {
        let mut merged = RowMergedTable::from_tables(vec![rows(2, 0).into(), rows(2, 10).into()]).unwrap();
        let mut block = merged
            .get_block_of_rows_mut::<f64>(1, 2, ReadWriteMode::ReadWrite)
            .unwrap();
        assert_eq!(block.as_slice(), &[2.0, 3.0, 10.0, 11.0]);
        for v in block.as_mut_slice().unwrap() {
            *v = -*v;
        }
        block.release().unwrap();
        assert_eq!(
            merged.read_rows::<i32>(0, 4).unwrap(),
            vec![0, 1, -2, -3, -10, -11, 12, 13]
        );
    }

    /// Components with `sizes` rows; component `i` holds `100 * i + k`.
    fn stacked(sizes: &[usize]) -> RowMergedTable {
        let tables = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| rows(n, 100 * i as i32).into())
            .collect();
        RowMergedTable::from_tables(tables).unwrap()
    }

    #[rstest]
    #[case(&[2, 0, 2], 1, 2)]
    #[case(&[0, 2, 0, 0, 2], 0, 4)]
    #[case(&[3, 0, 5, 2], 2, 7)]
    fn row_merged_write_skips_empty_components(
        #[case] sizes: &[usize],
        #[case] start: usize,
        #[case] count: usize,
    ) {
        let mut merged = stacked(sizes);
        let before = merged.read_rows::<i32>(0, merged.n_rows()).unwrap();

        let mut block = merged
            .get_block_of_rows_mut::<i32>(start, count, ReadWriteMode::ReadWrite)
            .unwrap();
        assert_eq!(block.as_slice(), &before[start * 2..(start + count) * 2]);
        for v in block.as_mut_slice().unwrap() {
            *v = -*v - 1;
        }
        block.release().unwrap();

        let mut expected = before.clone();
        for v in &mut expected[start * 2..(start + count) * 2] {
            *v = -*v - 1;
        }
        assert_eq!(merged.read_rows::<i32>(0, merged.n_rows()).unwrap(), expected);

        let mut column = merged
            .get_block_of_column_values_mut::<i64>(1, start, count, ReadWriteMode::WriteOnly)
            .unwrap();
        column.as_mut_slice().unwrap().fill(9);
        column.release().unwrap();
        for row in start..start + count {
            expected[row * 2 + 1] = 9;
        }
        assert_eq!(merged.read_rows::<i32>(0, merged.n_rows()).unwrap(), expected);
    }

    #[test]
    fn row_merged_column_values() {
        let mut merged = RowMergedTable::from_tables(vec![rows(2, 0).into(), rows(2, 10).into()]).unwrap();
        assert_eq!(merged.read_column::<i64>(1, 0, 4).unwrap(), vec![1, 3, 11, 13]);
        let mut block = merged
            .get_block_of_column_values_mut::<i32>(0, 1, 2, ReadWriteMode::WriteOnly)
            .unwrap();
        block.as_mut_slice().unwrap().copy_from_slice(&[7, 8]);
        block.release().unwrap();
        assert_eq!(merged.read_column::<i32>(0, 0, 4).unwrap(), vec![0, 7, 8, 12]);
    }

    #[test]
    fn row_merged_rejects_column_mismatch() {
        let mut merged = RowMergedTable::new();
        merged.add_table(rows(2, 0)).unwrap();
        let narrow = HomogenTable::from_vec(vec![1.0f32, 2.0], 2, 1).unwrap();
        let err = merged.add_table(narrow).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1, .. }));
        assert_eq!(merged.n_tables(), 1);
        assert_eq!(merged.n_rows(), 2);
    }

    #[test]
    fn row_merged_out_of_range() {
        let merged = RowMergedTable::from_tables(vec![rows(2, 0).into()]).unwrap();
        assert!(matches!(
            merged.get_block_of_rows::<f64>(1, 2),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(merged.locate_row(2), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn column_merged_interleaves_rows() {
        let soa = SoaTable::from_columns(vec![NumericBuffer::from(vec![0.5f32, 1.5])]).unwrap();
        let merged = MergedTable::from_tables(vec![rows(2, 0).into(), soa.into()]).unwrap();
        assert_eq!(merged.n_columns(), 3);
        assert_eq!(merged.numeric_kind(), None);
        assert_eq!(
            merged.read_rows::<f64>(0, 2).unwrap(),
            vec![0.0, 1.0, 0.5, 2.0, 3.0, 1.5]
        );
        assert_eq!(merged.read_column::<f32>(2, 0, 2).unwrap(), vec![0.5, 1.5]);
        assert_eq!(merged.locate_column(1).unwrap(), (0, 1));
    }

    #[test]
    fn column_merged_write_back() {
        let mut merged = MergedTable::from_tables(vec![rows(2, 0).into(), rows(2, 10).into()]).unwrap();
        let mut block = merged
            .get_block_of_rows_mut::<i64>(1, 1, ReadWriteMode::ReadWrite)
            .unwrap();
        assert_eq!(block.as_slice(), &[2, 3, 12, 13]);
        block.as_mut_slice().unwrap().copy_from_slice(&[20, 30, 120, 130]);
        block.release().unwrap();
        assert_eq!(merged.read_rows::<i32>(1, 1).unwrap(), vec![20, 30, 120, 130]);
        assert_eq!(merged.read_rows::<i32>(0, 1).unwrap(), vec![0, 1, 10, 11]);
    }

    #[test]
    fn column_merged_rejects_row_mismatch() {
        let mut merged = MergedTable::new();
        merged.add_table(rows(3, 0)).unwrap();
        let err = merged.add_table(rows(5, 0)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 5, .. }));
        assert_eq!(merged.n_tables(), 1);
        assert_eq!(merged.n_columns(), 2);
        assert_eq!(merged.dictionary().len(), 2);
    }

    #[test]
    fn failed_acquire_propagates() {
        use crate::table::{PackedTriangularMatrix, Triangle};
        let packed = PackedTriangularMatrix::new(NumericKind::Int32, 2, Triangle::Lower).unwrap();
        let mut merged = RowMergedTable::from_tables(vec![rows(2, 0).into(), packed.into()]).unwrap();
        let err = merged
            .get_block_of_rows_mut::<i32>(0, 4, ReadWriteMode::ReadWrite)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion(_)));
        assert_eq!(merged.read_rows::<i32>(0, 2).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn assign_reaches_every_component() {
        let mut merged = RowMergedTable::from_tables(vec![rows(1, 0).into(), rows(1, 5).into()]).unwrap();
        merged.assign(9i64).unwrap();
        assert_eq!(merged.read_rows::<i32>(0, 2).unwrap(), vec![9; 4]);
    }
}
