//! Structure-of-arrays table: one independently typed buffer per column.
//!
//! Memory layout for a 2x3 table:
//! ```text
//! Logical:     Memory:
//! [a b c]      col0: [a d]   (f32)
//! [d e f]      col1: [b e]   (i64)
//!              col2: [c f]   (f64)
//! ```
//!
//! Column blocks in the column's own kind borrow storage; row blocks
//! gather across columns and always convert into a unified buffer.

use crate::access::{staging, BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::{DataDictionary, FeatureDescriptor};
use crate::dtype::{Element, NumericBuffer, NumericKind, Stride};
use crate::error::{check_index, check_range, Error, Result};

/// Column-major table with per-column kinds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoaTable {
    columns: Vec<NumericBuffer>,
    n_rows: usize,
    dictionary: DataDictionary,
}

impl SoaTable {
    /// Table with `n_rows` rows and no columns yet.
    pub fn new(n_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            n_rows,
            dictionary: DataDictionary::new(),
        }
    }

    /// Build from column buffers of equal length.
    ///
    /// An empty column list yields a table with zero rows.
    pub fn from_columns(columns: Vec<NumericBuffer>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, NumericBuffer::len);
        let mut table = Self::new(n_rows);
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Zero-filled columns of the given kinds.
    pub fn zeros(kinds: &[NumericKind], n_rows: usize) -> Result<Self> {
        let mut table = Self::new(n_rows);
        for &kind in kinds {
            table.add_column(NumericBuffer::zeros(kind, n_rows)?)?;
        }
        Ok(table)
    }

    pub(crate) fn from_parts(
        columns: Vec<NumericBuffer>,
        n_rows: usize,
        dictionary: DataDictionary,
    ) -> Result<Self> {
        if dictionary.len() != columns.len() {
            return Err(Error::mismatch("dictionary length", columns.len(), dictionary.len()));
        }
        let mut table = Self::new(n_rows);
        for (column, feature) in columns.into_iter().zip(dictionary.iter()) {
            table.add_column(column)?;
            table.set_feature(table.columns.len() - 1, *feature)?;
        }
        Ok(table)
    }

    /// Append a column; its length must equal the row count.
    pub fn add_column(&mut self, column: NumericBuffer) -> Result<()> {
        if column.len() != self.n_rows {
            return Err(Error::mismatch("column length", self.n_rows, column.len()));
        }
        self.dictionary.push(FeatureDescriptor::continuous(column.kind()));
        self.columns.push(column);
        Ok(())
    }

    /// Replace column `index`, taking over the new buffer's kind.
    pub fn set_column(&mut self, index: usize, column: NumericBuffer) -> Result<()> {
        check_index("column", index, self.columns.len())?;
        if column.len() != self.n_rows {
            return Err(Error::mismatch("column length", self.n_rows, column.len()));
        }
        let feature = self.dictionary.get(index).copied().unwrap_or_else(|| {
            FeatureDescriptor::continuous(column.kind())
        });
        self.dictionary.set(index, feature.with_kind(column.kind()))?;
        self.columns[index] = column;
        Ok(())
    }

    pub fn column(&self, index: usize) -> Option<&NumericBuffer> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[NumericBuffer] {
        &self.columns
    }

    /// Replace the descriptor of column `index`.
    ///
    /// A descriptor with a different kind converts the column's storage.
    pub fn set_feature(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        check_index("column", index, self.columns.len())?;
        if self.columns[index].kind() != feature.kind {
            self.columns[index] = self.columns[index].converted(feature.kind)?;
        }
        self.dictionary.set(index, feature)
    }
}

impl NumericTable for SoaTable {
    #[inline]
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    fn n_columns(&self) -> usize {
        self.columns.len()
    }

    fn dictionary(&self) -> &DataDictionary {
        &self.dictionary
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        self.dictionary.common_kind()
    }

    fn get_block_of_rows<T: Element>(
        &self,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        let n_cols = self.columns.len();
        let values = staging(count * n_cols, ReadWriteMode::ReadOnly, |dst| {
            for (j, column) in self.columns.iter().enumerate() {
                column.read_into(Stride::contiguous(start), dst, Stride::new(j, n_cols), count);
            }
        })?;
        Ok(BlockDescriptor::owned(values, count, n_cols))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        let n_cols = self.columns.len();
        let columns = &mut self.columns;
        let values = staging(count * n_cols, mode, |dst| {
            for (j, column) in columns.iter().enumerate() {
                column.read_into(Stride::contiguous(start), dst, Stride::new(j, n_cols), count);
            }
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            n_cols,
            mode,
            Box::new(move |src: &[T]| {
                for (j, column) in columns.iter_mut().enumerate() {
                    column.write_from(Stride::contiguous(start), src, Stride::new(j, n_cols), count);
                }
                Ok(())
            }),
        ))
    }

    fn get_block_of_column_values<T: Element>(
        &self,
        feature: usize,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_index("column", feature, self.columns.len())?;
        check_range("row", start, count, self.n_rows)?;
        let column = &self.columns[feature];
        if let Some(values) = column.as_slice::<T>() {
            return Ok(BlockDescriptor::borrowed(&values[start..start + count], count, 1));
        }
        let values = staging(count, ReadWriteMode::ReadOnly, |dst| {
            column.read_into(Stride::contiguous(start), dst, Stride::contiguous(0), count)
        })?;
        Ok(BlockDescriptor::owned(values, count, 1))
    }

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        feature: usize,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_index("column", feature, self.columns.len())?;
        check_range("row", start, count, self.n_rows)?;
        let column = &mut self.columns[feature];
        if column.is::<T>() {
            let values = column.typed_mut::<T>()?;
            return Ok(BlockDescriptor::borrowed_mut(
                &mut values[start..start + count],
                count,
                1,
                mode,
            ));
        }
        let values = staging(count, mode, |dst| {
            column.read_into(Stride::contiguous(start), dst, Stride::contiguous(0), count)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            1,
            mode,
            Box::new(move |src: &[T]| {
                column.write_from(Stride::contiguous(start), src, Stride::contiguous(0), count);
                Ok(())
            }),
        ))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        for column in &mut self.columns {
            column.fill(value.to_scalar());
        }
        Ok(())
    }
}
