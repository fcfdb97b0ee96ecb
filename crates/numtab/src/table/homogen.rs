//! Homogeneous dense table: one contiguous row-major buffer of one kind.
//!
//! Memory layout for a 2x3 table:
//! ```text
//! Logical:     Memory:
//! [a b c]      [a b c d e f]
//! [d e f]       ^row0^ ^row1^
//! ```
//!
//! - row blocks in the storage kind borrow storage directly
//! - column blocks are strided and always copied, except for single-column
//!   tables

use ndarray::{Array2, ArrayView2};

use crate::access::{staging, BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::{DataDictionary, FeatureDescriptor};
use crate::dtype::{Element, NumericBuffer, NumericKind, Stride};
use crate::error::{check_index, check_range, Error, Result};

/// Row-major table where every column shares one numeric kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HomogenTable {
    data: NumericBuffer,
    n_rows: usize,
    n_cols: usize,
    dictionary: DataDictionary,
}

impl HomogenTable {
    /// Wrap a row-major buffer.
    ///
    /// Fails with [`Error::DimensionMismatch`] if the buffer length is not
    /// `n_rows * n_cols`.
    pub fn new(data: NumericBuffer, n_rows: usize, n_cols: usize) -> Result<Self> {
        let dictionary = DataDictionary::uniform(data.kind(), n_cols);
        Self::from_parts(data, n_rows, n_cols, dictionary)
    }

    pub fn from_vec<T: Element>(data: Vec<T>, n_rows: usize, n_cols: usize) -> Result<Self> {
        Self::new(T::into_buffer(data), n_rows, n_cols)
    }

    /// Zero-filled table.
    pub fn zeros(kind: NumericKind, n_rows: usize, n_cols: usize) -> Result<Self> {
        let len = n_rows
            .checked_mul(n_cols)
            .ok_or(Error::AllocationFailure { elements: usize::MAX })?;
        Self::new(NumericBuffer::zeros(kind, len)?, n_rows, n_cols)
    }

    /// Copy an `[n_rows, n_cols]` array, whatever its memory order.
    pub fn from_array<T: Element>(array: ArrayView2<'_, T>) -> Self {
        let (n_rows, n_cols) = array.dim();
        let values: Vec<T> = array.iter().copied().collect();
        Self {
            data: T::into_buffer(values),
            n_rows,
            n_cols,
            dictionary: DataDictionary::uniform(T::KIND, n_cols),
        }
    }

    /// Copy the table into an `[n_rows, n_cols]` array of `T`.
    pub fn to_array<T: Element>(&self) -> Result<Array2<T>> {
        let values = self.data.to_vec::<T>()?;
        Array2::from_shape_vec((self.n_rows, self.n_cols), values)
            .map_err(|_| Error::mismatch("element count", self.n_rows * self.n_cols, self.data.len()))
    }

    pub(crate) fn from_parts(
        data: NumericBuffer,
        n_rows: usize,
        n_cols: usize,
        dictionary: DataDictionary,
    ) -> Result<Self> {
        let expected = n_rows
            .checked_mul(n_cols)
            .ok_or_else(|| Error::mismatch("element count", usize::MAX, data.len()))?;
        if data.len() != expected {
            return Err(Error::mismatch("element count", expected, data.len()));
        }
        if dictionary.len() != n_cols {
            return Err(Error::mismatch("dictionary length", n_cols, dictionary.len()));
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
            dictionary,
        })
    }

    #[inline]
    pub fn kind(&self) -> NumericKind {
        self.data.kind()
    }

    /// Row-major storage.
    pub fn data(&self) -> &NumericBuffer {
        &self.data
    }

    pub fn into_data(self) -> NumericBuffer {
        self.data
    }

    /// Replace the descriptor of column `index`.
    ///
    /// The descriptor kind must match the table kind; a homogeneous table
    /// cannot hold columns of different kinds.
    pub fn set_feature(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        if feature.kind != self.kind() {
            return Err(Error::UnsupportedConversion(format!(
                "homogeneous {} table cannot hold a {} column",
                self.kind(),
                feature.kind
            )));
        }
        self.dictionary.set(index, feature)
    }

    /// Element at (`row`, `col`) converted to `T`.
    pub fn value<T: Element>(&self, row: usize, col: usize) -> Result<T> {
        check_index("row", row, self.n_rows)?;
        check_index("column", col, self.n_cols)?;
        let scalar = self
            .data
            .get(row * self.n_cols + col)
            .ok_or_else(|| Error::out_of_range("element", row * self.n_cols + col, self.data.len()))?;
        Ok(T::from_scalar(scalar))
    }

    pub fn set_value<T: Element>(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        check_index("row", row, self.n_rows)?;
        check_index("column", col, self.n_cols)?;
        self.data.set(row * self.n_cols + col, value.to_scalar())
    }
}

impl NumericTable for HomogenTable {
    #[inline]
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    fn n_columns(&self) -> usize {
        self.n_cols
    }

    fn dictionary(&self) -> &DataDictionary {
        &self.dictionary
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        Some(self.kind())
    }

    fn get_block_of_rows<T: Element>(
        &self,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        let from = start * self.n_cols;
        let len = count * self.n_cols;
        if let Some(values) = self.data.as_slice::<T>() {
            return Ok(BlockDescriptor::borrowed(&values[from..from + len], count, self.n_cols));
        }
        let values = staging(len, ReadWriteMode::ReadOnly, |dst| {
            self.data
                .read_into(Stride::contiguous(from), dst, Stride::contiguous(0), len)
        })?;
        Ok(BlockDescriptor::owned(values, count, self.n_cols))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        check_range("row", start, count, self.n_rows)?;
        let n_cols = self.n_cols;
        let from = start * n_cols;
        let len = count * n_cols;
        if self.data.is::<T>() {
            let values = self.data.typed_mut::<T>()?;
            return Ok(BlockDescriptor::borrowed_mut(
                &mut values[from..from + len],
                count,
                n_cols,
                mode,
            ));
        }
        let data = &mut self.data;
        let values = staging(len, mode, |dst| {
            data.read_into(Stride::contiguous(from), dst, Stride::contiguous(0), len)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            n_cols,
            mode,
            Box::new(move |src: &[T]| {
                data.write_from(Stride::contiguous(from), src, Stride::contiguous(0), len);
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
        check_index("column", feature, self.n_cols)?;
        check_range("row", start, count, self.n_rows)?;
        if self.n_cols == 1 {
            if let Some(values) = self.data.as_slice::<T>() {
                return Ok(BlockDescriptor::borrowed(&values[start..start + count], count, 1));
            }
        }
        let from = Stride::new(start * self.n_cols + feature, self.n_cols);
        let values = staging(count, ReadWriteMode::ReadOnly, |dst| {
            self.data.read_into(from, dst, Stride::contiguous(0), count)
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
        check_index("column", feature, self.n_cols)?;
        check_range("row", start, count, self.n_rows)?;
        if self.n_cols == 1 && self.data.is::<T>() {
            let values = self.data.typed_mut::<T>()?;
            return Ok(BlockDescriptor::borrowed_mut(
                &mut values[start..start + count],
                count,
                1,
                mode,
            ));
        }
        let at = Stride::new(start * self.n_cols + feature, self.n_cols);
        let data = &mut self.data;
        let values = staging(count, mode, |dst| {
            data.read_into(at, dst, Stride::contiguous(0), count)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            1,
            mode,
            Box::new(move |src: &[T]| {
                data.write_from(at, src, Stride::contiguous(0), count);
                Ok(())
            }),
        ))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        self.data.fill(value.to_scalar());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn table_2x3() -> HomogenTable {
        HomogenTable::from_vec(vec![1i32, 2, 3, 4, 5, 6], 2, 3).unwrap()
    }

    #[test]
    fn rejects_wrong_length() {
        let err = HomogenTable::from_vec(vec![1.0f32; 5], 2, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { expected: 6, actual: 5, .. }
        ));
    }

    #[test]
    fn matching_kind_is_zero_copy() {
        let table = table_2x3();
        let block = table.get_block_of_rows::<i32>(1, 1).unwrap();
        assert!(block.is_zero_copy());
        assert_eq!(block.as_slice(), &[4, 5, 6]);
    }

    fn check_converted<T: Element>() {
        let table = table_2x3();
        let block = table.get_block_of_rows::<T>(0, 2).unwrap();
        assert!(!block.is_zero_copy());
        let expected: Vec<T> = (1..=6).map(|v: i32| T::from_scalar(v.to_scalar())).collect();
        assert_eq!(block.to_vec(), expected);
    }

    #[test]
    fn other_kinds_convert() {
        check_converted::<f32>();
        check_converted::<f64>();
        check_converted::<i64>();
    }

    #[test]
    fn out_of_range_rows_fail_before_access() {
        let table = table_2x3();
        assert!(matches!(
            table.get_block_of_rows::<f64>(1, 2),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            table.get_block_of_column_values::<f64>(3, 0, 1),
            Err(Error::OutOfRange { what: "column", .. })
        ));
    }

    #[test]
    fn converted_write_commits_on_release() {
        let mut table = table_2x3();
        let mut block = table
            .get_block_of_rows_mut::<f64>(0, 1, ReadWriteMode::ReadWrite)
            .unwrap();
        block.as_mut_slice().unwrap()[2] = 30.9;
        block.release().unwrap();
        assert_eq!(table.read_rows::<i32>(0, 1).unwrap(), vec![1, 2, 30]);
    }

    #[test]
    fn zero_copy_write_is_immediate() {
        let mut table = table_2x3();
        let mut block = table
            .get_block_of_rows_mut::<i32>(1, 1, ReadWriteMode::WriteOnly)
            .unwrap();
        block.as_mut_slice().unwrap().copy_from_slice(&[7, 8, 9]);
        block.release().unwrap();
        assert_eq!(table.value::<i32>(1, 2).unwrap(), 9);
    }

    #[test]
    fn column_values_are_strided() {
        let mut table = table_2x3();
        assert_eq!(table.read_column::<i64>(1, 0, 2).unwrap(), vec![2, 5]);

        let mut column = table
            .get_block_of_column_values_mut::<f32>(2, 1, 1, ReadWriteMode::ReadWrite)
            .unwrap();
        assert_eq!(column.as_slice(), &[6.0]);
        column.as_mut_slice().unwrap()[0] = -1.0;
        column.release().unwrap();
        assert_eq!(table.read_rows::<i32>(1, 1).unwrap(), vec![4, 5, -1]);
    }

    #[test]
    fn single_column_values_borrow() {
        let table = HomogenTable::from_vec(vec![1.0f64, 2.0, 3.0], 3, 1).unwrap();
        let block = table.get_block_of_column_values::<f64>(0, 1, 2).unwrap();
        assert!(block.is_zero_copy());
        assert_eq!(block.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn round_trip_leaves_values_unchanged() {
        let mut table = HomogenTable::from_vec(vec![0.1f64, 0.2, 0.3, 0.4], 2, 2).unwrap();
        let before = table.clone();
        let block = table
            .get_block_of_rows_mut::<f64>(0, 2, ReadWriteMode::ReadWrite)
            .unwrap();
        block.release().unwrap();
        assert_eq!(table, before);
    }

    #[test]
    fn assign_fills_every_element() {
        let mut table = HomogenTable::zeros(NumericKind::Float32, 2, 2).unwrap();
        table.assign(2.5f64).unwrap();
        assert_eq!(table.read_rows::<f32>(0, 2).unwrap(), vec![2.5; 4]);
    }

    #[test]
    fn ndarray_interop() {
        let array = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let table = HomogenTable::from_array(array.t());
        assert_eq!((table.n_rows(), table.n_columns()), (2, 3));
        assert_eq!(table.read_rows::<f32>(0, 1).unwrap(), vec![1.0, 3.0, 5.0]);
        let back = table.to_array::<f64>().unwrap();
        assert_eq!(back[[1, 2]], 6.0);
    }

    #[test]
    fn set_feature_requires_table_kind() {
        let mut table = table_2x3();
        assert!(table
            .set_feature(0, FeatureDescriptor::categorical(NumericKind::Int32, 3))
            .is_ok());
        assert!(matches!(
            table.set_feature(1, FeatureDescriptor::continuous(NumericKind::Float64)),
            Err(Error::UnsupportedConversion(_))
        ));
        assert_eq!(table.dictionary().get(0).unwrap().categories, 3);
    }
}
