//! Packed triangular matrix: the `n(n+1)/2` elements of one triangle of a
//! square matrix, row by row.
//!
//! ```text
//! Lower, n = 3:            Upper, n = 3:
//! [a . .]                  [a b c]
//! [b c .]  -> [a b c d e f] [. d e]  -> [a b c d e f]
//! [d e f]                  [. . f]
//! ```
//!
//! Block access by rows or columns is not supported; use
//! [`PackedTriangularMatrix::get_packed_array`] or element access instead.

use serde::{Deserialize, Serialize};

use crate::access::{staging, BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::{DataDictionary, FeatureDescriptor};
use crate::dtype::{Element, NumericBuffer, NumericKind, Scalar, Stride};
use crate::error::{check_index, Error, Result};
use crate::table::HomogenTable;

/// Which triangle is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Triangle {
    #[default]
    Lower,
    Upper,
}

/// Square matrix storing one triangle in packed form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackedTriangularMatrix {
    data: NumericBuffer,
    n: usize,
    triangle: Triangle,
    dictionary: DataDictionary,
}

/// Number of packed elements of an `n x n` triangle.
///
/// Fails with `AllocationFailure` when the count does not fit in `usize`.
#[inline]
pub fn packed_len(n: usize) -> Result<usize> {
    let (a, b) = if n % 2 == 0 { (n / 2, n + 1) } else { (n, n / 2 + 1) };
    a.checked_mul(b)
        .ok_or(Error::AllocationFailure { elements: usize::MAX })
}

impl PackedTriangularMatrix {
    /// Zero-filled `n x n` matrix.
    pub fn new(kind: NumericKind, n: usize, triangle: Triangle) -> Result<Self> {
        Self::from_packed(NumericBuffer::zeros(kind, packed_len(n)?)?, n, triangle)
    }

    /// Wrap a packed buffer of `n(n+1)/2` elements.
    pub fn from_packed(data: NumericBuffer, n: usize, triangle: Triangle) -> Result<Self> {
        let expected = packed_len(n)?;
        if data.len() != expected {
            return Err(Error::mismatch("packed length", expected, data.len()));
        }
        let dictionary = DataDictionary::uniform(data.kind(), n);
        Self::from_parts(data, n, triangle, dictionary)
    }

    pub(crate) fn from_parts(
        data: NumericBuffer,
        n: usize,
        triangle: Triangle,
        dictionary: DataDictionary,
    ) -> Result<Self> {
        let expected = packed_len(n)?;
        if data.len() != expected {
            return Err(Error::mismatch("packed length", expected, data.len()));
        }
        if dictionary.len() != n {
            return Err(Error::mismatch("dictionary length", n, dictionary.len()));
        }
        Ok(Self {
            data,
            n,
            triangle,
            dictionary,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn triangle(&self) -> Triangle {
        self.triangle
    }

    #[inline]
    pub fn kind(&self) -> NumericKind {
        self.data.kind()
    }

    /// Packed storage.
    pub fn data(&self) -> &NumericBuffer {
        &self.data
    }

    /// Packed offset of (`row`, `col`), `None` outside the stored triangle.
    pub fn offset(&self, row: usize, col: usize) -> Option<usize> {
        let n = self.n;
        match self.triangle {
            Triangle::Lower if col <= row => Some(row * (row + 1) / 2 + col),
            // rows before `row` hold n, n-1, ... elements
            Triangle::Upper if col >= row => Some(row * (2 * n - row + 1) / 2 + (col - row)),
            _ => None,
        }
    }

    /// Element (`row`, `col`); zero outside the stored triangle.
    pub fn get<T: Element>(&self, row: usize, col: usize) -> Result<T> {
        check_index("row", row, self.n)?;
        check_index("column", col, self.n)?;
        match self.offset(row, col).and_then(|at| self.data.get(at)) {
            Some(value) => Ok(T::from_scalar(value)),
            None => Ok(T::default()),
        }
    }

    /// Store (`row`, `col`); the position must lie inside the triangle.
    pub fn set<T: Element>(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        check_index("row", row, self.n)?;
        check_index("column", col, self.n)?;
        let at = self.offset(row, col).ok_or_else(|| {
            // report the violated bound of the triangle
            match self.triangle {
                Triangle::Lower => Error::out_of_range("column", col, row + 1),
                Triangle::Upper => Error::out_of_range("row", row, col + 1),
            }
        })?;
        self.data.set(at, value.to_scalar())
    }

    /// Packed values, borrowed when the kind matches.
    pub fn get_packed_array<T: Element>(&self) -> Result<BlockDescriptor<'_, T>> {
        let len = self.data.len();
        if let Some(values) = self.data.as_slice::<T>() {
            return Ok(BlockDescriptor::borrowed(values, 1, len));
        }
        Ok(BlockDescriptor::owned(self.data.to_vec()?, 1, len))
    }

    /// Writable packed values.
    pub fn get_packed_array_mut<T: Element>(
        &mut self,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        let len = self.data.len();
        let data = &mut self.data;
        if data.is::<T>() {
            let values = data.typed_mut::<T>()?;
            return Ok(BlockDescriptor::borrowed_mut(values, 1, len, mode));
        }
        let values = staging(len, mode, |dst| {
            data.read_into(Stride::contiguous(0), dst, Stride::contiguous(0), len)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            1,
            len,
            mode,
            Box::new(move |src: &[T]| {
                data.write_from(Stride::contiguous(0), src, Stride::contiguous(0), len);
                Ok(())
            }),
        ))
    }

    /// Full square matrix with zeros outside the stored triangle.
    pub fn to_dense(&self) -> Result<HomogenTable> {
        self.expand(false)
    }

    /// Full square matrix mirroring the stored triangle across the diagonal.
    pub fn to_symmetric(&self) -> Result<HomogenTable> {
        self.expand(true)
    }

    fn expand(&self, mirror: bool) -> Result<HomogenTable> {
        let n = self.n;
        let mut dense = HomogenTable::zeros(self.kind(), n, n)?;
        for row in 0..n {
            for col in 0..n {
                let at = self
                    .offset(row, col)
                    .or_else(|| mirror.then(|| self.offset(col, row)).flatten());
                if let Some(value) = at.and_then(|at| self.data.get(at)) {
                    set_scalar(&mut dense, row, col, value)?;
                }
            }
        }
        Ok(dense)
    }

    /// Replace the descriptor of column `index`; the kind must not change.
    pub fn set_feature(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        if feature.kind != self.kind() {
            return Err(Error::UnsupportedConversion(format!(
                "packed {} matrix cannot hold a {} column",
                self.kind(),
                feature.kind
            )));
        }
        self.dictionary.set(index, feature)
    }
}

fn set_scalar(table: &mut HomogenTable, row: usize, col: usize, value: Scalar) -> Result<()> {
    match value {
        Scalar::F32(v) => table.set_value(row, col, v),
        Scalar::F64(v) => table.set_value(row, col, v),
        Scalar::I32(v) => table.set_value(row, col, v),
        Scalar::I64(v) => table.set_value(row, col, v),
    }
}

fn unsupported(what: &str) -> Error {
    Error::UnsupportedConversion(format!(
        "{what} blocks are not available on packed triangular matrices; use get_packed_array"
    ))
}

impl NumericTable for PackedTriangularMatrix {
    #[inline]
    fn n_rows(&self) -> usize {
        self.n
    }

    #[inline]
    fn n_columns(&self) -> usize {
        self.n
    }

    fn dictionary(&self) -> &DataDictionary {
        &self.dictionary
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        Some(self.kind())
    }

    fn get_block_of_rows<T: Element>(
        &self,
        _start: usize,
        _count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        Err(unsupported("row"))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        _start: usize,
        _count: usize,
        _mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        Err(unsupported("row"))
    }

    fn get_block_of_column_values<T: Element>(
        &self,
        _feature: usize,
        _start: usize,
        _count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        Err(unsupported("column"))
    }

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        _feature: usize,
        _start: usize,
        _count: usize,
        _mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        Err(unsupported("column"))
    }

    /// Fills the stored triangle only.
    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        self.data.fill(value.to_scalar());
        Ok(())
    }
}
