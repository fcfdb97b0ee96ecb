//! Homogeneous N-dimensional tensor with row-major strides.
//!
//! A subtensor pins a prefix of the dimensions and ranges over the next
//! one, taking all trailing dimensions whole. With row-major strides
//! that region is one contiguous run of storage:
//!
//! ```text
//! dims [2, 3, 4], fixed [1], start 1, count 2
//! offset = 1 * 12 + 1 * 4 = 16, length = 2 * 4 = 8
//! ```

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::access::{staging, BlockDescriptor, NumericTensor, ReadWriteMode};
use crate::dtype::{Element, NumericBuffer, NumericKind, Stride};
use crate::error::{check_index, check_range, Error, Result};

/// Dense tensor of one numeric kind.
#[derive(Debug, Clone, PartialEq)]
pub struct HomogenTensor {
    dims: Vec<usize>,
    strides: Vec<usize>,
    data: NumericBuffer,
}

/// Row-major strides. Checked even when a zero dimension makes the element
/// count zero, since the strides of the leading axes can still overflow.
fn row_major_strides(dims: &[usize]) -> Result<Vec<usize>> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1]
            .checked_mul(dims[i + 1])
            .ok_or(Error::AllocationFailure { elements: usize::MAX })?;
    }
    Ok(strides)
}

fn element_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::AllocationFailure { elements: usize::MAX })
}

impl HomogenTensor {
    /// Wrap a row-major buffer; its length must be the product of `dims`.
    pub fn new(dims: Vec<usize>, data: NumericBuffer) -> Result<Self> {
        let expected = element_count(&dims)?;
        if data.len() != expected {
            return Err(Error::mismatch("tensor element count", expected, data.len()));
        }
        Ok(Self {
            strides: row_major_strides(&dims)?,
            dims,
            data,
        })
    }

    pub fn from_vec<T: Element>(dims: Vec<usize>, values: Vec<T>) -> Result<Self> {
        Self::new(dims, T::into_buffer(values))
    }

    /// Zero-filled tensor.
    pub fn zeros(kind: NumericKind, dims: Vec<usize>) -> Result<Self> {
        let len = element_count(&dims)?;
        Self::new(dims, NumericBuffer::zeros(kind, len)?)
    }

    /// Copy an ndarray of any memory order.
    pub fn from_array<T: Element>(array: ArrayViewD<'_, T>) -> Result<Self> {
        let dims = array.shape().to_vec();
        let values: Vec<T> = array.iter().copied().collect();
        Ok(Self {
            strides: row_major_strides(&dims)?,
            dims,
            data: T::into_buffer(values),
        })
    }

    /// Borrow as an ndarray view when the kind matches.
    pub fn view<T: Element>(&self) -> Option<ArrayViewD<'_, T>> {
        let values = self.data.as_slice::<T>()?;
        ArrayViewD::from_shape(IxDyn(&self.dims), values).ok()
    }

    /// Copy into an ndarray of `T`.
    pub fn to_array<T: Element>(&self) -> Result<ArrayD<T>> {
        let values = self.data.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(&self.dims), values)
            .map_err(|_| Error::mismatch("tensor element count", self.n_elements(), self.data.len()))
    }

    /// Change the dimensions, keeping the element count.
    pub fn reshape(&mut self, dims: Vec<usize>) -> Result<()> {
        let expected = element_count(&dims)?;
        if expected != self.data.len() {
            return Err(Error::mismatch("tensor element count", self.data.len(), expected));
        }
        self.strides = row_major_strides(&dims)?;
        self.dims = dims;
        Ok(())
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn data(&self) -> &NumericBuffer {
        &self.data
    }

    pub fn into_data(self) -> NumericBuffer {
        self.data
    }

    /// Storage range `(offset, rows, row_len)` of a subtensor.
    fn locate(&self, fixed: &[usize], start: usize, count: usize) -> Result<(usize, usize, usize)> {
        let k = fixed.len();
        if k >= self.dims.len() {
            return Err(Error::out_of_range("fixed dimension count", k, self.dims.len()));
        }
        let mut offset = 0;
        for (i, &index) in fixed.iter().enumerate() {
            check_index("tensor index", index, self.dims[i])?;
            offset += index * self.strides[i];
        }
        check_range("tensor index", start, count, self.dims[k])?;
        Ok((offset + start * self.strides[k], count, self.strides[k]))
    }
}

impl NumericTensor for HomogenTensor {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn numeric_kind(&self) -> NumericKind {
        self.data.kind()
    }

    fn get_subtensor<T: Element>(
        &self,
        fixed_dims: &[usize],
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        let (offset, rows, row_len) = self.locate(fixed_dims, start, count)?;
        let len = rows * row_len;
        if let Some(values) = self.data.as_slice::<T>() {
            return Ok(BlockDescriptor::borrowed(&values[offset..offset + len], rows, row_len));
        }
        let values = staging(len, ReadWriteMode::ReadOnly, |dst| {
            self.data
                .read_into(Stride::contiguous(offset), dst, Stride::contiguous(0), len)
        })?;
        Ok(BlockDescriptor::owned(values, rows, row_len))
    }

    fn get_subtensor_mut<T: Element>(
        &mut self,
        fixed_dims: &[usize],
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        let (offset, rows, row_len) = self.locate(fixed_dims, start, count)?;
        let len = rows * row_len;
        let data = &mut self.data;
        if data.is::<T>() {
            let values = data.typed_mut::<T>()?;
            return Ok(BlockDescriptor::borrowed_mut(
                &mut values[offset..offset + len],
                rows,
                row_len,
                mode,
            ));
        }
        let values = staging(len, mode, |dst| {
            data.read_into(Stride::contiguous(offset), dst, Stride::contiguous(0), len)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            rows,
            row_len,
            mode,
            Box::new(move |src: &[T]| {
                data.write_from(Stride::contiguous(offset), src, Stride::contiguous(0), len);
                Ok(())
            }),
        ))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        self.data.fill(value.to_scalar());
        Ok(())
    }
}
