//! Numeric element kinds, typed buffers and kind conversion.
//!
//! Every table and tensor stores its values in one of four kinds
//! ([`NumericKind`]). Storage is a [`NumericBuffer`], a closed enum over
//! `Vec<f32>`, `Vec<f64>`, `Vec<i32>` and `Vec<i64>`. Access methods are
//! generic over an [`Element`] type; when the requested element type
//! matches the storage kind, callers get a borrowed slice, otherwise values
//! are converted element by element.
//!
//! # Conversion rules
//!
//! Conversions follow Rust `as` casts, with no custom rounding policy:
//!
//! - float -> int truncates toward zero and saturates; NaN becomes 0
//! - int -> float and f64 -> f32 round to nearest
//! - integer widening and narrowing round trips (i32 -> i64 -> i32) are
//!   lossless for values representable in both kinds

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::Parallelism;

/// Conversions of at least this many elements may run in parallel.
pub const PARALLEL_THRESHOLD: usize = 64 * 1024;

// =============================================================================
// NumericKind
// =============================================================================

/// Element representation of a table column or tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
}

impl NumericKind {
    /// Size in bytes of one element.
    pub fn size(&self) -> usize {
        match self {
            NumericKind::Float32 | NumericKind::Int32 => 4,
            NumericKind::Float64 | NumericKind::Int64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumericKind::Float32 => "float32",
            NumericKind::Float64 => "float64",
            NumericKind::Int32 => "int32",
            NumericKind::Int64 => "int64",
        }
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, NumericKind::Float32 | NumericKind::Float64)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Scalar
// =============================================================================

/// A single value tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
}

impl Scalar {
    pub fn kind(&self) -> NumericKind {
        match self {
            Scalar::F32(_) => NumericKind::Float32,
            Scalar::F64(_) => NumericKind::Float64,
            Scalar::I32(_) => NumericKind::Int32,
            Scalar::I64(_) => NumericKind::Int64,
        }
    }

    /// Convert to another kind.
    pub fn convert(self, kind: NumericKind) -> Scalar {
        match kind {
            NumericKind::Float32 => Scalar::F32(f32::from_scalar(self)),
            NumericKind::Float64 => Scalar::F64(f64::from_scalar(self)),
            NumericKind::Int32 => Scalar::I32(i32::from_scalar(self)),
            NumericKind::Int64 => Scalar::I64(i64::from_scalar(self)),
        }
    }

    /// Read a little-endian value of `kind` from the front of `bytes`.
    ///
    /// `bytes` must hold at least `kind.size()` bytes.
    pub(crate) fn read_le(kind: NumericKind, bytes: &[u8]) -> Scalar {
        let mut b8 = [0u8; 8];
        b8[..kind.size()].copy_from_slice(&bytes[..kind.size()]);
        let b4 = [b8[0], b8[1], b8[2], b8[3]];
        match kind {
            NumericKind::Float32 => Scalar::F32(f32::from_le_bytes(b4)),
            NumericKind::Float64 => Scalar::F64(f64::from_le_bytes(b8)),
            NumericKind::Int32 => Scalar::I32(i32::from_le_bytes(b4)),
            NumericKind::Int64 => Scalar::I64(i64::from_le_bytes(b8)),
        }
    }

    /// Write this value little-endian to the front of `bytes`.
    pub(crate) fn write_le(self, bytes: &mut [u8]) {
        match self {
            Scalar::F32(v) => bytes[..4].copy_from_slice(&v.to_le_bytes()),
            Scalar::F64(v) => bytes[..8].copy_from_slice(&v.to_le_bytes()),
            Scalar::I32(v) => bytes[..4].copy_from_slice(&v.to_le_bytes()),
            Scalar::I64(v) => bytes[..8].copy_from_slice(&v.to_le_bytes()),
        }
    }
}

// =============================================================================
// Element
// =============================================================================

mod sealed {
    pub trait Sealed {}
}

/// Element types that blocks and subtensors can be requested in.
///
/// Implemented for `f32`, `f64`, `i32` and `i64` only.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag of this element type.
    const KIND: NumericKind;

    /// Convert from any kind using `as` semantics.
    fn from_scalar(value: Scalar) -> Self;

    fn to_scalar(self) -> Scalar;

    /// Borrow `buffer` as `&[Self]` when it stores this kind.
    fn slice(buffer: &NumericBuffer) -> Option<&[Self]>;

    /// Borrow `buffer` as `&mut [Self]` when it stores this kind.
    fn slice_mut(buffer: &mut NumericBuffer) -> Option<&mut [Self]>;

    /// Wrap a vector of this kind.
    fn into_buffer(values: Vec<Self>) -> NumericBuffer;
}

macro_rules! impl_element {
    ($t:ty, $kind:ident, $scalar:ident) => {
        impl sealed::Sealed for $t {}

        impl Element for $t {
            const KIND: NumericKind = NumericKind::$kind;

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::F32(v) => v as $t,
                    Scalar::F64(v) => v as $t,
                    Scalar::I32(v) => v as $t,
                    Scalar::I64(v) => v as $t,
                }
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::$scalar(self)
            }

            #[inline]
            fn slice(buffer: &NumericBuffer) -> Option<&[Self]> {
                match buffer {
                    NumericBuffer::$kind(values) => Some(values.as_slice()),
                    _ => None,
                }
            }

            #[inline]
            fn slice_mut(buffer: &mut NumericBuffer) -> Option<&mut [Self]> {
                match buffer {
                    NumericBuffer::$kind(values) => Some(values.as_mut_slice()),
                    _ => None,
                }
            }

            #[inline]
            fn into_buffer(values: Vec<Self>) -> NumericBuffer {
                NumericBuffer::$kind(values)
            }
        }
    };
}

impl_element!(f32, Float32, F32);
impl_element!(f64, Float64, F64);
impl_element!(i32, Int32, I32);
impl_element!(i64, Int64, I64);

/// Convert one value between element types.
#[inline]
pub fn cast<S: Element, D: Element>(value: S) -> D {
    D::from_scalar(value.to_scalar())
}

/// Convert `src` element-wise into `dst`.
///
/// Large slices are converted on the rayon pool.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn convert_slice<S: Element, D: Element>(src: &[S], dst: &mut [D]) {
    assert_eq!(src.len(), dst.len(), "conversion length mismatch");
    let parallelism = if src.len() >= PARALLEL_THRESHOLD {
        Parallelism::auto()
    } else {
        Parallelism::Sequential
    };
    parallelism.maybe_par_zip(dst, src, |d, s| *d = cast(*s));
}

/// Allocate a zero-filled vector, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Element>(len: usize) -> Result<Vec<T>> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailure { elements: len })?;
    values.resize(len, T::default());
    Ok(values)
}

// =============================================================================
// NumericBuffer
// =============================================================================

/// Start offset and step of a strided element sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stride {
    pub start: usize,
    pub step: usize,
}

impl Stride {
    #[inline]
    pub fn contiguous(start: usize) -> Self {
        Self { start, step: 1 }
    }

    #[inline]
    pub fn new(start: usize, step: usize) -> Self {
        Self { start, step }
    }

    #[inline]
    fn at(&self, i: usize) -> usize {
        self.start + i * self.step
    }
}

/// Contiguous storage of one numeric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericBuffer {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

macro_rules! with_values {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            NumericBuffer::Float32($values) => $body,
            NumericBuffer::Float64($values) => $body,
            NumericBuffer::Int32($values) => $body,
            NumericBuffer::Int64($values) => $body,
        }
    };
}

impl Default for NumericBuffer {
    fn default() -> Self {
        NumericBuffer::Float64(Vec::new())
    }
}

impl NumericBuffer {
    /// Zero-filled buffer of `len` elements.
    pub fn zeros(kind: NumericKind, len: usize) -> Result<Self> {
        Ok(match kind {
            NumericKind::Float32 => NumericBuffer::Float32(try_alloc(len)?),
            NumericKind::Float64 => NumericBuffer::Float64(try_alloc(len)?),
            NumericKind::Int32 => NumericBuffer::Int32(try_alloc(len)?),
            NumericKind::Int64 => NumericBuffer::Int64(try_alloc(len)?),
        })
    }

    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        T::into_buffer(values)
    }

    #[inline]
    pub fn kind(&self) -> NumericKind {
        match self {
            NumericBuffer::Float32(_) => NumericKind::Float32,
            NumericBuffer::Float64(_) => NumericKind::Float64,
            NumericBuffer::Int32(_) => NumericKind::Int32,
            NumericBuffer::Int64(_) => NumericKind::Int64,
        }
    }

    /// Whether the buffer stores elements of type `T`.
    #[inline]
    pub fn is<T: Element>(&self) -> bool {
        self.kind() == T::KIND
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as `&[T]` when the kinds match.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    /// Borrow as `&mut [T]` when the kinds match.
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }

    /// Borrow as `&mut [T]`, failing when the kinds differ.
    pub(crate) fn typed_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let kind = self.kind();
        T::slice_mut(self).ok_or_else(|| {
            Error::UnsupportedConversion(format!("buffer stores {kind}, requested {}", T::KIND))
        })
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        with_values!(self, values => values.get(index).map(|v| v.to_scalar()))
    }

    /// Store `value` at `index`, converting it to the buffer kind.
    pub fn set(&mut self, index: usize, value: Scalar) -> Result<()> {
        let len = self.len();
        with_values!(self, values => {
            let slot = values
                .get_mut(index)
                .ok_or_else(|| Error::out_of_range("element", index, len))?;
            *slot = Element::from_scalar(value);
        });
        Ok(())
    }

    /// Set every element to `value`, converted to the buffer kind.
    pub fn fill(&mut self, value: Scalar) {
        with_values!(self, values => values.fill(Element::from_scalar(value)))
    }

    /// Copy all values out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let mut out = try_alloc(self.len())?;
        self.read_into(Stride::contiguous(0), &mut out, Stride::contiguous(0), self.len());
        Ok(out)
    }

    /// Convert the whole buffer to another kind.
    pub fn converted(&self, kind: NumericKind) -> Result<Self> {
        if kind == self.kind() {
            return Ok(self.clone());
        }
        Ok(match kind {
            NumericKind::Float32 => NumericBuffer::Float32(self.to_vec()?),
            NumericKind::Float64 => NumericBuffer::Float64(self.to_vec()?),
            NumericKind::Int32 => NumericBuffer::Int32(self.to_vec()?),
            NumericKind::Int64 => NumericBuffer::Int64(self.to_vec()?),
        })
    }

    /// Read `count` strided values into strided positions of `dst`.
    ///
    /// Callers check bounds; out-of-bounds strides panic.
    pub(crate) fn read_into<T: Element>(&self, from: Stride, dst: &mut [T], to: Stride, count: usize) {
        with_values!(self, values => {
            if from.step == 1 && to.step == 1 {
                convert_slice(
                    &values[from.start..from.start + count],
                    &mut dst[to.start..to.start + count],
                );
            } else {
                for i in 0..count {
                    dst[to.at(i)] = cast(values[from.at(i)]);
                }
            }
        })
    }

    /// Write `count` strided values of `src` into strided positions of the buffer.
    pub(crate) fn write_from<T: Element>(&mut self, to: Stride, src: &[T], from: Stride, count: usize) {
        with_values!(self, values => {
            if from.step == 1 && to.step == 1 {
                convert_slice(
                    &src[from.start..from.start + count],
                    &mut values[to.start..to.start + count],
                );
            } else {
                for i in 0..count {
                    values[to.at(i)] = cast(src[from.at(i)]);
                }
            }
        })
    }
}

impl<T: Element> From<Vec<T>> for NumericBuffer {
    fn from(values: Vec<T>) -> Self {
        T::into_buffer(values)
    }
}
