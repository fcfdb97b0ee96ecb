//! numtab: layout-polymorphic numeric tables and tensors.
//!
//! Tables expose one block access protocol over several storage layouts,
//! so consumers read and write rows or columns without knowing how the
//! data is stored. Objects can be packed to bytes and unpacked again.
//!
//! # Key Types
//!
//! - [`NumericTable`] / [`NumericTensor`] - Block access capabilities
//! - [`BlockDescriptor`] - An acquired block, released with `release()`
//! - [`HomogenTable`], [`SoaTable`], [`AosTable`], [`PackedTriangularMatrix`] - Layouts
//! - [`RowMergedTable`] / [`MergedTable`] - Row- and column-concatenation
//! - [`Table`] - Closed enum over every layout
//! - [`Collection`] / [`KeyedCollection`] - Owning containers
//! - [`Managed`] / [`Context`] - Pack/unpack/dispose lifecycle
//!
//! # Serialization
//!
//! Use [`to_bytes`] / [`from_bytes`] for one-shot encoding, or wrap an
//! object in [`Managed`] to move it between the live and packed states.
//! See the [`serialization`] module for the state machine.

pub mod access;
pub mod codec;
pub mod collection;
pub mod context;
pub mod dictionary;
pub mod dtype;
pub mod error;
pub mod serialization;
pub mod table;
pub mod tensor;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Access protocol
pub use access::{BlockDescriptor, NumericTable, NumericTensor, ReadWriteMode};

// Element types
pub use dtype::{cast, convert_slice, Element, NumericBuffer, NumericKind, Scalar, PARALLEL_THRESHOLD};

// Feature metadata
pub use dictionary::{DataDictionary, FeatureDescriptor, FeatureType, PmmlType};

pub use error::{Error, Result};

// Layouts
pub use table::{
    AosTable, FieldDescriptor, HomogenTable, MergedTable, PackedTriangularMatrix, Record,
    RecordSchema, RowMergedTable, SoaTable, Table, TableLayout, Triangle,
};
pub use tensor::HomogenTensor;

pub use collection::{Collection, KeyedCollection};

// Lifecycle
pub use codec::{from_bytes, to_bytes, CodecConfig};
pub use context::{Context, ContextConfig, ObjectId, Releasable};
pub use serialization::{Managed, ObjectState, ObjectStatus, Serializable};

pub use utils::Parallelism;
