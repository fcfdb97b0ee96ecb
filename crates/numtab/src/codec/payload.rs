//! Serde payload structures written inside the framed format.
//!
//! These mirror the runtime types field for field but carry no derived
//! state (strides, prefix offsets); that is rebuilt on decode.

use serde::{Deserialize, Serialize};

use super::native::ObjectKind;
use crate::dictionary::DataDictionary;
use crate::dtype::NumericBuffer;
use crate::table::{RecordSchema, Triangle};

/// Version-tagged top-level payload.
///
/// New format versions add variants instead of changing existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(ObjectPayload),
}

/// Any serializable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectPayload {
    Table(TablePayload),
    Tensor(TensorPayload),
    Collection(CollectionPayload),
    KeyedCollection(KeyedCollectionPayload),
}

impl ObjectPayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectPayload::Table(table) => table.kind(),
            ObjectPayload::Tensor(_) => ObjectKind::Tensor,
            ObjectPayload::Collection(_) => ObjectKind::Collection,
            ObjectPayload::KeyedCollection(_) => ObjectKind::KeyedCollection,
        }
    }
}

/// Table of any layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TablePayload {
    Homogen {
        n_rows: u64,
        n_cols: u64,
        data: NumericBuffer,
        dictionary: DataDictionary,
    },
    Soa {
        n_rows: u64,
        columns: Vec<NumericBuffer>,
        dictionary: DataDictionary,
    },
    Aos {
        n_rows: u64,
        schema: RecordSchema,
        bytes: Vec<u8>,
        dictionary: DataDictionary,
    },
    PackedTriangular {
        n: u64,
        triangle: Triangle,
        data: NumericBuffer,
        dictionary: DataDictionary,
    },
    RowMerged {
        tables: Vec<TablePayload>,
    },
    Merged {
        tables: Vec<TablePayload>,
    },
}

impl TablePayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            TablePayload::Homogen { .. } => ObjectKind::HomogenTable,
            TablePayload::Soa { .. } => ObjectKind::SoaTable,
            TablePayload::Aos { .. } => ObjectKind::AosTable,
            TablePayload::PackedTriangular { .. } => ObjectKind::PackedTriangular,
            TablePayload::RowMerged { .. } => ObjectKind::RowMergedTable,
            TablePayload::Merged { .. } => ObjectKind::MergedTable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorPayload {
    pub dims: Vec<u64>,
    pub data: NumericBuffer,
}

/// Ordered collection; elements in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPayload {
    pub items: Vec<ObjectPayload>,
}

/// Keyed collection; `keys[i]` belongs to `items[i]`, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedCollectionPayload {
    pub keys: Vec<i64>,
    pub items: Vec<ObjectPayload>,
}
