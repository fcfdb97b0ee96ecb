//! Conversions between runtime objects and payload structures.

use crate::access::{NumericTable, NumericTensor};
use crate::codec::native::{DeserializeError, ObjectKind};
use crate::codec::payload::{ObjectPayload, TablePayload, TensorPayload};
use crate::error::{Error, Result};
use crate::serialization::Serializable;
use crate::table::{
    AosTable, HomogenTable, MergedTable, PackedTriangularMatrix, RowMergedTable, SoaTable, Table,
    TableLayout,
};
use crate::tensor::HomogenTensor;

fn corrupt(err: impl std::fmt::Display) -> Error {
    DeserializeError::CorruptPayload(err.to_string()).into()
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| corrupt(format!("size {value} does not fit in usize")))
}

pub(crate) fn kind_mismatch(expected: ObjectKind, actual: ObjectKind) -> Error {
    DeserializeError::KindMismatch { expected, actual }.into()
}

// =============================================================================
// Tables
// =============================================================================

impl From<&Table> for TablePayload {
    fn from(table: &Table) -> Self {
        match table {
            Table::Homogen(t) => t.into(),
            Table::Soa(t) => t.into(),
            Table::Aos(t) => t.into(),
            Table::PackedTriangular(t) => t.into(),
            Table::RowMerged(t) => t.into(),
            Table::Merged(t) => t.into(),
        }
    }
}

impl From<&HomogenTable> for TablePayload {
    fn from(t: &HomogenTable) -> Self {
        TablePayload::Homogen {
            n_rows: t.n_rows() as u64,
            n_cols: t.n_columns() as u64,
            data: t.data().clone(),
            dictionary: t.dictionary().clone(),
        }
    }
}

impl From<&SoaTable> for TablePayload {
    fn from(t: &SoaTable) -> Self {
        TablePayload::Soa {
            n_rows: t.n_rows() as u64,
            columns: t.columns().to_vec(),
            dictionary: t.dictionary().clone(),
        }
    }
}

impl From<&AosTable> for TablePayload {
    fn from(t: &AosTable) -> Self {
        TablePayload::Aos {
            n_rows: t.n_rows() as u64,
            schema: t.schema().clone(),
            bytes: t.bytes().to_vec(),
            dictionary: t.dictionary().clone(),
        }
    }
}

impl From<&PackedTriangularMatrix> for TablePayload {
    fn from(t: &PackedTriangularMatrix) -> Self {
        TablePayload::PackedTriangular {
            n: t.size() as u64,
            triangle: t.triangle(),
            data: t.data().clone(),
            dictionary: t.dictionary().clone(),
        }
    }
}

impl From<&RowMergedTable> for TablePayload {
    fn from(t: &RowMergedTable) -> Self {
        TablePayload::RowMerged {
            tables: t.tables().iter().map(TablePayload::from).collect(),
        }
    }
}

impl From<&MergedTable> for TablePayload {
    fn from(t: &MergedTable) -> Self {
        TablePayload::Merged {
            tables: t.tables().iter().map(TablePayload::from).collect(),
        }
    }
}

/// Header kind of a table, by layout.
fn table_kind(table: &Table) -> ObjectKind {
    match table.layout() {
        TableLayout::Homogen => ObjectKind::HomogenTable,
        TableLayout::Soa => ObjectKind::SoaTable,
        TableLayout::Aos => ObjectKind::AosTable,
        TableLayout::PackedTriangular => ObjectKind::PackedTriangular,
        TableLayout::RowMerged => ObjectKind::RowMergedTable,
        TableLayout::Merged => ObjectKind::MergedTable,
    }
}

impl TryFrom<TablePayload> for Table {
    type Error = Error;

    fn try_from(payload: TablePayload) -> Result<Self> {
        let table = match payload {
            TablePayload::Homogen {
                n_rows,
                n_cols,
                data,
                dictionary,
            } => HomogenTable::from_parts(data, to_usize(n_rows)?, to_usize(n_cols)?, dictionary)
                .map_err(corrupt)?
                .into(),
            TablePayload::Soa {
                n_rows,
                columns,
                dictionary,
            } => SoaTable::from_parts(columns, to_usize(n_rows)?, dictionary)
                .map_err(corrupt)?
                .into(),
            TablePayload::Aos {
                n_rows,
                schema,
                bytes,
                dictionary,
            } => AosTable::from_parts(schema, to_usize(n_rows)?, bytes, dictionary)
                .map_err(corrupt)?
                .into(),
            TablePayload::PackedTriangular {
                n,
                triangle,
                data,
                dictionary,
            } => PackedTriangularMatrix::from_parts(data, to_usize(n)?, triangle, dictionary)
                .map_err(corrupt)?
                .into(),
            TablePayload::RowMerged { tables } => {
                let tables = tables.into_iter().map(Table::try_from).collect::<Result<_>>()?;
                RowMergedTable::from_tables(tables).map_err(corrupt)?.into()
            }
            TablePayload::Merged { tables } => {
                let tables = tables.into_iter().map(Table::try_from).collect::<Result<_>>()?;
                MergedTable::from_tables(tables).map_err(corrupt)?.into()
            }
        };
        Ok(table)
    }
}

impl Serializable for Table {
    fn object_kind(&self) -> ObjectKind {
        table_kind(self)
    }

    fn element_count(&self) -> u64 {
        self.n_elements() as u64
    }

    fn to_payload(&self) -> Result<ObjectPayload> {
        Ok(ObjectPayload::Table(self.into()))
    }

    fn from_payload(payload: ObjectPayload) -> Result<Self> {
        match payload {
            ObjectPayload::Table(table) => Table::try_from(table),
            other => Err(DeserializeError::NotATable(other.kind()).into()),
        }
    }
}

/// Serializable impl for a concrete layout, going through [`Table`].
macro_rules! impl_layout_serializable {
    ($ty:ty, $variant:ident, $kind:ident) => {
        impl Serializable for $ty {
            fn object_kind(&self) -> ObjectKind {
                ObjectKind::$kind
            }

            fn element_count(&self) -> u64 {
                self.n_elements() as u64
            }

            fn to_payload(&self) -> Result<ObjectPayload> {
                Ok(ObjectPayload::Table(self.into()))
            }

            fn from_payload(payload: ObjectPayload) -> Result<Self> {
                let actual = payload.kind();
                if actual != ObjectKind::$kind {
                    return Err(kind_mismatch(ObjectKind::$kind, actual));
                }
                match Table::from_payload(payload)? {
                    Table::$variant(table) => Ok(table),
                    other => Err(kind_mismatch(ObjectKind::$kind, table_kind(&other))),
                }
            }
        }
    };
}

impl_layout_serializable!(HomogenTable, Homogen, HomogenTable);
impl_layout_serializable!(SoaTable, Soa, SoaTable);
impl_layout_serializable!(AosTable, Aos, AosTable);
impl_layout_serializable!(PackedTriangularMatrix, PackedTriangular, PackedTriangular);
impl_layout_serializable!(RowMergedTable, RowMerged, RowMergedTable);
impl_layout_serializable!(MergedTable, Merged, MergedTable);

// =============================================================================
// Tensor
// =============================================================================

impl Serializable for HomogenTensor {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::Tensor
    }

    fn element_count(&self) -> u64 {
        self.n_elements() as u64
    }

    fn to_payload(&self) -> Result<ObjectPayload> {
        Ok(ObjectPayload::Tensor(TensorPayload {
            dims: self.dims().iter().map(|&d| d as u64).collect(),
            data: self.data().clone(),
        }))
    }

    fn from_payload(payload: ObjectPayload) -> Result<Self> {
        match payload {
            ObjectPayload::Tensor(TensorPayload { dims, data }) => {
                let dims = dims.into_iter().map(to_usize).collect::<Result<Vec<_>>>()?;
                HomogenTensor::new(dims, data).map_err(corrupt)
            }
            other => Err(kind_mismatch(ObjectKind::Tensor, other.kind())),
        }
    }
}
