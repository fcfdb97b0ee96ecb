//! Table layouts and the [`Table`] enum dispatching over them.
//!
//! # Layouts
//!
//! - [`HomogenTable`]: one row-major buffer of a single kind
//! - [`SoaTable`]: one buffer per column, each with its own kind
//! - [`AosTable`]: fixed-size records described by a [`RecordSchema`]
//! - [`PackedTriangularMatrix`]: one triangle of a square matrix
//! - [`RowMergedTable`] / [`MergedTable`]: concatenations of tables by
//!   rows or by columns
//!
//! Every layout implements [`NumericTable`]. Code that needs to hold a
//! table of any layout, such as composite tables, stores a [`Table`].

mod aos;
mod homogen;
mod merged;
mod packed;
mod soa;

pub use aos::{AosTable, FieldDescriptor, Record, RecordSchema};
pub use homogen::HomogenTable;
pub use merged::{MergedTable, RowMergedTable};
pub use packed::{packed_len, PackedTriangularMatrix, Triangle};
pub use soa::SoaTable;

use crate::access::{BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::{DataDictionary, FeatureDescriptor};
use crate::dtype::{Element, NumericKind};
use crate::error::{Error, Result};

/// Layout tag of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableLayout {
    Homogen,
    Soa,
    Aos,
    PackedTriangular,
    RowMerged,
    Merged,
}

/// A table of any layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Homogen(HomogenTable),
    Soa(SoaTable),
    Aos(AosTable),
    PackedTriangular(PackedTriangularMatrix),
    RowMerged(RowMergedTable),
    Merged(MergedTable),
}

macro_rules! dispatch {
    ($table:expr, $inner:ident => $body:expr) => {
        match $table {
            Table::Homogen($inner) => $body,
            Table::Soa($inner) => $body,
            Table::Aos($inner) => $body,
            Table::PackedTriangular($inner) => $body,
            Table::RowMerged($inner) => $body,
            Table::Merged($inner) => $body,
        }
    };
}

impl Default for Table {
    fn default() -> Self {
        Table::Homogen(HomogenTable::default())
    }
}

impl Table {
    pub fn layout(&self) -> TableLayout {
        match self {
            Table::Homogen(_) => TableLayout::Homogen,
            Table::Soa(_) => TableLayout::Soa,
            Table::Aos(_) => TableLayout::Aos,
            Table::PackedTriangular(_) => TableLayout::PackedTriangular,
            Table::RowMerged(_) => TableLayout::RowMerged,
            Table::Merged(_) => TableLayout::Merged,
        }
    }

    /// Replace the descriptor of column `index`.
    ///
    /// Composite tables take their descriptors from their components and
    /// reject direct changes.
    pub fn set_feature(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        match self {
            Table::Homogen(t) => t.set_feature(index, feature),
            Table::Soa(t) => t.set_feature(index, feature),
            Table::Aos(t) => t.set_feature(index, feature),
            Table::PackedTriangular(t) => t.set_feature(index, feature),
            Table::RowMerged(_) | Table::Merged(_) => Err(Error::UnsupportedConversion(
                "composite tables take descriptors from their components".into(),
            )),
        }
    }

    pub fn as_homogen(&self) -> Option<&HomogenTable> {
        match self {
            Table::Homogen(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_soa(&self) -> Option<&SoaTable> {
        match self {
            Table::Soa(t) => Some(t),
            _ => None,
        }
    }
}

impl NumericTable for Table {
    fn n_rows(&self) -> usize {
        dispatch!(self, t => t.n_rows())
    }

    fn n_columns(&self) -> usize {
        dispatch!(self, t => t.n_columns())
    }

    fn dictionary(&self) -> &DataDictionary {
        dispatch!(self, t => t.dictionary())
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        dispatch!(self, t => t.numeric_kind())
    }

    fn get_block_of_rows<T: Element>(
        &self,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        dispatch!(self, t => t.get_block_of_rows(start, count))
    }

    fn get_block_of_rows_mut<T: Element>(
        &mut self,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        dispatch!(self, t => t.get_block_of_rows_mut(start, count, mode))
    }

    fn get_block_of_column_values<T: Element>(
        &self,
        feature: usize,
        start: usize,
        count: usize,
    ) -> Result<BlockDescriptor<'_, T>> {
        dispatch!(self, t => t.get_block_of_column_values(feature, start, count))
    }

    fn get_block_of_column_values_mut<T: Element>(
        &mut self,
        feature: usize,
        start: usize,
        count: usize,
        mode: ReadWriteMode,
    ) -> Result<BlockDescriptor<'_, T>> {
        dispatch!(self, t => t.get_block_of_column_values_mut(feature, start, count, mode))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        dispatch!(self, t => t.assign(value))
    }
}

macro_rules! impl_from_layout {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Table {
                fn from(table: $ty) -> Self {
                    Table::$variant(table)
                }
            }
        )*
    };
}

impl_from_layout!(
    Homogen(HomogenTable),
    Soa(SoaTable),
    Aos(AosTable),
    PackedTriangular(PackedTriangularMatrix),
    RowMerged(RowMergedTable),
    Merged(MergedTable),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::NumericBuffer;
    use rstest::rstest;

    fn homogen() -> Table {
        HomogenTable::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2)
            .unwrap()
            .into()
    }

    fn soa() -> Table {
        SoaTable::from_columns(vec![
            NumericBuffer::from(vec![1i32, 3, 5]),
            NumericBuffer::from(vec![2.0f32, 4.0, 6.0]),
        ])
        .unwrap()
        .into()
    }

    fn aos() -> Table {
        let schema = RecordSchema::packed([("a", NumericKind::Int64), ("b", NumericKind::Float64)]);
        let mut table = AosTable::with_schema(schema, 3).unwrap();
        for row in 0..3 {
            table.set_value(row, 0, (2 * row + 1) as i64).unwrap();
            table.set_value(row, 1, (2 * row + 2) as f64).unwrap();
        }
        table.into()
    }

    fn row_merged() -> Table {
        let top = HomogenTable::from_vec(vec![1i64, 2], 1, 2).unwrap();
        let bottom = HomogenTable::from_vec(vec![3.0f32, 4.0, 5.0, 6.0], 2, 2).unwrap();
        RowMergedTable::from_tables(vec![top.into(), bottom.into()])
            .unwrap()
            .into()
    }

    fn merged() -> Table {
        let left = HomogenTable::from_vec(vec![1i32, 3, 5], 3, 1).unwrap();
        let right = SoaTable::from_columns(vec![NumericBuffer::from(vec![2.0f64, 4.0, 6.0])]).unwrap();
        MergedTable::from_tables(vec![left.into(), right.into()]).unwrap().into()
    }

    /// Every layout holding the 3x2 grid [[1, 2], [3, 4], [5, 6]].
    #[rstest]
    #[case::homogen(homogen(), TableLayout::Homogen)]
    #[case::soa(soa(), TableLayout::Soa)]
    #[case::aos(aos(), TableLayout::Aos)]
    #[case::row_merged(row_merged(), TableLayout::RowMerged)]
    #[case::merged(merged(), TableLayout::Merged)]
    fn layouts_agree(#[case] mut table: Table, #[case] layout: TableLayout) {
        assert_eq!(table.layout(), layout);
        assert_eq!((table.n_rows(), table.n_columns()), (3, 2));
        assert_eq!(table.n_elements(), 6);
        assert_eq!(table.read_rows::<f64>(0, 3).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(table.read_column::<i32>(1, 0, 3).unwrap(), vec![2, 4, 6]);
        assert!(matches!(
            table.get_block_of_rows::<f64>(2, 2),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            table.get_block_of_column_values::<f64>(2, 0, 1),
            Err(Error::OutOfRange { .. })
        ));

        let mut block = table
            .get_block_of_rows_mut::<i64>(1, 2, ReadWriteMode::ReadWrite)
            .unwrap();
        for v in block.as_mut_slice().unwrap() {
            *v *= 10;
        }
        block.release().unwrap();
        assert_eq!(
            table.read_rows::<i32>(0, 3).unwrap(),
            vec![1, 2, 30, 40, 50, 60]
        );
    }

    #[test]
    fn composite_descriptors_are_read_only() {
        let mut table = merged();
        let err = table
            .set_feature(0, FeatureDescriptor::continuous(NumericKind::Int32))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion(_)));
        assert_eq!(table.dictionary().len(), 2);
    }

    #[test]
    fn default_is_empty_homogen() {
        let table = Table::default();
        assert_eq!(table.layout(), TableLayout::Homogen);
        assert_eq!(table.n_elements(), 0);
        assert!(table.as_homogen().is_some());
        assert!(table.as_soa().is_none());
    }
}
