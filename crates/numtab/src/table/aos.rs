//! Array-of-structures table: one byte array of fixed-size records.
//!
//! The record layout is described by a [`RecordSchema`] supplied at
//! construction: one [`FieldDescriptor`] per column giving its kind and
//! byte offset inside a record. Columns are the schema fields in
//! declaration order, i.e. the order they were passed to the schema.
//!
//! ```text
//! record (16 bytes): | x: f64 @0 | id: i32 @8 | w: f32 @12 |
//! storage:           | record 0 | record 1 | record 2 | ...
//! ```
//!
//! Values are stored little-endian. Fields of one column are never
//! contiguous across records, so every block is a converted copy.

use serde::{Deserialize, Serialize};

use crate::access::{staging, BlockDescriptor, NumericTable, ReadWriteMode};
use crate::dictionary::{DataDictionary, FeatureDescriptor};
use crate::dtype::{Element, NumericKind, Scalar};
use crate::error::{check_index, check_range, Error, Result};

/// Name, kind and byte offset of one record field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: NumericKind,
    pub offset: usize,
}

/// Field layout of one record.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldDescriptor>,
    record_size: usize,
}

impl RecordSchema {
    /// Lay fields out back to back in declaration order, without padding.
    pub fn packed<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, NumericKind)>,
        S: Into<String>,
    {
        let mut offset = 0;
        let fields = fields
            .into_iter()
            .map(|(name, kind)| {
                let field = FieldDescriptor {
                    name: name.into(),
                    kind,
                    offset,
                };
                offset += kind.size();
                field
            })
            .collect();
        Self {
            fields,
            record_size: offset,
        }
    }

    /// Use explicit offsets, e.g. to mirror a `#[repr(C)]` struct.
    ///
    /// Fails if a field extends past `record_size` or two fields overlap.
    pub fn with_offsets(fields: Vec<FieldDescriptor>, record_size: usize) -> Result<Self> {
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(fields.len());
        for field in &fields {
            let end = field
                .offset
                .checked_add(field.kind.size())
                .ok_or(Error::out_of_range("field offset", field.offset, record_size))?;
            if end > record_size {
                return Err(Error::out_of_range("field end", end, record_size));
            }
            spans.push((field.offset, end));
        }
        spans.sort_unstable();
        if let Some(pair) = spans.windows(2).find(|w| w[1].0 < w[0].1) {
            return Err(Error::UnsupportedConversion(format!(
                "record fields overlap at byte {}",
                pair[1].0
            )));
        }
        Ok(Self {
            fields,
            record_size,
        })
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Size of one record in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Position of the field called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A record type that can be stored in an [`AosTable`].
///
/// `values` must return one scalar per schema field, in schema order.
pub trait Record {
    fn schema() -> RecordSchema;

    fn values(&self) -> Vec<Scalar>;
}

/// Table stored as an array of fixed-layout records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AosTable {
    bytes: Vec<u8>,
    schema: RecordSchema,
    n_rows: usize,
    dictionary: DataDictionary,
}

impl AosTable {
    /// Zero-filled table of `n_rows` records.
    pub fn with_schema(schema: RecordSchema, n_rows: usize) -> Result<Self> {
        let len = schema
            .record_size
            .checked_mul(n_rows)
            .ok_or(Error::AllocationFailure { elements: usize::MAX })?;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure { elements: len })?;
        bytes.resize(len, 0);
        Ok(Self::assemble(bytes, schema, n_rows))
    }

    /// Wrap raw record bytes.
    ///
    /// `bytes.len()` must be a multiple of the record size.
    pub fn from_bytes(schema: RecordSchema, bytes: Vec<u8>) -> Result<Self> {
        let n_rows = if schema.record_size == 0 {
            0
        } else {
            bytes.len() / schema.record_size
        };
        if n_rows * schema.record_size != bytes.len() {
            return Err(Error::mismatch(
                "record bytes",
                n_rows * schema.record_size,
                bytes.len(),
            ));
        }
        Ok(Self::assemble(bytes, schema, n_rows))
    }

    /// Encode typed records using their schema.
    pub fn from_records<R: Record>(records: &[R]) -> Result<Self> {
        let mut table = Self::with_schema(R::schema(), records.len())?;
        for (row, record) in records.iter().enumerate() {
            table.set_record(row, &record.values())?;
        }
        Ok(table)
    }

    /// Rebuild a decoded table. The schema is validated again and the byte
    /// length must match `n_rows` exactly, which also covers records of
    /// size zero.
    pub(crate) fn from_parts(
        schema: RecordSchema,
        n_rows: usize,
        bytes: Vec<u8>,
        dictionary: DataDictionary,
    ) -> Result<Self> {
        let schema = RecordSchema::with_offsets(schema.fields, schema.record_size)?;
        let len = schema
            .record_size
            .checked_mul(n_rows)
            .ok_or(Error::AllocationFailure { elements: usize::MAX })?;
        if len != bytes.len() {
            return Err(Error::mismatch("record bytes", len, bytes.len()));
        }
        let mut table = Self::assemble(bytes, schema, n_rows);
        if dictionary.len() != table.schema.n_fields() {
            return Err(Error::mismatch(
                "dictionary length",
                table.schema.n_fields(),
                dictionary.len(),
            ));
        }
        for (index, feature) in dictionary.iter().enumerate() {
            table.set_feature(index, *feature)?;
        }
        Ok(table)
    }

    fn assemble(bytes: Vec<u8>, schema: RecordSchema, n_rows: usize) -> Self {
        let dictionary = DataDictionary::from_features(
            schema
                .fields
                .iter()
                .map(|f| FeatureDescriptor::continuous(f.kind))
                .collect(),
        );
        Self {
            bytes,
            schema,
            n_rows,
            dictionary,
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Raw record bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Overwrite every field of record `row`.
    pub fn set_record(&mut self, row: usize, values: &[Scalar]) -> Result<()> {
        check_index("row", row, self.n_rows)?;
        if values.len() != self.schema.n_fields() {
            return Err(Error::mismatch("record fields", self.schema.n_fields(), values.len()));
        }
        for (field, value) in values.iter().enumerate() {
            self.write(row, field, *value);
        }
        Ok(())
    }

    /// Field `field` of record `row` converted to `T`.
    pub fn value<T: Element>(&self, row: usize, field: usize) -> Result<T> {
        check_index("row", row, self.n_rows)?;
        check_index("column", field, self.schema.n_fields())?;
        Ok(T::from_scalar(self.read(row, field)))
    }

    pub fn set_value<T: Element>(&mut self, row: usize, field: usize, value: T) -> Result<()> {
        check_index("row", row, self.n_rows)?;
        check_index("column", field, self.schema.n_fields())?;
        self.write(row, field, value.to_scalar());
        Ok(())
    }

    /// Replace the descriptor of column `index`.
    ///
    /// The kind is fixed by the record layout and cannot change.
    pub fn set_feature(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        check_index("column", index, self.schema.n_fields())?;
        let field_kind = self.schema.fields[index].kind;
        if feature.kind != field_kind {
            return Err(Error::UnsupportedConversion(format!(
                "record field {} is {field_kind}, descriptor says {}",
                self.schema.fields[index].name, feature.kind
            )));
        }
        self.dictionary.set(index, feature)
    }

    #[inline]
    fn field_at(&self, row: usize, field: usize) -> (usize, NumericKind) {
        let f = &self.schema.fields[field];
        (row * self.schema.record_size + f.offset, f.kind)
    }

    #[inline]
    fn read(&self, row: usize, field: usize) -> Scalar {
        read_field(&self.bytes, &self.schema, row, field)
    }

    #[inline]
    fn write(&mut self, row: usize, field: usize, value: Scalar) {
        let (at, kind) = self.field_at(row, field);
        value.convert(kind).write_le(&mut self.bytes[at..]);
    }
}

fn read_field(bytes: &[u8], schema: &RecordSchema, row: usize, field: usize) -> Scalar {
    let f = &schema.fields[field];
    Scalar::read_le(f.kind, &bytes[row * schema.record_size + f.offset..])
}

fn write_field(bytes: &mut [u8], schema: &RecordSchema, row: usize, field: usize, value: Scalar) {
    let f = &schema.fields[field];
    value
        .convert(f.kind)
        .write_le(&mut bytes[row * schema.record_size + f.offset..]);
}

impl NumericTable for AosTable {
    #[inline]
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    fn n_columns(&self) -> usize {
        self.schema.n_fields()
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
        let n_cols = self.n_columns();
        let values = staging(count * n_cols, ReadWriteMode::ReadOnly, |dst| {
            fill_rows(&self.bytes, &self.schema, start, count, dst)
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
        let n_cols = self.n_columns();
        let schema = &self.schema;
        let bytes = &mut self.bytes;
        let values = staging(count * n_cols, mode, |dst| {
            fill_rows(bytes, schema, start, count, dst)
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            n_cols,
            mode,
            Box::new(move |src: &[T]| {
                for i in 0..count {
                    for j in 0..n_cols {
                        write_field(bytes, schema, start + i, j, src[i * n_cols + j].to_scalar());
                    }
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
        check_index("column", feature, self.n_columns())?;
        check_range("row", start, count, self.n_rows)?;
        let values = staging(count, ReadWriteMode::ReadOnly, |dst| {
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = T::from_scalar(self.read(start + i, feature));
            }
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
        check_index("column", feature, self.n_columns())?;
        check_range("row", start, count, self.n_rows)?;
        let schema = &self.schema;
        let bytes = &mut self.bytes;
        let values = staging(count, mode, |dst| {
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = T::from_scalar(read_field(bytes, schema, start + i, feature));
            }
        })?;
        Ok(BlockDescriptor::converted(
            values,
            count,
            1,
            mode,
            Box::new(move |src: &[T]| {
                for (i, value) in src.iter().enumerate() {
                    write_field(bytes, schema, start + i, feature, value.to_scalar());
                }
                Ok(())
            }),
        ))
    }

    fn assign<T: Element>(&mut self, value: T) -> Result<()> {
        for row in 0..self.n_rows {
            for field in 0..self.schema.n_fields() {
                self.write(row, field, value.to_scalar());
            }
        }
        Ok(())
    }
}

fn fill_rows<T: Element>(bytes: &[u8], schema: &RecordSchema, start: usize, count: usize, dst: &mut [T]) {
    let n_cols = schema.n_fields();
    for i in 0..count {
        for j in 0..n_cols {
            dst[i * n_cols + j] = T::from_scalar(read_field(bytes, schema, start + i, j));
        }
    }
}
