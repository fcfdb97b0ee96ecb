//! Ordered and keyed collections of serializable objects.

use std::collections::HashMap;

use crate::codec::{self, CollectionPayload, KeyedCollectionPayload, ObjectKind, ObjectPayload};
use crate::error::{check_index, Error, Result};
use crate::serialization::Serializable;

/// Ordered sequence that owns its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        check_index("collection index", index, self.items.len())?;
        Ok(&self.items[index])
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        check_index("collection index", index, self.items.len())?;
        Ok(&mut self.items[index])
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Default> Collection<T> {
    /// Store `value` at `index`.
    ///
    /// Overwrites an existing element, appends at `len()`, and pads with
    /// default values when `index` lies past the end.
    pub fn set(&mut self, index: usize, value: T) {
        if index < self.items.len() {
            self.items[index] = value;
            return;
        }
        self.items.resize_with(index, T::default);
        self.items.push(value);
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serializable> Serializable for Collection<T> {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::Collection
    }

    fn element_count(&self) -> u64 {
        self.items.len() as u64
    }

    fn to_payload(&self) -> Result<ObjectPayload> {
        let items = self.items.iter().map(T::to_payload).collect::<Result<_>>()?;
        Ok(ObjectPayload::Collection(CollectionPayload { items }))
    }

    fn from_payload(payload: ObjectPayload) -> Result<Self> {
        match payload {
            ObjectPayload::Collection(CollectionPayload { items }) => {
                let items = items.into_iter().map(T::from_payload).collect::<Result<_>>()?;
                Ok(Self { items })
            }
            other => Err(codec::kind_mismatch(ObjectKind::Collection, other.kind())),
        }
    }
}

/// Map from integer keys to owned elements.
///
/// Positional access and iteration follow first-insertion order.
/// Overwriting a key keeps its position.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedCollection<T> {
    keys: Vec<i64>,
    values: Vec<T>,
    index: HashMap<i64, usize>,
}

impl<T> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> KeyedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.index.contains_key(&key)
    }

    pub fn get(&self, key: i64) -> Result<&T> {
        let &position = self.index.get(&key).ok_or(Error::KeyNotFound(key))?;
        Ok(&self.values[position])
    }

    pub fn get_mut(&mut self, key: i64) -> Result<&mut T> {
        let &position = self.index.get(&key).ok_or(Error::KeyNotFound(key))?;
        Ok(&mut self.values[position])
    }

    /// Insert `value` under `key`, replacing and returning any previous value.
    pub fn set(&mut self, key: i64, value: T) -> Option<T> {
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.values[position], value)),
            None => {
                self.index.insert(key, self.keys.len());
                self.keys.push(key);
                self.values.push(value);
                None
            }
        }
    }

    pub fn key_at(&self, position: usize) -> Result<i64> {
        check_index("collection position", position, self.keys.len())?;
        Ok(self.keys[position])
    }

    pub fn value_at(&self, position: usize) -> Result<&T> {
        check_index("collection position", position, self.values.len())?;
        Ok(&self.values[position])
    }

    /// Remove `key`, shifting later entries down one position.
    pub fn remove(&mut self, key: i64) -> Result<T> {
        let position = self.index.remove(&key).ok_or(Error::KeyNotFound(key))?;
        self.keys.remove(position);
        let value = self.values.remove(position);
        for (i, k) in self.keys.iter().enumerate().skip(position) {
            self.index.insert(*k, i);
        }
        Ok(value)
    }

    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &T)> + '_ {
        self.keys.iter().copied().zip(&self.values)
    }
}

impl<T> FromIterator<(i64, T)> for KeyedCollection<T> {
    fn from_iter<I: IntoIterator<Item = (i64, T)>>(iter: I) -> Self {
        let mut collection = Self::default();
        for (key, value) in iter {
            collection.set(key, value);
        }
        collection
    }
}

impl<T: Serializable> Serializable for KeyedCollection<T> {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::KeyedCollection
    }

    fn element_count(&self) -> u64 {
        self.keys.len() as u64
    }

    fn to_payload(&self) -> Result<ObjectPayload> {
        let items = self.values.iter().map(T::to_payload).collect::<Result<_>>()?;
        Ok(ObjectPayload::KeyedCollection(KeyedCollectionPayload {
            keys: self.keys.clone(),
            items,
        }))
    }

    fn from_payload(payload: ObjectPayload) -> Result<Self> {
        let KeyedCollectionPayload { keys, items } = match payload {
            ObjectPayload::KeyedCollection(payload) => payload,
            other => return Err(codec::kind_mismatch(ObjectKind::KeyedCollection, other.kind())),
        };
        if keys.len() != items.len() {
            return Err(codec::DeserializeError::CorruptPayload(format!(
                "{} keys for {} items",
                keys.len(),
                items.len()
            ))
            .into());
        }
        let mut collection = Self::default();
        for (key, item) in keys.into_iter().zip(items) {
            if collection.set(key, T::from_payload(item)?).is_some() {
                return Err(
                    codec::DeserializeError::CorruptPayload(format!("duplicate key {key}")).into(),
                );
            }
        }
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DeserializeError;
    use crate::table::HomogenTable;

    #[test]
    fn set_overwrites_appends_and_grows() {
        let mut c: Collection<i32> = vec![1, 2].into();
        c.set(0, 10);
        c.set(2, 3);
        c.set(5, 6);
        assert_eq!(c.clone().into_vec(), vec![10, 2, 3, 0, 0, 6]);
        assert!(matches!(c.get(6), Err(Error::OutOfRange { index: 6, bound: 6, .. })));
    }

    #[test]
    fn keyed_set_keeps_first_position() {
        let mut c = KeyedCollection::new();
        c.set(5, "A");
        c.set(1, "C");
        assert_eq!(c.set(5, "B"), Some("A"));

        assert_eq!(c.len(), 2);
        assert_eq!((c.key_at(0).unwrap(), c.key_at(1).unwrap()), (5, 1));
        assert_eq!(*c.get(5).unwrap(), "B");
        assert_eq!(*c.value_at(1).unwrap(), "C");
        assert!(matches!(c.get(7), Err(Error::KeyNotFound(7))));
        assert!(matches!(c.key_at(2), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn remove_reindexes_later_entries() {
        let mut c: KeyedCollection<u8> = [(3, 30), (1, 10), (2, 20)].into_iter().collect();
        assert_eq!(c.remove(3).unwrap(), 30);
        assert_eq!(*c.get(2).unwrap(), 20);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![(1i64, &10u8), (2, &20)]);
        assert!(matches!(c.remove(3), Err(Error::KeyNotFound(3))));
    }

    #[test]
    fn collections_of_tables_round_trip() {
        let t = |v: f64| HomogenTable::from_vec(vec![v; 4], 2, 2).unwrap();
        let ordered: Collection<HomogenTable> = vec![t(1.0), t(2.0)].into();
        assert_eq!(Collection::from_payload(ordered.to_payload().unwrap()).unwrap(), ordered);

        let keyed: KeyedCollection<HomogenTable> = [(9, t(1.0)), (-4, t(3.0))].into_iter().collect();
        let back = KeyedCollection::<HomogenTable>::from_payload(keyed.to_payload().unwrap()).unwrap();
        assert_eq!(back.keys(), &[9, -4]);
        assert_eq!(back, keyed);
    }

    #[test]
    fn duplicate_keys_are_corrupt() {
        let item = HomogenTable::from_vec(vec![1i32], 1, 1).unwrap().to_payload().unwrap();
        let payload = ObjectPayload::KeyedCollection(KeyedCollectionPayload {
            keys: vec![1, 1],
            items: vec![item.clone(), item],
        });
        let err = KeyedCollection::<HomogenTable>::from_payload(payload).unwrap_err();
        assert!(matches!(err, Error::Deserialize(DeserializeError::CorruptPayload(_))));
    }
}
