//! Pack, unpack and dispose through `Managed` and `Context`.

mod common;

use approx::assert_abs_diff_eq;
use numtab::{
    from_bytes, to_bytes, CodecConfig, Collection, Context, ContextConfig, Error, HomogenTable,
    HomogenTensor, KeyedCollection, Managed, NumericTable, NumericTensor, ObjectStatus,
    RowMergedTable, Table,
};

use common::{counting_table, init_tracing};

#[test]
fn pack_then_unpack_restores_table() {
    init_tracing();
    let ctx = Context::new(ContextConfig::builder().name("lifecycle").build());
    let object = Managed::new(counting_table(4, 3, 0.5), &ctx);
    let before = object.with(|t| t.read_rows::<f64>(0, 4).unwrap()).unwrap();

    object.pack().unwrap();
    assert_eq!(object.status(), ObjectStatus::Packed);
    let err = object.with(|t| t.n_rows()).unwrap_err();
    assert!(matches!(err, Error::IllegalState(msg) if msg.contains("packed")));

    object.unpack(&ctx).unwrap();
    let (n_rows, n_cols, after) = object
        .with(|t| (t.n_rows(), t.n_columns(), t.read_rows::<f64>(0, 4).unwrap()))
        .unwrap();
    assert_eq!((n_rows, n_cols), (4, 3));
    for (a, b) in before.iter().zip(&after) {
        assert_abs_diff_eq!(*a, *b);
    }
}

#[test]
fn dispose_twice_is_a_no_op() {
    let ctx = Context::default();
    let object = Managed::new(counting_table(1, 1, 0.0), &ctx);
    object.dispose();
    object.dispose();
    assert_eq!(object.status(), ObjectStatus::Terminated);
    assert!(matches!(
        object.with_mut(|t| t.assign(1.0f64)),
        Err(Error::IllegalState(msg)) if msg.contains("disposed")
    ));
    assert!(matches!(object.pack(), Err(Error::IllegalState(_))));
}

#[test]
fn release_all_disposes_every_live_object() {
    let ctx = Context::default();
    let tables: Vec<_> = (0..5)
        .map(|i| Managed::new(counting_table(2, 2, i as f64), &ctx))
        .collect();
    let tensor = Managed::new(HomogenTensor::from_vec(vec![2, 2], vec![1i32, 2, 3, 4]).unwrap(), &ctx);
    tables[0].pack().unwrap();
    assert_eq!(ctx.live_count(), 5);

    assert_eq!(ctx.release_all(), 5);
    assert_eq!(ctx.live_count(), 0);
    assert_eq!(tables[0].status(), ObjectStatus::Packed);
    assert!(tables[1..].iter().all(|t| t.status() == ObjectStatus::Terminated));
    assert_eq!(tensor.status(), ObjectStatus::Terminated);

    // packed objects survive and can join another context
    let other = Context::default();
    tables[0].unpack(&other).unwrap();
    assert_eq!(other.live_count(), 1);
}

#[test]
fn managed_handles_move_across_threads() {
    let ctx = Context::default();
    let object = Managed::new(counting_table(8, 2, 0.0), &ctx);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let object = object.clone();
            std::thread::spawn(move || {
                object.with_mut(|t| {
                    let v = t.value::<f64>(0, 0).unwrap();
                    t.set_value(0, 0, v + 1.0).unwrap();
                })
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(object.with(|t| t.value::<f64>(0, 0).unwrap()).unwrap(), 4.0);
}

#[test]
fn keyed_collection_keeps_first_position() {
    let mut keyed = KeyedCollection::new();
    keyed.set(5, counting_table(1, 1, 1.0));
    keyed.set(1, counting_table(1, 1, 3.0));
    keyed.set(5, counting_table(1, 1, 2.0));

    let bytes = to_bytes(&keyed, &CodecConfig::default()).unwrap();
    let back: KeyedCollection<HomogenTable> = from_bytes(&bytes, &CodecConfig::default()).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.keys(), &[5, 1]);
    assert_eq!(back.get(5).unwrap().value::<f64>(0, 0).unwrap(), 2.0);
    assert_eq!(back.value_at(1).unwrap().value::<f64>(0, 0).unwrap(), 3.0);
}

#[test]
fn collection_of_mixed_tables_packs() {
    let ctx = Context::default();
    let merged = RowMergedTable::from_tables(vec![
        counting_table(2, 2, 0.0).into(),
        counting_table(1, 2, 4.0).into(),
    ])
    .unwrap();
    let items: Collection<Table> = vec![Table::from(counting_table(1, 3, 0.0)), merged.into()].into();
    let object = Managed::new(items, &ctx);
    object.pack().unwrap();
    let bytes = object.packed_bytes().unwrap();
    object.unpack(&ctx).unwrap();

    let rows = object
        .with(|c| c.get(1).unwrap().read_column::<f64>(1, 0, 3).unwrap())
        .unwrap();
    assert_eq!(rows, vec![1.0, 3.0, 5.0]);

    let decoded: Collection<Table> = from_bytes(&bytes, &CodecConfig::default()).unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn unpack_with_checksum_disabled_skips_verification() {
    let config = CodecConfig::builder().verify_checksum(false).build();
    let ctx = Context::new(ContextConfig::builder().codec(config).build());
    let object = Managed::new(HomogenTensor::from_vec(vec![3], vec![1.0f32, 2.0, 3.0]).unwrap(), &ctx);
    object.pack().unwrap();
    object.unpack(&ctx).unwrap();
    assert_eq!(object.with(|t| t.dims().to_vec()).unwrap(), vec![3]);
}
