use crate::{BufferPool, CancelToken, ErrorKind, MemPool, PoolConfig, ValidityMask};
use test_log::test;

#[test]
fn test_validity_popcount() {
    let mut mask = ValidityMask::all_valid(100);
    assert_eq!(mask.count_valid(), 100);
    assert_eq!(mask.count_null(), 0);
    for i in (0..100).step_by(3) {
        mask.set(i, false);
    }
    assert_eq!(mask.count_valid() + mask.count_null(), mask.len());
    assert_eq!(mask.count_null(), 34);
    assert!(!mask.get(99));
    assert!(mask.get(98));
}

#[test]
fn test_validity_push_and_truncate() {
    let mut mask = ValidityMask::new();
    for i in 0..130 {
        mask.push(i % 2 == 0);
    }
    assert_eq!(mask.len(), 130);
    assert_eq!(mask.count_valid(), 65);
    mask.truncate(65);
    assert_eq!(mask.len(), 65);
    assert_eq!(mask.count_valid(), 33);
    // Tail bits past the new length must not leak into popcounts.
    assert_eq!(mask.count_valid() + mask.count_null(), 65);
}

#[test]
fn test_cancel_token() {
    let token = CancelToken::new();
    assert!(token.check().is_ok());
    let shared = token.clone();
    shared.cancel();
    let err = token.check().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn test_pool_round_trip() {
    let pool = MemPool::in_memory();
    let a = pool.allocate_page(vec![1, 2, 3]).unwrap();
    let b = pool.allocate_page(vec![4; 100]).unwrap();
    let bytes = pool.pin(a).unwrap();
    assert_eq!(&bytes[..], &[1, 2, 3]);
    pool.unpin(a);
    let bytes = pool.pin(b).unwrap();
    assert_eq!(bytes.len(), 100);
    pool.unpin(b);
    pool.destroy_page(a);
    pool.destroy_page(b);
    let stats = pool.stats();
    assert_eq!(stats.pages_allocated, 2);
    assert_eq!(stats.pages_live, 0);
}

#[test]
fn test_pool_budget_without_spill_errors() {
    let pool = MemPool::new(PoolConfig {
        budget_bytes: 64,
        spill_dir: None,
    });
    pool.allocate_page(vec![0; 32]).unwrap();
    let err = pool.allocate_page(vec![0; 64]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn test_pool_spills_and_reloads() {
    let pool = MemPool::new(PoolConfig {
        budget_bytes: 256,
        spill_dir: Some(std::env::temp_dir()),
    });
    let mut ids = Vec::new();
    for i in 0..8u8 {
        ids.push(pool.allocate_page(vec![i; 128]).unwrap());
    }
    let stats = pool.stats();
    assert!(stats.pages_spilled >= 6, "spilled {}", stats.pages_spilled);
    assert!(stats.resident_bytes <= 256);
    // Every page survives the round trip through the spill file.
    for (i, id) in ids.iter().enumerate() {
        let bytes = pool.pin(*id).unwrap();
        assert_eq!(&bytes[..], &vec![i as u8; 128][..]);
        pool.unpin(*id);
    }
}
