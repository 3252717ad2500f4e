//! Handle Table Tests - Issuance, Resolution and Release
//!
//! These tests verify the handle table at its boundaries:
//! - Idempotent issuance per value identity
//! - Release semantics and stale handles
//! - Exhaustion of a configured id space
//! - Concurrent issuance
//!
//! ============================================================================
//! EACH TEST FINDS SPECIFIC BOOKKEEPING BUGS - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use common::{run_concurrently, HookFixture};
use gc_hook::{Handle, HandleTable, HookConfig, HookError};
use std::collections::HashSet;
use std::sync::Arc;

/// ============================================================================
/// ISSUANCE TESTS
/// ============================================================================

/// Test repeated alloc of the same value
///
/// **Bug this finds:** Duplicate handles for one value
/// **Invariant verified:** alloc(v) == alloc(v) while v is allocated
#[test]
fn test_alloc_is_idempotent() {
    // Arrange
    let fixture = HookFixture::new();
    let value = Arc::new(String::from("record"));

    // Act
    let first = fixture.handles.alloc_any(&value).unwrap();
    let second = fixture.handles.alloc_any(&value.clone()).unwrap();

    // Assert
    assert_eq!(first, second);
    assert_eq!(fixture.handles.len(), 1);
}

/// Test equal but separately allocated values
///
/// **Bug this finds:** Keying the reverse map by value instead of identity
#[test]
fn test_equal_values_get_distinct_handles() {
    // Arrange
    let fixture = HookFixture::new();
    let a = Arc::new(7u64);
    let b = Arc::new(7u64);

    // Act
    let ha = fixture.handles.alloc_any(&a).unwrap();
    let hb = fixture.handles.alloc_any(&b).unwrap();

    // Assert
    assert_ne!(ha, hb);
    assert!(Arc::ptr_eq(&fixture.handles.resolve_as::<u64>(ha).unwrap(), &a));
    assert!(Arc::ptr_eq(&fixture.handles.resolve_as::<u64>(hb).unwrap(), &b));
}

/// ============================================================================
/// RELEASE TESTS
/// ============================================================================

/// Test dealloc then resolve
///
/// **Bug this finds:** Stale entries after release, double release accepted
#[test]
fn test_dealloc_then_resolve_is_absent() {
    // Arrange
    let fixture = HookFixture::new();
    let value = Arc::new(vec![1u8, 2, 3]);
    let handle = fixture.handles.alloc_any(&value).unwrap();

    // Act
    let freed = fixture.handles.dealloc(handle);

    // Assert
    assert!(freed);
    assert!(fixture.handles.resolve(handle).is_none());
    assert!(!fixture.handles.dealloc(handle), "second dealloc succeeded");
    assert!(!fixture.handles.contains(&(value as Arc<dyn std::any::Any + Send + Sync>)));
}

/// Test resolving ids that were never issued
///
/// **Bug this finds:** Panics or garbage on unknown ids
#[test]
fn test_resolve_unknown_is_absent() {
    let fixture = HookFixture::new();

    assert!(fixture.handles.resolve(Handle(0)).is_none());
    assert!(fixture.handles.resolve(Handle(u32::MAX)).is_none());
    assert!(!fixture.handles.dealloc(Handle(12345)));
}

/// Test two records with one released
///
/// **Invariant verified:** Releasing one handle leaves others resolvable
#[test]
fn test_two_records_release_one() {
    // Arrange
    let fixture = HookFixture::new();
    let alice = Arc::new(String::from("alice"));
    let bob = Arc::new(String::from("bob"));
    let ha = fixture.handles.alloc_any(&alice).unwrap();
    let hb = fixture.handles.alloc_any(&bob).unwrap();

    // Act
    let resolved_a = fixture.handles.resolve_as::<String>(ha).unwrap();
    let resolved_b = fixture.handles.resolve_as::<String>(hb).unwrap();
    fixture.handles.dealloc(ha);

    // Assert
    assert!(Arc::ptr_eq(&resolved_a, &alice));
    assert!(Arc::ptr_eq(&resolved_b, &bob));
    assert!(fixture.handles.resolve(ha).is_none());
    assert_eq!(
        fixture.handles.resolve_as::<String>(hb).as_deref().map(String::as_str),
        Some("bob")
    );
}

/// ============================================================================
/// BOUNDED ID SPACE TESTS
/// ============================================================================

/// Test exhaustion of a small id space
///
/// **Bug this finds:** Infinite loop when every id is in use
#[test]
fn test_exhausted_table_fails_instead_of_looping() {
    // Arrange
    let fixture = HookFixture::with_config(HookConfig {
        handle_limit: 4,
        ..Default::default()
    });
    let values: Vec<_> = (0..4).map(|i| Arc::new(i as u16)).collect();
    for value in &values {
        fixture.handles.alloc_any(value).unwrap();
    }

    // Act
    let result = fixture.handles.alloc_any(&Arc::new(99u16));

    // Assert
    match result {
        Err(HookError::ResourceExhausted { .. }) => {},
        other => panic!("expected ResourceExhausted, got {:?}", other),
    }
    // Values already in the table still resolve to their handle.
    assert!(fixture.handles.alloc_any(&values[0]).is_ok());
}

/// ============================================================================
/// CONCURRENCY TESTS
/// ============================================================================

/// Test concurrent issuance from many threads
///
/// **Bug this finds:** Race conditions handing out the same id twice
#[test]
fn test_concurrent_alloc_unique() {
    // Arrange
    let table: Arc<HandleTable<usize>> = Arc::new(HandleTable::new());
    let shared = table.clone();

    // Act
    let per_thread = run_concurrently(8, move |thread_id| {
        (0..200)
            .map(|i| {
                let value = Arc::new(thread_id * 1000 + i);
                let handle = shared.alloc(&value).unwrap();
                (handle, value)
            })
            .collect::<Vec<_>>()
    });

    // Assert
    let all: Vec<_> = per_thread.into_iter().flatten().collect();
    let unique: HashSet<Handle> = all.iter().map(|(h, _)| *h).collect();
    assert_eq!(unique.len(), all.len(), "duplicate handles issued");
    assert_eq!(table.len(), all.len());
    for (handle, value) in &all {
        assert!(Arc::ptr_eq(&table.resolve(*handle).unwrap(), value));
    }
}
