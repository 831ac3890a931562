//! Per-cadence run locks.

mod common;

use chasing_core::{
    error::ChasingError,
    lock::{lock_name, CadenceLock, LockService, SqliteLockService},
};
use common::fixture;

#[test]
fn lock_names_are_namespaced() {
    assert_eq!(lock_name("web-1", 7, 12), "web-1:chasing_cadence:7:12");
}

/// A held lock refuses a second holder until it is released.
#[test]
fn second_acquire_fails_until_release() {
    let f = fixture();
    let locks = SqliteLockService::new(&f.store, f.clock.as_ref());

    let held = CadenceLock::acquire(&locks, "test", 1, 3, 60).unwrap();
    assert_eq!(held.name(), "test:chasing_cadence:1:3");

    let err = CadenceLock::acquire(&locks, "test", 1, 3, 60).err().unwrap();
    assert!(matches!(err, ChasingError::LockUnavailable { ref name } if name == "test:chasing_cadence:1:3"));

    // Other cadences and other namespaces are independent.
    assert!(CadenceLock::acquire(&locks, "test", 1, 4, 60).is_ok());
    assert!(CadenceLock::acquire(&locks, "staging", 1, 3, 60).is_ok());

    assert!(held.release().unwrap());
    assert!(CadenceLock::acquire(&locks, "test", 1, 3, 60).is_ok());
}

/// Dropping the guard releases the lock.
#[test]
fn drop_releases_the_lock() {
    let f = fixture();
    let locks = SqliteLockService::new(&f.store, f.clock.as_ref());
    {
        let _held = CadenceLock::acquire(&locks, "test", 1, 3, 60).unwrap();
        assert!(f.store.lock_owner("test:chasing_cadence:1:3").unwrap().is_some());
    }
    assert!(f.store.lock_owner("test:chasing_cadence:1:3").unwrap().is_none());
}

/// An expired lease can be taken over; the old holder then releases nothing.
#[test]
fn expired_lock_can_be_taken_over() {
    let f = fixture();
    let locks = SqliteLockService::new(&f.store, f.clock.as_ref());
    let name = lock_name("test", 1, 3);

    let stale = locks.try_acquire(&name, 60).unwrap().unwrap();
    assert!(locks.try_acquire(&name, 60).unwrap().is_none());

    f.clock.advance_days(1);
    let fresh = locks.try_acquire(&name, 60).unwrap().unwrap();
    assert_ne!(stale, fresh);

    assert!(!locks.release(&name, &stale).unwrap());
    assert_eq!(f.store.lock_owner(&name).unwrap(), Some(fresh.clone()));
    assert!(locks.release(&name, &fresh).unwrap());
}
