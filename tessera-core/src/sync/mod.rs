//! Synchronization primitives for the actor substrate.
//!
//! The substrate protects its hot read-mostly structures (registry tables,
//! group subscriber sets, pool worker vectors) with a spinning
//! reader/writer lock instead of an OS mutex: critical sections are a few
//! loads and stores, so parking a thread would cost more than spinning.
//!
//! # Components
//!
//! - [`SharedSpinlock`] - Three-state spinning rwlock (shared / exclusive /
//!   upgradable)
//! - [`SpinReadGuard`], [`SpinWriteGuard`], [`SpinUpgradeGuard`] - RAII
//!   guards

pub mod spinlock;

pub use spinlock::{SharedSpinlock, SpinReadGuard, SpinUpgradeGuard, SpinWriteGuard};
