//! Shared data models for the CRISPy web service.
//!
//! A [`Session`] is one analysis request persisted as a hash in the shared
//! key-value store; a [`Queue`] is a FIFO list of session keys handed to
//! workers. Neither caches anything locally: every getter reads the store and
//! every setter writes it.

pub mod clock;
pub mod codec;
pub mod error;
pub mod ids;
pub mod keys;
pub mod queue;
pub mod session;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    crispy_store::{KvStore, MemoryStore, StoreError},
    error::{Error, Result},
    ids::{IdSource, RandomIds},
    keys::SessionId,
    queue::Queue,
    session::{Session, SessionOptions, SessionOrigin, SessionPatch, SessionRecord, Sessions},
};
