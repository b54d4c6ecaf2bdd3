//! Error taxonomy shared by every dictionary operation.

use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum DictError {
    /// `add` on a key that is already present.
    #[error("key already exists")]
    KeyExists,
    /// `delete` on a key that is not present.
    #[error("key not found")]
    KeyNotFound,
    /// Advisory: an explicit resize was requested while a rehash is running.
    #[error("rehash already in progress")]
    AlreadyRehashing,
    /// Advisory: an explicit resize was requested while resizing is disabled.
    #[error("resizing is disabled")]
    ResizeDisabled,
    /// An unsafe iterator was released after the dictionary changed under it.
    #[error("dictionary mutated while an unsafe iterator was live")]
    IteratorMisuse,
}
