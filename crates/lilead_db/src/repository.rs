//! Repository factory trait
//!
//! Repositories are built from an already-connected handle (usually a
//! [`DbClient`](crate::DbClient)); the factory hides which concrete
//! implementation is produced.

/// A trait for database repository factories
///
/// It is generic over the repository type and the configuration type.
pub trait RepositoryFactory<R, C> {
    /// Create a new repository instance
    ///
    /// # Arguments
    ///
    /// * `config` - The handle or configuration the repository is built from
    fn create_repository(&self, config: C) -> R;
}
