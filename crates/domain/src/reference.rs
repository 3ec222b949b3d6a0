use std::sync::Arc;

use crate::catalog::Catalog;
use crate::customer::Directory;
use crate::driver::Roster;

/// Immutable reference data built once at startup and shared by every
/// saga and by the dashboard.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub catalog: Arc<Catalog>,
    pub directory: Arc<Directory>,
    pub roster: Arc<Roster>,
}

impl ReferenceData {
    pub fn new(catalog: Catalog, directory: Directory, roster: Roster) -> Self {
        Self {
            catalog: Arc::new(catalog),
            directory: Arc::new(directory),
            roster: Arc::new(roster),
        }
    }

    pub fn standard() -> Self {
        Self::new(Catalog::standard(), Directory::standard(), Roster::standard())
    }
}
