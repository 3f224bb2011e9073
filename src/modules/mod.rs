pub mod books;

use std::sync::Arc;

use bookstore_db::Store;
use bookstore_kernel::ModuleRegistry;

use books::repository::MongoBookStore;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, store: &Store) {
    registry.register_custom(books::create_module(Arc::new(MongoBookStore::new(store))));
}
