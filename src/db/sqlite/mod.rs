mod index;

pub use index::SqliteIndexRepo;
