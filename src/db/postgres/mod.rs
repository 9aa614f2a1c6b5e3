mod index;

pub use index::PostgresIndexRepo;
