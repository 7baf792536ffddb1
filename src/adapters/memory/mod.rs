mod library;

pub use library::InMemoryLibrary;
