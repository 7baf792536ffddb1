mod catalog_service;

pub use catalog_service::{get_book, register_book, revise_book};
