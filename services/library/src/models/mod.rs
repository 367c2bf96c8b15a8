//! Bookshelf domain models

pub mod book;
pub mod user;

pub use book::{Book, BookUpdate, NewBook, SortOrder, normalize_tags, split_tags};
pub use user::{LoginCredentials, NewUser, User, UserProfile};
