//! The SQLite backend for the delivery engine.
pub mod db;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;
