//! SQLite backend for the GameKey store engine.
//!
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
