//! `SQLite` adapters for the narration coordinator.
//!
//! Implements the `narrate_core` storage ports:
//!
//! - [`SqliteChapterRepository`] - chapter history (`ChapterRepository`)
//! - [`SqliteProgressStore`] - fast key/value markers (`ProgressStore`)
//! - [`SqliteSettingsRepository`] - narration settings (`SettingsRepository`)
//!
//! Open a database with [`setup_database`] and wire the adapters with
//! [`StorageFactory::build_repos`].

#![deny(unsafe_code)]

pub mod factory;
pub mod repositories;
pub mod setup;

pub use factory::{Repos, StorageFactory};

#[cfg(any(test, feature = "test-utils"))]
pub use factory::TestDb;

pub use repositories::{SqliteChapterRepository, SqliteProgressStore, SqliteSettingsRepository};

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
