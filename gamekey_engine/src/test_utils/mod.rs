//! Shared fixtures for the engine's own tests and for downstream crates that want to drive the engine against a
//! throwaway SQLite database.
mod faulty_db;
mod prepare_env;
mod recording_notifier;
mod stub_provider;
mod test_store;

pub use faulty_db::FaultyDatabase;
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
pub use recording_notifier::RecordingNotifier;
pub use stub_provider::StubPaymentProvider;
pub use test_store::{TestPurchaseApi, TestReconcilerApi, TestStore};
