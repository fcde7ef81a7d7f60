pub mod config_io;
pub mod doc_io;
pub mod ledger_io;
pub mod recovery;
pub mod scheduler;
pub mod store;
pub mod watcher;
