//! Working-copy mirroring between editor clients and a workspace server.
//!
//! Clients capture document edits as canonical deltas, debounce them, and
//! send them one-way to the server, which keeps an in-memory mirror of each
//! file and reconciles it in the background. Results flow back addressed by
//! file location and are filtered by the editor that owns the document.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod text;
pub mod transport;

pub use client::{ClientLoop, ClientOptions, Document, DocumentChangeEvent, EditorEvent};
pub use config::{EffectiveSettings, TandemSettings, load_settings};
pub use error::{SyncError, SyncResult};
pub use server::{WorkingCopyRegistry, WorkingCopyService};
