// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ignis blueprint editor core.
//!
//! - [`store`]: the graph store, owner of every editable graph
//! - [`history`]: undo/redo over graph snapshots
//! - [`binder`]: relay between graphs and the host runtime
//! - [`settings`]: RON editor settings
//!
//! ## Architecture
//!
//! The canvas UI and the collaboration layer sit outside this crate. They
//! drive the [`GraphStore`] and observe its [`GraphChange`] notifications;
//! the interpreter and code generator only ever see immutable snapshots.

pub mod binder;
pub mod history;
pub mod logging;
pub mod operation;
pub mod selection;
pub mod settings;
pub mod store;

pub use binder::{BinderHost, BindingError, ChannelTransport, RuntimeBinder, Transport, TransportError};
pub use history::{History, HistoryError};
pub use operation::{GraphOperation, NodeUpdate};
pub use selection::Selection;
pub use settings::{EditorSettings, SettingsError};
pub use store::{ChangeOrigin, GraphChange, GraphStore, StoreError, StoreObserver};
