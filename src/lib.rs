
//---------------------------------------
pub mod model;
pub mod notice;
pub mod error;
pub mod settings;
//---------------------------------------

//---------------------------------------
pub mod board;
pub mod sync;
pub mod runtime;

pub use board::{BoardError, Column, OrderedIds, Slot, TaskStore};
pub use sync::{BoardScope, Intent, Reconciled, SyncController, SyncState};
pub use runtime::BoardSession;
//---------------------------------------

//---------------------------------------
pub mod api;
pub mod session;
pub mod persist;

pub use api::{ApiClient, ApiError};
pub use session::Session;
//---------------------------------------

//---------------------------------------
pub mod team;
pub mod filter;

pub use team::TeamRoster;
//---------------------------------------
