//! Protocol core: the Memory Region Registry, Remote Memory Registry,
//! Context/Slot Manager, Connection State Machine, Transfer Engine, and
//! Receive Dispatcher (spec components B, C, E, F, G) wired together
//! behind a single [`channel::Channel`] type. `netfr-host` and
//! `netfr-client` each drive one `Channel` per element of `N_CHANNELS`.

pub mod api;
pub mod channel;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod region;
pub mod remote;
pub mod slot;
pub mod transfer;

pub use channel::{Channel, ChannelEvent, Role};
