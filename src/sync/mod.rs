//! Client-side synchronization: approval gate, polled cache and dashboard.

pub mod approval;
pub mod cache;
pub mod dashboard;
pub mod poller;

pub use approval::{
    ApprovalEvent, ApprovalGate, ApprovalHandle, ApprovalTransition, ApprovalWatcher, GateDecision,
};
pub use cache::{LocalCache, SyncEntry, Ticket};
pub use dashboard::{DashboardSession, Notification};
pub use poller::{PollEvent, Poller};
