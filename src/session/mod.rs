//! Live interview session orchestration
//!
//! This module provides the `InterviewSession` state machine that manages:
//! - the permission → ready → connecting → connected → ended lifecycle
//! - gating of the start action (permission, mic probe, required fields,
//!   eligibility)
//! - reconciliation of transport, timer, visibility, and user events
//! - the single at-most-once outcome write for scored sessions

mod persist;
mod session;
mod state;

pub use persist::PersistenceCoordinator;
pub use session::{Collaborators, InterviewPlan, InterviewSession, SessionSnapshot};
pub use state::{EndReason, SessionMode, SessionStatus};
