//! Session-aware API client with token lifecycle management.
//!
//! This crate provides:
//! - [`SessionClient`]: HTTP execution with bearer-token attachment,
//!   single-flight refresh-on-401, and a one-shot retry after refresh
//! - An explicit FSM for session status, with a snapshot accessor and
//!   a change-notification callback
//! - The [`HttpTransport`] seam (reqwest in production, scripted
//!   implementations in tests)
//! - [`ApiClient`]: the typed request/decode layer

mod api;
mod client;
mod descriptor;
mod error;
mod session_fsm;
mod transport;

pub use api::ApiClient;
pub use client::{SessionClient, StatusCallback};
pub use descriptor::RequestDescriptor;
pub use error::{ApiError, ApiResult};
pub use session_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus,
    StatusChangedPayload,
};
pub use transport::{
    HttpTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse,
};
