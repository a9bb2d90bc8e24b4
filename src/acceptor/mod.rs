//! TCP acceptor: admission-gated accept loops over bound endpoints.
//!
//! - [`TcpAcceptor`] binds endpoints and owns their accept loops
//! - [`AdmissionGate`] bounds concurrently live sessions
//! - [`SessionFactory`] injects the accept/new-session transport hooks

mod accept;
mod bindings;
mod factory;
mod gate;
mod tcp;

pub use bindings::ListenerTag;
pub use factory::{SessionFactory, TcpSessionFactory};
pub use gate::{AdmissionGate, GateClosed};
pub use tcp::TcpAcceptor;
