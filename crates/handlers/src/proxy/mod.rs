//! Proxy pallet: calls dispatched on behalf of another account.

mod handler;

pub use handler::ProxyHandler;
