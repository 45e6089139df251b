#![allow(clippy::collapsible_if)]

pub mod credentials;
pub mod error;
pub mod render;
pub mod tls;
pub mod version;
pub mod webhook;
pub mod websocket;

pub use error::Error;
