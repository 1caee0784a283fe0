//! External service integrations.

pub mod upstream_client {
    pub use crate::upstream_client::*;
}
