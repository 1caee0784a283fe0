// Domain-layer modules and shared errors/models
pub mod quote_gateway {
    pub use crate::quote_gateway::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod token_manager {
    pub use crate::token_manager::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
