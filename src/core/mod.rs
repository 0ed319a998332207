// Domain-layer modules and shared errors/models
pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}

pub mod queue {
    pub use crate::queue::*;
}

pub mod processor {
    pub use crate::processor::*;
}

pub mod orchestrator {
    pub use crate::orchestrator::*;
}

pub mod report {
    pub use crate::report::*;
}
