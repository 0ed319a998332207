//! External service integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod provider {
    pub use crate::provider::*;
}

pub mod collector {
    pub use crate::collector::*;
}

pub mod notifier {
    pub use crate::notifier::*;
}
