//! Port interfaces implemented by the provider and application layers.

mod providers;
mod repositories;
mod services;

pub use providers::*;
pub use repositories::*;
pub use services::*;
