//! Built-in components
//!
//! - [`synapse`]: the Synapse homeserver (`synapse`)
//! - [`mas`]: Matrix Authentication Service (`matrixAuthenticationService`)

pub mod mas;
pub mod synapse;
pub mod uri;

use crate::strategy::Component;

/// Every built-in component, in migration order
#[must_use]
pub fn builtin() -> Vec<Component> {
    vec![synapse::component(), mas::component()]
}
