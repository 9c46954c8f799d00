//! Registry credential model and the redacting secret wrapper it carries.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
