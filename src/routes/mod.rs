/// Router Module Index
///
/// Splits routing by access level. Authentication is applied per module (via an Axum
/// route layer) so a protected route cannot be registered without it by accident.

/// Routes open to anonymous clients: landing page, health check and account flows.
pub mod public;

/// Routes that require a logged-in user. Ownership checks live in the handlers.
pub mod authenticated;
