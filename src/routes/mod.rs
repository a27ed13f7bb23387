/// Router Module Index
///
/// Organizes the routes by the protection class the route gate assigns them. The gate
/// itself is a single middleware over the merged router (see `create_router`); these
/// modules only group paths.

/// Pages and endpoints open to everyone, including the auth-only sign-in/sign-up pages.
pub mod public;

/// Member pages. Anonymous visitors are redirected to sign-in by the route gate.
pub mod authenticated;

/// Admin pages, nested under `/admin`.
pub mod admin;

/// Mutating actions under `/api`. Not classified by the route gate: every handler runs
/// the action authorizer itself.
pub mod api;
