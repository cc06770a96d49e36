/// Router Module Index
///
/// The API surface is split by guard: `public` needs no session, `upload`
/// is the praktikan-only report submission flow. Every other path falls through
/// to the guarded page renderer registered in `create_router`.

/// The liveness probe, auth endpoints and the session snapshot.
pub mod public;

/// Report submission endpoints. Each handler runs the upload page's guard.
pub mod upload;
