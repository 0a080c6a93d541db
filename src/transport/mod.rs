//! Remote-transport collaborators: Swift/Keystone URL resolution. The
//! authentication internals are an external collaborator (spec section 2,
//! Non-goals); this module only defines the seam the dispatcher calls
//! through and a resolver that always declines, so the crate is complete
//! and testable without a real Keystone deployment.

pub mod swift;
