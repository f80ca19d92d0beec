//! Admin session authentication

mod session;

pub use session::{AdminPrincipal, SessionService};
