//! Cookie-bearing portal session and member login.
//!
//! Provides the [`Transport`] seam every portal request goes through, its
//! `reqwest`-backed implementation ([`HttpSession`]), and the
//! [`SessionAuthenticator`] that turns a fresh session into a logged-in one.

pub mod authenticator;
pub mod error;
pub mod transport;

pub use authenticator::{AuthenticatedSession, SessionAuthenticator};
pub use error::{Result, SessionError};
pub use transport::{resolve_link, HttpSession, Page, Transport};
