//! Process identity: who the manager is when it talks to the backends.
//!
//! - `handle`: the per-round logged-in principal
//! - `library`: boundary to the system identity library
//! - `kinit`: library implementation driving the host's Kerberos tools
//! - `login`: strategy selection (keytab, ticket cache, ambient)

pub mod handle;
pub mod kinit;
pub mod library;
pub mod login;

pub use handle::{IdentityHandle, LoginMethod};
pub use library::IdentityLibrary;
pub use login::{LoginSelector, LoginStrategy};
