pub mod bundle;
pub mod token;

pub use bundle::CredentialBundle;
pub use token::Token;
