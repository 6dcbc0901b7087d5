use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::handle::IdentityHandle;

/// Boundary to the system identity library. The manager never speaks Kerberos
/// itself; everything that touches tickets goes through here.
#[async_trait]
pub trait IdentityLibrary: Send + Sync {
    /// Identity the process is currently running as.
    async fn current_user(&self) -> Result<IdentityHandle>;

    async fn login_from_keytab(&self, principal: &str, keytab: &Path) -> Result<IdentityHandle>;

    async fn login_from_ticket_cache(
        &self,
        principal: &str,
        ticket_cache: Option<&Path>,
    ) -> Result<IdentityHandle>;

    /// Whether the TGT of the last keytab login is close to expiry.
    /// Always `false` when the process never logged in from a keytab.
    async fn tgt_needs_renewal(&self) -> Result<bool>;

    async fn relogin_from_keytab(&self) -> Result<()>;
}
