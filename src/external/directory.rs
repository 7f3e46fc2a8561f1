//! Member profile collaborator interface.
//!
//! Member bookkeeping (profiles, points, avatars) is external. The
//! gateway only needs display names for the membership lists attached to
//! room events.

use async_trait::async_trait;

use crate::domain::MemberId;

/// Resolves member identities to display names.
#[async_trait]
pub trait MemberDirectory: Send + Sync + std::fmt::Debug {
    /// Returns the display name for a member, falling back to the raw
    /// identity when unknown.
    async fn display_name(&self, member: &MemberId) -> String;
}

/// Directory that echoes the identity as the display name. Used in tests
/// and when no profile service is wired.
#[derive(Debug, Clone, Default)]
pub struct EchoDirectory;

#[async_trait]
impl MemberDirectory for EchoDirectory {
    async fn display_name(&self, member: &MemberId) -> String {
        member.as_str().to_string()
    }
}
