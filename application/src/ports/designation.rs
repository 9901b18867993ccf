//! Designation extraction port
//!
//! After every moderator turn, an auxiliary model call reads the moderator's
//! text and names the participant who should speak next.

use super::llm_gateway::GatewayError;
use async_trait::async_trait;

#[async_trait]
pub trait DesignationExtractor: Send + Sync {
    /// Return the designated speaker name exactly as written after the `@`,
    /// or an empty string when the text designates nobody.
    async fn extract(&self, moderator_text: &str) -> Result<String, GatewayError>;
}
