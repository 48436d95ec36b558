//! Static bearer-token verification.

use std::collections::HashMap;

use async_trait::async_trait;
use quillcast_domain::UserId;

use crate::infrastructure::ports::{AuthError, TokenVerifier};

/// Verifies tokens against a fixed `token -> user` table.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }

    /// Parse `token:user-uuid` pairs separated by commas.
    ///
    /// Malformed pairs are skipped with a warning.
    pub fn from_pairs(raw: &str) -> Self {
        let mut tokens = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((token, user)) = pair.split_once(':') else {
                tracing::warn!("Ignoring auth token entry without a user id");
                continue;
            };
            match user.trim().parse::<UserId>() {
                Ok(user_id) if !token.trim().is_empty() => {
                    tokens.insert(token.trim().to_string(), user_id);
                }
                _ => tracing::warn!(user = %user.trim(), "Ignoring malformed auth token entry"),
            }
        }
        if tokens.is_empty() {
            tracing::warn!("No auth tokens configured; every session will be refused");
        }
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        self.tokens
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "6f1c2b1e-8a0e-4d4f-9a51-3f1a2d7c9b10";

    #[tokio::test]
    async fn known_token_resolves_to_user() {
        let verifier = StaticTokenVerifier::from_pairs(&format!("secret:{}", ALICE));
        let user = verifier.verify("secret").await.unwrap();
        assert_eq!(user, ALICE.parse::<UserId>().unwrap());
    }

    #[tokio::test]
    async fn empty_and_unknown_tokens_are_refused() {
        let verifier = StaticTokenVerifier::from_pairs(&format!("secret:{}", ALICE));
        assert_eq!(verifier.verify("  ").await, Err(AuthError::MissingCredential));
        assert_eq!(verifier.verify("guess").await, Err(AuthError::InvalidCredential));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let verifier = StaticTokenVerifier::from_pairs(&format!(
            "nouser, bad:not-a-uuid, :{ALICE}, ok:{ALICE}"
        ));
        assert_eq!(verifier.len(), 1);
    }
}
