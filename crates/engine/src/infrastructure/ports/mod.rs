//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Record storage (in-memory or SQLite)
//! - The streaming text generation backend
//! - Publishing platforms (one adapter per platform)
//! - Credential verification
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::ContentRepo;

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    ExternalPost, GenerationPort, PlatformAdapter, PostRequest, TokenStream, TokenVerifier,
    EXCERPT_CHARS,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{MockGenerationPort, MockPlatformAdapter, MockTokenVerifier};
#[cfg(test)]
pub use repos::MockContentRepo;
#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{AuthError, GenerationError, PublishError, RepoError};
