//! Interfaces to external collaborators.
//!
//! Identity validation, member profile lookup, and quiz-content
//! generation are owned by other systems. This module defines the traits
//! the gateway calls through, plus the minimal implementations used by
//! tests and single-node development runs.

pub mod auth;
pub mod directory;
pub mod generator;

pub use auth::{AuthContext, Authenticator, HandshakeAuthenticator};
pub use directory::{EchoDirectory, MemberDirectory};
pub use generator::{CannedGenerator, GeneratedQuiz, GenerationRequest, QuizGenerator};
