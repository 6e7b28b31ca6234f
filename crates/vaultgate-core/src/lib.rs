//! # Vaultgate Core
//!
//! Core building blocks for the Vaultgate secrets-mediation gateway: the
//! validated configuration model, the deny-by-default policy evaluator, the
//! sliding-window rate limiter, the environment-backed secret resolver, and
//! the sanitizer applied to everything that crosses the trust boundary
//! outward.
//!
//! The crate is deliberately I/O-free apart from environment reads in the
//! resolver: audit persistence lives in `vaultgate-audit` and the outbound
//! HTTP client in `vaultgate-exec`.

pub mod action;
pub mod config;
pub mod constants;
pub mod error;
pub mod identifiers;
pub mod policy;
pub mod ratelimit;
pub mod sanitize;
pub mod secrets;

pub use action::ActionKind;
pub use config::{
    Policy, RateLimit, RawConfig, SecretMapping, VaultConfig, VaultSettings,
};
pub use error::{ErrorCode, GatewayError, GatewayResult};
pub use identifiers::{EnvVarName, IdError, SecretId};
pub use policy::{Decision, PolicyEvaluator};
pub use ratelimit::{LimitDecision, RateLimiter};
pub use sanitize::Sanitizer;
pub use secrets::{Availability, SecretResolver, SecretString};
