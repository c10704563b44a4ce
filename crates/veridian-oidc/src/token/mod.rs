//! Token issuance, introspection, and revocation.

pub mod introspection;
pub mod jwt;
pub mod revocation;
pub mod service;

pub use introspection::{IntrospectionResponse, IntrospectionService};
pub use jwt::{AccessTokenClaims, CertificateConfirmation, IdTokenClaims, JwtCodec};
pub use revocation::RevocationService;
pub use service::{TokenConfig, TokenRequest, TokenResponse, TokenService};
