//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Identity of the gRPC service exposed by the gateway.
    pub service: ServiceConfig,

    /// JWT validation tuning shared by all issuers.
    pub jwt: JwtConfig,

    /// Trusted token issuers and their verification keys.
    pub issuers: Vec<IssuerConfig>,

    /// Logical backend operations and their protocol bindings.
    pub operations: Vec<OperationConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for an HTTP request/response) in seconds.
    pub request_secs: u64,

    /// Upper bound on a single backend dispatch in seconds.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            backend_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// gRPC service identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fully-qualified service name, e.g. `endpoints.examples.bookstore.Bookstore`.
    pub name: Option<String>,
}

/// JWT validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Allowed clock skew for `exp` and `nbf` checks, in seconds.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self { leeway_secs: 60 }
    }
}

/// Family of a PEM-encoded public key.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PemKeyType {
    #[default]
    Rsa,
    Ec,
    Ed,
}

/// A trusted issuer and the key material used to verify its tokens.
///
/// Exactly one of `secret`, `public_key_pem` or `jwks` must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssuerConfig {
    /// Value expected in the token `iss` claim.
    pub issuer: String,

    /// Shared HMAC secret (raw UTF-8 bytes).
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM-encoded public key.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Key family of `public_key_pem`.
    #[serde(default)]
    pub key_type: PemKeyType,

    /// Inline JSON Web Key Set document.
    #[serde(default)]
    pub jwks: Option<String>,

    /// Accepted `alg` header values. Empty means every algorithm of the key family.
    #[serde(default)]
    pub algorithms: Vec<String>,
}

/// A logical backend operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationConfig {
    /// Operation identity passed to the dispatcher (e.g. "GetShelf").
    pub name: String,

    /// gRPC method name (e.g. "GetShelf").
    #[serde(default)]
    pub grpc_method: Option<String>,

    /// HTTP/JSON binding.
    #[serde(default)]
    pub http: Option<HttpBindingConfig>,

    /// JWT requirement. Absent means anonymous access.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// HTTP method + path template binding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpBindingConfig {
    /// HTTP method (GET, POST, ...).
    pub method: String,

    /// Path template, e.g. `/v1/shelves/{shelf_id}/books/{book_id}`.
    pub path: String,

    /// Where the JSON body lands in the message: `*` or a field name.
    #[serde(default)]
    pub body: Option<String>,

    /// Header conditions evaluated after template matching.
    #[serde(default)]
    pub headers: Vec<DiscriminatorConfig>,

    /// Query parameter conditions evaluated after template matching.
    #[serde(default)]
    pub query: Vec<DiscriminatorConfig>,
}

/// A header or query parameter condition. No value means presence only.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DiscriminatorConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Authorization requirement of one operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Issuer whose tokens are accepted.
    pub issuer: String,

    /// Accepted audiences. Empty means no audience restriction.
    #[serde(default)]
    pub audiences: Vec<String>,
}
