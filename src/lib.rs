// Environment-driven configuration
pub mod config;

// Persisted credential record and storage backends
pub mod credentials;

// Authorization handshake, token exchange, and lifecycle management
pub mod auth;
