//! Configuration management for the image service.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap subcommands
//! - Environment variables with the `IMAGE_SERVICE_` prefix (and `JWT_SECRET`)
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `IMAGE_SERVICE_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMAGE_SERVICE_PORT` - Server port (default: 3000)
//! - `IMAGE_SERVICE_UPLOAD_DIR` - Storage root for images (default: uploads)
//! - `JWT_SECRET` - Shared secret for bearer tokens
//! - `IMAGE_SERVICE_JPEG_QUALITY` - JPEG re-encode quality (default: 90)
//! - `IMAGE_SERVICE_MAX_UPLOAD_BYTES` - Upload body limit (default: 10 MiB)
//! - `IMAGE_SERVICE_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::edit::{DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::server::DEFAULT_MAX_UPLOAD_BYTES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default storage root, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default token lifetime in seconds for the `token` command.
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Service - upload, serve and edit images over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-service")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Issue a signed bearer token for the protected routes.
    Token(TokenConfig),
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMAGE_SERVICE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMAGE_SERVICE_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding uploaded images. Created if missing.
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR, env = "IMAGE_SERVICE_UPLOAD_DIR")]
    pub upload_dir: PathBuf,

    /// Maximum upload request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "IMAGE_SERVICE_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Shared secret used to verify bearer tokens.
    ///
    /// If not provided the server still starts, but every protected request
    /// fails with 500 until a secret is configured.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    // =========================================================================
    // Editing Configuration
    // =========================================================================
    /// JPEG quality used when re-encoding edited JPEG images (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "IMAGE_SERVICE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMAGE_SERVICE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// A missing secret is not an error here; the caller warns about it.
    pub fn validate(&self) -> Result<(), String> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err(
                "Upload directory is required. Set --upload-dir or IMAGE_SERVICE_UPLOAD_DIR"
                    .to_string(),
            );
        }

        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err(format!(
                "jpeg_quality must be between {} and {}",
                MIN_JPEG_QUALITY, MAX_JPEG_QUALITY
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured secret, treating an empty value as unset.
    pub fn jwt_secret(&self) -> Option<&str> {
        self.jwt_secret.as_deref().filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Token Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Shared secret to sign with. Must match the server's.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Value for the `sub` claim.
    #[arg(long)]
    pub subject: Option<String>,

    /// Token lifetime in seconds. 0 issues a token without expiry.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL)]
    pub ttl: u64,

    /// Extra claims as key=value pairs (can be repeated).
    ///
    /// Values that parse as JSON (numbers, booleans) keep their type;
    /// everything else is a string.
    #[arg(long = "claim", value_name = "KEY=VALUE")]
    pub claims: Vec<String>,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret is required. Set --secret or JWT_SECRET".to_string());
        }
        Ok(())
    }

    /// Parse the `--claim` arguments into name/value pairs.
    pub fn parse_claims(&self) -> Result<Vec<(String, Value)>, String> {
        self.claims
            .iter()
            .map(|pair| {
                let (key, raw) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid claim '{}': expected KEY=VALUE", pair))?;
                if key.is_empty() {
                    return Err(format!("Invalid claim '{}': empty key", pair));
                }

                let value = match serde_json::from_str::<Value>(raw) {
                    Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
                    _ => Value::String(raw.to_string()),
                };
                Ok((key.to_string(), value))
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
