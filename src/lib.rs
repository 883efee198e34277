//! Music Box Backend Library
//!
//! This library provides the backend for lightweight "music box" clients. A box
//! obtains an anonymous identity and a bearer token, links that identity to a
//! Spotify account through the OAuth 2.0 authorization-code flow, and then
//! controls playback through this service, which renews expired Spotify
//! credentials on its own.
//!
//! # Modules
//!
//! - `api` - HTTP handlers, authentication guards and error mapping
//! - `config` - Configuration management and environment variables
//! - `management` - Identity persistence and cookie-identified sessions
//! - `server` - Application state, router assembly and listener
//! - `spotify` - Spotify OAuth and Web API client implementation
//! - `types` - Data structures and type definitions
//! - `utils` - Token generation and comparison helpers
//!
//! # Example
//!
//! ```
//! use musicbox::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> musicbox::Res<()> {
//!     config::load_env();
//!     let config = config::Config::from_env()?;
//!     server::start_api_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used on the startup path of the binary, where any failure is fatal and
/// only needs to be reported. Library operations return their own typed
/// errors instead.
///
/// # Type Parameters
///
/// - `T` - The success type returned on successful operations
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Loading configuration...");
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Listening on {}", addr);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Reserved for fatal startup conditions such as missing configuration.
/// Request-time failures are logged through `tracing` and mapped to HTTP
/// responses instead.
///
/// # Example
///
/// ```
/// error!("Missing required environment variable: {}", var_name);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("No .env file found, using process environment only");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
