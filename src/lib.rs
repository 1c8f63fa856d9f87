//! Spotify Play Counter Library
//!
//! Polls the Spotify "currently playing" endpoint and keeps a persistent
//! per-track play count. Access is granted once at startup through the OAuth
//! authorization code flow, completed by a short-lived local callback server.
//!
//! # Modules
//!
//! - `api` - HTTP handler of the local callback server
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration loading from the environment and `.env` files
//! - `error` - Error types of every layer
//! - `logging` - Structured logging handle
//! - `management` - Persistent track table
//! - `server` - Single-use local HTTP listener for OAuth callbacks
//! - `spotify` - Token flows and the currently playing sampler
//! - `tracking` - Play counting state machine and polling loop
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod management;
pub mod server;
pub mod spotify;
pub mod tracking;
pub mod types;
pub mod utils;

/// A convenient Result type alias for the command layer.
///
/// Library modules return their own error types from [`error`]; commands
/// collapse them into a boxed error before reporting to the operator.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Tracking plays into {}", path.display());
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
/// success!("Authentication completed successfully");
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
/// Only for fatal startup errors: the process exits with status 1 right
/// after printing.
///
/// # Example
///
/// ```
/// error!("Cannot load configuration: {}", e);
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
/// warning!("Failed to open browser, open {} manually", url);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
