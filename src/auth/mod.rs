//! Authentication against the Dropbox API
//!
//! # Examples
//!
//! ```rust,no_run
//! use archive_transfer::auth::{connect, prompt_token};
//! use archive_transfer::config::{Config, Settings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let settings = Settings::load(None).await?;
//!
//! let session = connect(&config, &settings.client, prompt_token).await?;
//! println!("Connected as {}", session.account.display_name);
//! # Ok(())
//! # }
//! ```

pub mod token;

// Re-export main public API
pub use token::{check_team, connect, prompt_token, resolve_token, Session, TokenSource};
