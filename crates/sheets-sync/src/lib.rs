//! Google Sheets transport and OAuth credential provider for homeledger sync.

mod client;
mod config;
mod error;
mod oauth;
mod types;

#[cfg(test)]
mod test_support;

pub use client::SheetsClient;
pub use config::*;
pub use error::{Result, SheetsSyncError};
pub use oauth::{AuthorizationPrompt, GoogleOAuthProvider};
pub use types::*;
