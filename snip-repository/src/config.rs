//! Repository configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{RepositoryError, RepositoryResult};
use std::env;

/// Default collection holding snip documents
pub const DEFAULT_COLLECTION: &str = "snips";

/// Default number of documents per query page
pub const DEFAULT_PAGE_SIZE: usize = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Repository configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Collection holding snip documents
    pub collection: String,

    /// Documents per query page requested from the store
    pub page_size: usize,

    /// PostgreSQL URL (only needed by the PostgreSQL backend)
    pub database_url: Option<String>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `SNIPS_ENV`: test, development, production (default: development)
    /// - `SNIPS_COLLECTION`: collection name (default: snips)
    /// - `SNIPS_PAGE_SIZE`: documents per page (default: 100)
    /// - `DATABASE_URL`: PostgreSQL URL (optional)
    pub fn from_env() -> RepositoryResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let collection = Self::load_collection()?;
        let page_size = Self::load_page_size()?;
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        Ok(Self {
            collection,
            page_size,
            database_url,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: 10,
            database_url: None,
            environment: Environment::Test,
        }
    }

    /// The PostgreSQL URL, or a configuration error if unset
    pub fn require_database_url(&self) -> RepositoryResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| RepositoryError::Configuration("DATABASE_URL is not set".to_string()))
    }

    fn load_environment() -> RepositoryResult<Environment> {
        let env_str = env::var("SNIPS_ENV").unwrap_or_else(|_| "development".to_string());
        Environment::parse(&env_str)
    }

    fn load_collection() -> RepositoryResult<String> {
        let collection = env::var("SNIPS_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());
        if collection.trim().is_empty() {
            return Err(RepositoryError::Configuration(
                "SNIPS_COLLECTION must not be empty".to_string(),
            ));
        }
        Ok(collection)
    }

    fn load_page_size() -> RepositoryResult<usize> {
        match env::var("SNIPS_PAGE_SIZE") {
            Ok(val) => parse_page_size(&val),
            Err(_) => Ok(DEFAULT_PAGE_SIZE),
        }
    }
}

fn parse_page_size(val: &str) -> RepositoryResult<usize> {
    match val.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(RepositoryError::Configuration(format!(
            "Invalid SNIPS_PAGE_SIZE value: {}",
            val
        ))),
    }
}

impl Environment {
    fn parse(value: &str) -> RepositoryResult<Self> {
        match value.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(RepositoryError::Configuration(format!(
                "Invalid SNIPS_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            database_url: None,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
