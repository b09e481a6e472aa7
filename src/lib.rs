//! AgentDex API Library
//!
//! JSON front-end for the AgentDex directory of AI agents and agencies. All
//! records live on the hosted data/auth/storage platform; this crate
//! validates input, aggregates ratings, filters and ranks listings, and
//! serves the results over HTTP.
//!
//! # Modules
//!
//! - `cnpj`: CNPJ check-digit validation and formatting.
//! - `ratings`: Aggregate rating calculator.
//! - `catalog`: Categories, specialties, listing filters and ranking.
//! - `compare`: Side-by-side comparison selection.
//! - `display`: pt-BR formatting of prices, counts, ratings and timestamps.
//! - `seo`: Page metadata and structured data.
//! - `media`: Image upload policy.
//! - `accounts`: Sign-in and sign-up workflows.
//! - `submissions`: Submit, edit and delete workflows.
//! - `verification`: Reviewer approval workflow.
//! - `profile`: The signed-in user's page.
//! - `directory`: Typed reads and writes of platform tables.
//! - `platform_client`: REST table client with circuit breaker.
//! - `services`: Auth and storage clients.
//! - `session`: Bearer token resolution.
//! - `circuit_breaker`: Circuit breaker for platform calls.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and routes.
//! - `models`: Platform records and request payloads.

pub mod cnpj;
pub mod ratings;

pub mod accounts;
pub mod catalog;
pub mod circuit_breaker;
pub mod compare;
pub mod config;
pub mod directory;
pub mod display;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod models;
pub mod platform_client;
pub mod profile;
pub mod seo;
pub mod services;
pub mod session;
pub mod submissions;
pub mod verification;
