//! Solar Loan Qualification API Library
//!
//! This library provides the core functionality for the solar loan
//! qualification API: ZIP-to-location resolution, the ordered utility-data
//! provider chain with heuristic rate extraction, census demographics, the
//! deterministic financial calculator and decision engine, and the
//! generative-AI narration with its non-AI fallback.
//!
//! # Modules
//!
//! - `audit`: Append-only JSONL audit sink and log readers.
//! - `cache_validator`: Checksum-validated cache entries.
//! - `calculator`: Pure solar sizing/cost/payment/savings math.
//! - `config`: Configuration management.
//! - `credit`: Offline Vantage-score-by-ZIP lookup.
//! - `db`: Database connection and pool management.
//! - `demographics`: Census ACS demographics provider.
//! - `engine`: Qualification decision table and orchestration.
//! - `errors`: Error handling types.
//! - `extractor`: Pattern-based rate extraction from scraped text.
//! - `handlers`: HTTP request handlers.
//! - `location`: ZIP-to-location resolution.
//! - `models`: Core data models.
//! - `narrative`: Gemini narration and template explanations.
//! - `providers`: Ordered utility-data provider chain.
//! - `storage`: Qualification outcome persistence.

pub mod audit;
pub mod cache_validator;
pub mod calculator;
pub mod config;
pub mod credit;
pub mod db;
pub mod demographics;
pub mod engine;
pub mod errors;
pub mod extractor;
pub mod handlers;
pub mod location;
pub mod models;
pub mod narrative;
pub mod providers;
pub mod storage;
