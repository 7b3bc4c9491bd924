//! # loreforge
//!
//! Generation core for fantasy-setting descriptive text: prompts go out to a
//! local LLM backend, unreliable free-text completions come back, and this
//! crate turns them into structured JSON values the content generators can
//! render.
//!
//! The interesting part is the tolerant JSON-repair pipeline. Local models
//! routinely hand back:
//! - JSON wrapped in markdown code fences, with or without a language tag
//! - unescaped quotes embedded inside description strings
//! - literal newlines and tabs inside string values
//! - missing commas between array elements
//! - smart quotes, em dashes, and stray control characters
//!
//! ## Quick start
//!
//! ```rust
//! use loreforge::parse_json_response;
//!
//! let response =
//!     "Sure! Here's the tavern:\n```json\n{\"tavern\": {\"name\": \"The Rusty Anchor\", \"innkeeper\": \"Finn\"}}\n```";
//!
//! let value = parse_json_response(response, "generateTavernJSON").unwrap();
//! assert_eq!(value["tavern"]["name"], "The Rusty Anchor");
//! ```
//!
//! Generating the text in the first place goes through the transport client,
//! which retries transient backend failures with exponential backoff:
//!
//! ```ignore
//! use loreforge::{GenerationClient, parse_json_response, prompt};
//!
//! let client = GenerationClient::from_env();
//! let raw = client
//!     .generate_json(&prompt::json_safe_prompt("Create a tavern for Bramblewick."))
//!     .await?;
//! let value = parse_json_response(&raw, "generateTavernJSON")?;
//! ```
//!
//! ## Failure model
//!
//! The pipeline never guesses silently. Repair passes run in a fixed order
//! from safest to most destructive and the first structurally valid parse
//! wins; when everything fails, a clearly labeled, warn-logged emergency
//! extractor scrapes a minimal result keyed by [`CallerKind`], and if even
//! that finds nothing the caller gets an error and must supply its own
//! fallback content. Validating field-level shape ("has a `taverns` array")
//! is always the caller's job.

pub mod client;
pub mod config;
pub mod error;
pub mod parser;
pub mod prompt;

pub use client::GenerationClient;
pub use config::{GenerationConfig, RetryPolicy, SamplingOptions};
pub use error::{GenerationError, ParseError};
pub use parser::{parse_json_response, CallerKind};
