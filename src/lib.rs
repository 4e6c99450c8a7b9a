//! # Wikidex
//!
//! An incremental wiki ingestion and hybrid retrieval engine for
//! knowledge-base question answering.
//!
//! Wikidex fetches every page in a wiki space, normalizes and chunks the
//! content, embeds only what is new or changed since the last run, and
//! answers questions over the indexed corpus with a hybrid retriever
//! (semantic similarity plus URL/phone extraction) and a chat completion
//! model. Everything is exposed through a CLI and a JSON HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │   Wiki   │──▶│   Ingestion    │──▶│  SQLite   │
//! │ REST API │   │ Clean+Chunk    │   │  chunks   │
//! └──────────┘   │ Hash+Embed     │   └────┬─────┘
//!                └──────┬────────┘        │
//!                       ▼                 ▼
//!                ┌────────────┐    ┌────────────┐
//!                │  Registry   │    │  Retrieval  │
//!                │ (JSON file) │    │ + Chat LLM  │
//!                └────────────┘    └─────┬──────┘
//!                                        │
//!                          ┌─────────────┤
//!                          ▼             ▼
//!                    ┌──────────┐  ┌──────────┐
//!                    │   CLI    │  │   HTTP   │
//!                    │(wikidex) │  │  (JSON)  │
//!                    └──────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wikidex sync                  # ingest the configured space
//! wikidex chat                  # interactive Q&A over the index
//! wikidex serve                 # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Wiki REST client |
//! | [`text`] | Markup cleaning and word-window chunking |
//! | [`registry`] | Content fingerprints and the ingestion registry |
//! | [`ingest`] | Incremental ingestion pipeline |
//! | [`embed`] | Embedding providers and vector utilities |
//! | [`store`] | Similarity store (SQLite) |
//! | [`extract`] | URL and phone-number extraction |
//! | [`retrieve`] | Hybrid retriever |
//! | [`llm`] | Chat completion client |
//! | [`answer`] | Conversational pipeline with rolling memory |
//! | [`server`] | JSON HTTP server |

pub mod answer;
pub mod config;
pub mod embed;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod registry;
pub mod retrieve;
pub mod server;
pub mod store;
pub mod text;
