//! Gatehouse - Fixed-Window Request Rate Limiting
//!
//! This crate implements the rate limiter that guards a website's public and
//! admin API routes. Requests are counted per client and route class in
//! fixed windows; over-budget requests are rejected with HTTP 429 before they
//! reach any downstream resource.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
