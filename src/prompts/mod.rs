//! Prompt module for LLM-based operations.
//!
//! This module provides prompt templates for the chat-completion scorer.

pub mod zero_shot;

pub use zero_shot::*;
