//! HTTP service that explains Mozambican exam questions step by step with a
//! locally hosted Gemma 3 model.

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod explainer;
pub mod generation;
pub mod model;
pub mod sampling;
pub mod tokenizer;
