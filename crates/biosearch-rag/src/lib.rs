#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod client;
pub mod context;
pub mod engine;
pub mod prompt;

pub use client::ChatClient;
pub use context::{build_context, ContextBlock};
pub use engine::{Answer, AnswerEngine};
