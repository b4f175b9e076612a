pub mod alias_engine;
pub mod builder;
pub mod condition;
pub mod executor;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
pub mod summarizer;
