//! Natural-language and voice commands for spreadsheets: a closed action
//! vocabulary, the model round trip that produces it, and the executor that
//! applies it to a document.

pub mod address;
#[cfg(feature = "server")]
pub mod api;
pub mod assistant;
pub mod audit;
pub mod document;
pub mod error;
pub mod executor;
pub mod llm;
pub mod parser;
pub mod paths;
pub mod prompt;
pub mod schema;
pub mod settings;
pub mod storage;
pub mod translate;
pub mod transport;
