pub mod cancel;
pub mod chunker;
pub mod glossary;
pub mod metrics;
pub mod pricing;
pub mod prompt;
pub mod provider;
pub mod storage;
pub mod word_count;
