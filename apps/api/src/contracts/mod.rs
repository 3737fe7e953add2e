pub mod analyzer;
pub mod cache;
pub mod detector;
pub mod files;
pub mod handlers;
pub mod intake;
pub mod pipeline;
pub mod prompts;
pub mod store;
pub mod summary;

#[cfg(test)]
pub mod testing;
