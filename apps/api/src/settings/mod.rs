// Settings, profile and template endpoints: thin wrappers over the store.
// Saving provider settings also resets the cached LLM client.

pub mod handlers;
