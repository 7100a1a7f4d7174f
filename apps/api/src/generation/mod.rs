// Resume generation: prompt construction, response extraction, and the workflow
// orchestrator that ties them to the stores and the LLM client.
// All LLM calls go through llm_client — nothing here talks HTTP directly.

pub mod extractor;
pub mod handlers;
pub mod prompts;
pub mod single_flight;
pub mod workflow;
