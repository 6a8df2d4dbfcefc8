mod config;
pub mod completion;
pub mod handler;
pub mod orchestrator;
pub mod prompts;

pub use completion::{
    ClientFactory, CompletionClient, CompletionError, CompletionRequest, OpenAiClientFactory,
    OpenAiSettings,
};
pub use config::{init_default_config, ServiceConfig};
pub use handler::{HandlerConfig, HandlerResponse, ProcessRequest, RequestHandler};
pub use orchestrator::{BatchOrchestrator, MergedResult, OrchestrateError};
pub use prompts::{Mode, PromptSet};
