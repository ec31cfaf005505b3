pub mod github;
pub mod openai;
pub mod slack;

pub use github::GithubClient;
pub use openai::{CompletionClient, OpenAiClient};
pub use slack::SlackNotifier;
