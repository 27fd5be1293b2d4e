#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("client: {0}")]
    Client(#[from] bridge_api::ClientError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
