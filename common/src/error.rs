use thiserror::Error;

/// Everything that can go wrong between loading keys and confirming a swap.
///
/// `Connectivity` and `Config` are fatal at startup. The remaining variants
/// only abandon the swap attempt that produced them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("route unavailable after {attempts} attempts: {last}")]
    RouteUnavailable { attempts: usize, last: String },

    #[error("invalid route response: {0}")]
    MalformedRoute(String),

    #[error("token approval failed: {0}")]
    Approval(String),

    #[error("swap execution failed: {0}")]
    SwapExecution(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("operator input failed: {0}")]
    Prompt(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this error should stop the process rather than a single swap.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connectivity(_) | Error::Config(_))
    }
}
