use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Sqlx(sqlx::Error),

    #[from]
    Io(std::io::Error),

    /// A change notification that does not carry an object of the watched kind
    Malformed(String),

    /// The watch stream reported an error status (e.g. 410 Gone)
    WatchStatus { code: u16, message: String },

    /// A subscriber rejected an event
    Subscriber(String),

    /// Custom error message
    Custom(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
