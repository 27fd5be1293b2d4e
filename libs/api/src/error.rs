/// What went wrong in a broker, store or codec call.
///
/// A `Format` failure drops one message, an `Io` failure on poll is retried,
/// `Config` stops the bridge at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Topic outside `<source>.<db>.<collection>`, bad table settings.
    Config,
    /// Broker or store unreachable.
    Io,
    /// Message value that does not parse or fails validation.
    Format,
    /// Missing table, unsubscribed partition, offset out of range.
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Error of `StorageSink`, `BrokerClient`, `DocumentParser` and
/// `SchemaValidator` calls. The pipeline wraps it with the partition or
/// table it happened on.
#[derive(Clone)]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
}

impl ClientError {
    fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Logic, msg)
    }

    /// Bad configuration or a topic that breaks the naming contract.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, msg)
    }

    /// Unparseable or invalid message content.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Worth retrying the same call later (broker/store unreachable).
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Io
    }
}

impl std::fmt::Debug for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<String> for ClientError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ClientError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::format_err(e.to_string())
    }
}

impl From<std::str::Utf8Error> for ClientError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::format_err(format!("invalid utf-8: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_assigned_by_conversion() {
        let io: ClientError = std::io::Error::other("broken pipe").into();
        assert_eq!(io.kind(), ErrorKind::Io);

        let json: ClientError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(json.kind(), ErrorKind::Format);

        assert!(io.is_transient());
        assert!(!json.is_transient());

        let plain: ClientError = "boom".into();
        assert_eq!(plain.kind(), ErrorKind::Logic);
        assert_eq!(plain.to_string(), "boom");
    }

    #[test]
    fn debug_includes_kind() {
        let e = ClientError::config("bad topic");
        assert_eq!(format!("{e:?}"), "[config] bad topic");
    }
}
