use std::{borrow::Cow, fmt::Display};

/// The error type of the crate.
#[derive(Debug)]
pub enum Error {
    /// `MscEncoder::compress` was called with data that contains the
    /// stream-switch delimiter.
    DelimiterInData,
    /// A compression or decompression stream was used after `finish`.
    StreamClosed,
    /// The caller-supplied stream-switch delimiter contains a duplicate byte.
    DelimiterNotUnique(Vec<u8>),
    /// The MSC header (`stream_switch` JSON) could not be parsed.
    MalformedHeader(serde_json::Error),
    /// An escaped record contained an invalid `Z`-escape sequence.
    MalformedEscape,
    /// A SQLite file did not start with the `"SQLite format 3\0"` signature.
    BadHeader,
    /// A B-tree page had a first byte that is not one of the four known page types.
    UnknownPageType(u8),
    /// The database still had free-list pages after `VACUUM`.
    FreePagesPresent,
    /// The database's page count exceeded the configured ceiling.
    TooManyPages {
        /// The file's actual page count.
        page_count: u64,
        /// The configured ceiling that was exceeded.
        max_pages: u64,
    },
    /// The database uses reserved bytes per page, which this partitioner does not model.
    ReservedBytesUnsupported(u8),
    /// IO error with optional context message.
    Io(std::io::Error, Cow<'static, str>),
    /// Error opening a file.
    FileOpen(std::io::Error, String),
    /// A `rusqlite` driver error (opening the connection, running `VACUUM`, reading `sqlite_schema`).
    Sqlite(String),
    /// A `quick_xml` parsing error.
    Xml(String),
    /// A row's decoded text/blob column was not valid per its serial type.
    MalformedRecord(Cow<'static, str>),
    /// Other error with description; an escape hatch for faults that do not
    /// warrant a dedicated variant.
    Other(Cow<'static, str>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::io(value)
    }
}

impl Error {
    #[inline]
    pub(crate) fn other<S: Into<Cow<'static, str>>>(s: S) -> Self {
        Self::Other(s.into())
    }

    #[inline]
    pub(crate) fn io(e: std::io::Error) -> Self {
        Self::io_msg(e, "")
    }

    #[inline]
    pub(crate) fn io_msg(e: std::io::Error, msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Io(e, msg.into())
    }

    pub(crate) fn file_open(e: std::io::Error, filename: impl Into<String>) -> Self {
        Self::FileOpen(e, filename.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DelimiterInData => write!(f, "data passed to compress() contains the stream-switch delimiter"),
            Self::StreamClosed => write!(f, "stream used after finish()"),
            Self::DelimiterNotUnique(d) => write!(f, "stream-switch delimiter {d:?} contains a duplicate byte"),
            Self::MalformedHeader(e) => write!(f, "malformed MSC header: {e}"),
            Self::MalformedEscape => write!(f, "malformed Z-escape sequence in framed record"),
            Self::BadHeader => write!(f, "input is not a SQLite database file"),
            Self::UnknownPageType(t) => write!(f, "unknown B-tree page type 0x{t:02x}"),
            Self::FreePagesPresent => write!(f, "database still contains free-list pages after VACUUM"),
            Self::TooManyPages { page_count, max_pages } => {
                write!(f, "database has {page_count} pages, exceeding the configured ceiling of {max_pages}")
            }
            Self::ReservedBytesUnsupported(n) => write!(f, "reserved bytes per page ({n}) is unsupported"),
            Self::Io(e, ctx) if ctx.is_empty() => write!(f, "io error: {e}"),
            Self::Io(e, ctx) => write!(f, "io error ({ctx}): {e}"),
            Self::FileOpen(e, path) => write!(f, "failed to open {path}: {e}"),
            Self::Sqlite(msg) => write!(f, "sqlite driver error: {msg}"),
            Self::Xml(msg) => write!(f, "xml parse error: {msg}"),
            Self::MalformedRecord(msg) => write!(f, "malformed SQLite record: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
