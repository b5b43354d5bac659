use failure::{Backtrace, Context, Fail};
use std::fmt::Display;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "{}", _0)]
    IO(#[cause] io::Error),

    #[fail(display = "worker count must be at least 1 and at most usize::MAX / 2, got {}", _0)]
    InvalidWorkerCount(usize),

    #[fail(display = "worker pool is already started")]
    AlreadyStarted,

    #[fail(display = "worker pool no longer accepts tasks")]
    PoolStopped,

    #[fail(display = "worker pool is already stopped")]
    AlreadyStopped,

    #[fail(display = "operation cancelled")]
    Cancelled,

    #[fail(display = "server did not shut down within {:?}", _0)]
    ShutdownTimeout(std::time::Duration),

    #[fail(display = "{}", _0)]
    Server(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error {
            inner: Context::new(ErrorKind::IO(err)),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(err: ErrorKind) -> Self {
        Error {
            inner: Context::new(err),
        }
    }
}
