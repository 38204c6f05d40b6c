use std::{error, fmt, io};

/// Fatal failures of a probe run. Timeouts are not errors: they are
/// reported as loss or as an unresolved hop.
#[derive(Debug)]
pub enum Error {
    /// The platform resolver failed for `host`.
    Resolution { host: String, reason: String },
    /// The resolver answered, but without any IPv4 address.
    NoIpv4Address { host: String },
    /// The OS refused to open a raw ICMP socket.
    SocketPermission(io::Error),
    /// Any other socket failure (open, setsockopt, send, poll, recv).
    Socket(io::Error),
    /// Writing the report failed.
    Output(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Resolution { host, reason } => {
                write!(f, "unable to resolve \"{}\": {}", host, reason)
            }
            Error::NoIpv4Address { host } => write!(f, "got no IPv4 address for \"{}\"", host),
            Error::SocketPermission(err) => write!(
                f,
                "permission denied opening a raw ICMP socket ({}); run as root or grant CAP_NET_RAW",
                err
            ),
            Error::Socket(err) => write!(f, "socket error: {}", err),
            Error::Output(err) => write!(f, "unable to write output: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::SocketPermission(err) | Error::Socket(err) | Error::Output(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Socket(err)
    }
}

impl Error {
    /// Classifies a failure to create the raw socket.
    pub fn socket_open(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Error::SocketPermission(err),
            _ => Error::Socket(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
