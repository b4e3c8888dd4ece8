use std::fmt;

/// Errors produced by the codec, the peer state machine, the Diameter
/// router and the RADIUS router.
///
/// Kept as a single flat enum, grouped by subsystem, rather than one
/// error type per module - callers generally need to match across
/// subsystem boundaries (e.g. a router surfaces a peer error as a
/// routing error) and a single enum keeps that mapping a simple `match`.
#[derive(Debug)]
pub enum Error {
    // -- Codec errors (spec.md §7) --
    BadAvpType(u32),
    BadAvpLength(String),
    Truncated(String),
    BadGroupedChild(String),
    DecodeError(String),
    EncodeError(String),
    UnknownAvpName(String),
    NotGrouped(u32),

    // -- Peer protocol errors (spec.md §7) --
    CerMismatch(String),
    CerTimeout,
    WatchdogFailure,
    UnknownPeer(String),
    BadOriginNetwork(std::net::IpAddr),
    WriteError(String),
    ReadError(String),
    ReadEof,
    PeerTerminated,
    Cancelled,

    // -- Routing errors (spec.md §7) --
    NoRouteFound(String, String),
    NoAvailablePeer(String),
    HandlerError(String),
    Timeout,
    RouterTerminated,

    // -- RADIUS errors --
    NoServerAvailable,
    NoResponse,

    // -- Generic collaborators --
    MissingEnv(String),
    IoError(std::io::Error),
    TryFromSliceError(std::array::TryFromSliceError),
    JsonError(serde_json::Error),
    ClientError(String),
    ServerError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadAvpType(code) => write!(f, "unknown AVP type for code {}", code),
            Error::BadAvpLength(msg) => write!(f, "bad AVP length: {}", msg),
            Error::Truncated(msg) => write!(f, "truncated input: {}", msg),
            Error::BadGroupedChild(msg) => write!(f, "bad grouped child: {}", msg),
            Error::DecodeError(msg) => write!(f, "{}", msg),
            Error::EncodeError(msg) => write!(f, "{}", msg),
            Error::UnknownAvpName(name) => write!(f, "unknown AVP name in dictionary: {}", name),
            Error::NotGrouped(code) => write!(f, "AVP {} is not a Grouped AVP", code),
            Error::CerMismatch(msg) => write!(f, "CER/CEA mismatch: {}", msg),
            Error::CerTimeout => write!(f, "capabilities exchange timed out"),
            Error::WatchdogFailure => write!(f, "watchdog exceeded outstanding DWA limit"),
            Error::UnknownPeer(host) => write!(f, "unknown peer origin-host: {}", host),
            Error::BadOriginNetwork(ip) => write!(f, "{} is outside configured origin-network", ip),
            Error::WriteError(msg) => write!(f, "write error: {}", msg),
            Error::ReadError(msg) => write!(f, "read error: {}", msg),
            Error::ReadEof => write!(f, "connection closed by peer"),
            Error::PeerTerminated => write!(f, "peer is terminated"),
            Error::Cancelled => write!(f, "request cancelled"),
            Error::NoRouteFound(realm, app) => {
                write!(f, "no routing rule for realm={} application={}", realm, app)
            }
            Error::NoAvailablePeer(rule) => write!(f, "no engaged peer for rule {}", rule),
            Error::HandlerError(msg) => write!(f, "handler error: {}", msg),
            Error::Timeout => write!(f, "request timed out"),
            Error::RouterTerminated => write!(f, "router is terminated"),
            Error::NoServerAvailable => write!(f, "no RADIUS server available"),
            Error::NoResponse => write!(f, "no response from any RADIUS server"),
            Error::MissingEnv(var) => write!(f, "missing environment variable: {}", var),
            Error::IoError(e) => write!(f, "{}", e),
            Error::TryFromSliceError(e) => write!(f, "{}", e),
            Error::JsonError(e) => write!(f, "{}", e),
            Error::ClientError(msg) => write!(f, "{}", msg),
            Error::ServerError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ReadEof
        } else {
            Error::IoError(err)
        }
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(err: std::array::TryFromSliceError) -> Error {
        Error::TryFromSliceError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
