use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::bigmath::MathError;
use crate::worker::DEFAULT_PORT;

/// Location of one worker, written `host:port`. A bare port is accepted and
/// resolves to `localhost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// The endpoint string was not `host:port` or a bare port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected 'host:port' or a bare port, got {0:?}")]
pub struct EndpointParseError(pub String);

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => (host, port),
            Some(_) => return Err(EndpointParseError(s.to_string())),
            None => ("localhost", s),
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError(s.to_string()))?;
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// What one reader task learned from a single reply line. Lines that match
/// no protocol shape never become events; they are dropped at the reader.
#[derive(Debug)]
pub(crate) enum EventKind {
    Found { n: BigInt, p: BigInt },
    Done { n: BigInt },
    Disconnected,
}

/// One parsed reply, tagged with the index of the worker it came from.
#[derive(Debug)]
pub(crate) struct Event {
    pub worker: usize,
    pub kind: EventKind,
}

/// Why one factoring cycle failed. None of these are fatal to the process;
/// the coordinator reports `invalid` and waits for the next input.
#[derive(Debug, Error)]
pub enum CycleError {
    /// `n < 2`, or `sqrt(n)` is too small to give every worker a range.
    #[error("target not factorable across {workers} workers")]
    OutOfRange { workers: usize },

    /// Every worker connection has been discarded after earlier failures.
    #[error("no live worker connections remain")]
    NoWorkers,

    /// A worker connection failed while dispatching or collecting.
    #[error("worker connection failed: {0}")]
    Connection(#[from] std::io::Error),

    /// A worker did not finish within the configured deadline.
    #[error("timed out waiting for worker replies")]
    Timeout,

    /// The combined partial results do not reconstruct `n`.
    #[error(transparent)]
    Inconsistent(#[from] MathError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parses_host_and_port() {
        let ep: Endpoint = "localhost:4444".parse().unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 4444);
        assert_eq!(ep.to_string(), "localhost:4444");
    }

    #[test]
    fn test_endpoint_bare_port_defaults_to_localhost() {
        let ep: Endpoint = "5555".parse().unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 5555);
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!("".parse::<Endpoint>().is_err());
        assert!(":4444".parse::<Endpoint>().is_err());
        assert!("localhost:".parse::<Endpoint>().is_err());
        assert!("localhost:notaport".parse::<Endpoint>().is_err());
        assert!("localhost:99999".parse::<Endpoint>().is_err());
    }
}
