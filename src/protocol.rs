//! The newline-delimited ASCII protocol spoken between coordinator and
//! workers, one message per line:
//!
//! | direction          | line                     |
//! |--------------------|--------------------------|
//! | coordinator→worker | `factor <n> <low> <high>`|
//! | worker→coordinator | `found <n> <p>`          |
//! | worker→coordinator | `done <n> <low> <high>`  |
//! | worker→coordinator | `invalid`                |

use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A line that matches none of the protocol message shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed protocol line")]
pub struct ParseError;

/// Coordinator-to-worker messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Search `[low, high]` for prime factors of `n`.
    Factor { n: BigInt, low: BigInt, high: BigInt },
}

/// Worker-to-coordinator messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `p` is a prime factor of `n`, reported once per multiplicity.
    Found { n: BigInt, p: BigInt },
    /// The worker finished the requested range.
    Done { n: BigInt, low: BigInt, high: BigInt },
    /// The request was malformed or out of range.
    Invalid,
}

fn parse_int(token: &str) -> Result<BigInt, ParseError> {
    token.parse().map_err(|_| ParseError)
}

impl FromStr for Request {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split(' ').collect();
        match tokens.as_slice() {
            ["factor", n, low, high] => Ok(Request::Factor {
                n: parse_int(n)?,
                low: parse_int(low)?,
                high: parse_int(high)?,
            }),
            _ => Err(ParseError),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Factor { n, low, high } => write!(f, "factor {} {} {}", n, low, high),
        }
    }
}

impl FromStr for Reply {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split(' ').collect();
        match tokens.as_slice() {
            ["found", n, p] => Ok(Reply::Found {
                n: parse_int(n)?,
                p: parse_int(p)?,
            }),
            ["done", n, low, high] => Ok(Reply::Done {
                n: parse_int(n)?,
                low: parse_int(low)?,
                high: parse_int(high)?,
            }),
            ["invalid"] => Ok(Reply::Invalid),
            _ => Err(ParseError),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Found { n, p } => write!(f, "found {} {}", n, p),
            Reply::Done { n, low, high } => write!(f, "done {} {} {}", n, low, high),
            Reply::Invalid => write!(f, "invalid"),
        }
    }
}
