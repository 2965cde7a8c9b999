//! # Socket-inheritance wire format.
//!
//! The supervisor tells each worker which listeners it inherited through two
//! environment variables:
//!
//! - [`PORT_ENV_NAME`] (`SERVER_STARTER_PORT`): a semicolon-separated list of
//!   `address=fd` pairs. The address is the exact textual form used at bind
//!   time (`0.0.0.0:80`, `/tmp/foo.sock`, or a bare port number); the fd is
//!   the descriptor number visible in the child (3 for the first listener,
//!   4 for the second, ...). An empty value means "no listeners"; an absent
//!   variable means "not launched by a supervisor".
//! - [`GENERATION_ENV_NAME`] (`SERVER_STARTER_GENERATION`): the worker's
//!   generation number.
//!
//! [`format_port_mappings`] and [`parse_port_mappings`] round-trip: parsing
//! the string the supervisor emits yields the same `(address, fd)` pairs in
//! the same order. Child-side code can use [`parse_port_mappings`] directly
//! on the variable's value.

use std::os::unix::io::RawFd;

use thiserror::Error;

/// Environment variable carrying the inherited listener pairs.
pub const PORT_ENV_NAME: &str = "SERVER_STARTER_PORT";

/// Environment variable carrying the worker's generation number.
pub const GENERATION_ENV_NAME: &str = "SERVER_STARTER_GENERATION";

/// One inherited listener: bind-time address and child-side descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortMapping {
    /// Textual address exactly as bound (`host:port`, bare port, or path).
    pub addr: String,
    /// Descriptor number in the child.
    pub fd: RawFd,
}

/// Errors from [`parse_port_mappings`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InheritError {
    /// A pair is not of the form `address=fd`.
    #[error("failed to parse '{pair}' as a listen target")]
    MalformedPair {
        /// The offending pair text.
        pair: String,
    },

    /// The fd half of a pair is not a non-negative integer.
    #[error("failed to parse '{pair}' as a listen target: bad descriptor")]
    BadDescriptor {
        /// The offending pair text.
        pair: String,
    },
}

/// Formats mappings as the `SERVER_STARTER_PORT` value.
///
/// Pair order is preserved; an empty slice yields an empty string.
pub fn format_port_mappings(mappings: &[PortMapping]) -> String {
    let pairs: Vec<String> = mappings
        .iter()
        .map(|m| format!("{}={}", m.addr, m.fd))
        .collect();
    pairs.join(";")
}

/// Parses a `SERVER_STARTER_PORT` value into mappings.
///
/// The empty string parses to an empty list ("launched with no listeners").
/// Addresses and descriptors tolerate surrounding whitespace. The address is
/// split from the descriptor at the **last** `=`, so pathological addresses
/// containing `=` survive a round-trip.
pub fn parse_port_mappings(value: &str) -> Result<Vec<PortMapping>, InheritError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for pair in value.split(';') {
        let Some((addr, fd)) = pair.rsplit_once('=') else {
            return Err(InheritError::MalformedPair {
                pair: pair.to_string(),
            });
        };
        let fd: RawFd = fd
            .trim()
            .parse()
            .map_err(|_| InheritError::BadDescriptor {
                pair: pair.to_string(),
            })?;
        if fd < 0 {
            return Err(InheritError::BadDescriptor {
                pair: pair.to_string(),
            });
        }
        out.push(PortMapping {
            addr: addr.trim().to_string(),
            fd,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(addr: &str, fd: RawFd) -> PortMapping {
        PortMapping {
            addr: addr.to_string(),
            fd,
        }
    }

    #[test]
    fn formats_pairs_in_order() {
        let s = format_port_mappings(&[
            mapping("0.0.0.0:8080", 3),
            mapping("/tmp/app.sock", 4),
            mapping("50908", 5),
        ]);
        assert_eq!(s, "0.0.0.0:8080=3;/tmp/app.sock=4;50908=5");
    }

    #[test]
    fn empty_list_is_empty_string() {
        assert_eq!(format_port_mappings(&[]), "");
        assert_eq!(parse_port_mappings("").unwrap(), Vec::new());
    }

    #[test]
    fn round_trips_what_the_supervisor_emits() {
        let mappings = vec![
            mapping("0.0.0.0:80", 3),
            mapping("[::1]:443", 4),
            mapping("/var/run/web.sock", 5),
        ];
        let parsed = parse_port_mappings(&format_port_mappings(&mappings)).unwrap();
        assert_eq!(parsed, mappings);
    }

    #[test]
    fn tolerates_whitespace_around_halves() {
        let parsed = parse_port_mappings(" 0.0.0.0:80 = 3 ;127.0.0.1:81=4").unwrap();
        assert_eq!(parsed[0], mapping("0.0.0.0:80", 3));
        assert_eq!(parsed[1], mapping("127.0.0.1:81", 4));
    }

    #[test]
    fn rejects_pair_without_descriptor() {
        let err = parse_port_mappings("0.0.0.0:80").unwrap_err();
        assert!(matches!(err, InheritError::MalformedPair { .. }));
    }

    #[test]
    fn rejects_non_numeric_descriptor() {
        let err = parse_port_mappings("0.0.0.0:80=x").unwrap_err();
        assert!(matches!(err, InheritError::BadDescriptor { .. }));
    }
}
