#[cfg(unix)]
use std::path::PathBuf;
use std::fmt;

pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:65432";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    #[cfg(unix)]
    Unix(PathBuf),
    Tcp(String), // host:port
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

pub fn default_endpoint() -> Endpoint {
    parse_endpoint(DEFAULT_ENDPOINT)
}

/// Accepts `tcp://host:port`, `unix:///path` and bare `host:port`.
pub fn parse_endpoint(s: &str) -> Endpoint {
    let s = s.trim();
    #[cfg(unix)]
    {
        if let Some(rest) = s.strip_prefix("unix://") {
            return Endpoint::Unix(PathBuf::from(rest));
        }
    }
    if let Some(rest) = s.strip_prefix("tcp://") {
        return Endpoint::Tcp(rest.to_string());
    }
    Endpoint::Tcp(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("tcp://127.0.0.1:8080"),
            Endpoint::Tcp("127.0.0.1:8080".into())
        );
        assert_eq!(
            parse_endpoint(" localhost:3000 "),
            Endpoint::Tcp("localhost:3000".into())
        );

        #[cfg(unix)]
        assert_eq!(
            parse_endpoint("unix:///tmp/live.sock"),
            Endpoint::Unix(PathBuf::from("/tmp/live.sock"))
        );
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(default_endpoint(), Endpoint::Tcp("127.0.0.1:65432".into()));
        assert_eq!(default_endpoint().to_string(), DEFAULT_ENDPOINT);
    }
}
