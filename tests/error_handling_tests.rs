use dmm6500::{DmmError, DmmResult};
use std::error::Error;
use std::io;

/// Error handling and resilience tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let errors = vec![
            DmmError::Connect {
                address: "10.0.0.1:5025".to_string(),
                message: "refused".to_string(),
            },
            DmmError::Config { message: "Config error".to_string() },
            DmmError::Session { message: "Session error".to_string() },
            DmmError::Timeout,
            DmmError::ConnectionClosed,
            DmmError::NotConnected,
            DmmError::InvalidInput("Invalid input".to_string()),
            DmmError::Output("Output error".to_string()),
        ];

        for error in errors {
            let display = error.to_string();
            assert!(!display.is_empty(), "Error display should not be empty");

            let debug = format!("{:?}", error);
            assert!(!debug.is_empty(), "Error debug should not be empty");
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let error: DmmError = io_error.into();

        assert!(matches!(error, DmmError::Network(_)));
        assert!(error.to_string().contains("reset by peer"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_wrapped_errors_keep_their_cause() {
        let error = DmmError::CommandWrite {
            command: "*RST".to_string(),
            source: Box::new(DmmError::ConnectionClosed),
        };
        assert!(error.to_string().contains("*RST"));
        assert!(error.is_closed());
        assert!(!error.is_timeout());
        let source = error.source().expect("CommandWrite should carry a source");
        assert_eq!(source.to_string(), DmmError::ConnectionClosed.to_string());

        let error = DmmError::Flush(Box::new(DmmError::Timeout));
        assert!(error.is_timeout());
        assert!(error.source().is_some());
    }

    #[test]
    fn test_io_timeout_counts_as_timeout() {
        let error = DmmError::Network(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(error.is_timeout());
        assert!(!error.is_closed());
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> DmmResult<u32> {
            Err(DmmError::Timeout)
        }

        fn outer() -> DmmResult<u32> {
            let value = inner()?;
            Ok(value + 1)
        }

        assert!(matches!(outer(), Err(DmmError::Timeout)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DmmError>();
    }

    #[test]
    fn test_error_size() {
        assert!(std::mem::size_of::<DmmError>() <= 128);
    }
}
