use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config load error: {0}")]
    ConfigLoad(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Process {0} vanished or became inaccessible during scan")]
    EnumerationRace(u32),

    #[error("Access denied for process {0}")]
    AccessDenied(u32),

    #[error("Notification channel error: {0}")]
    NotificationChannel(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_error_display() {
        let err = Error::Sampling("total memory reported as zero".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Sampling error"));
        assert!(msg.contains("total memory reported as zero"));
    }

    #[test]
    fn test_access_denied_display() {
        let err = Error::AccessDenied(4242);
        let msg = format!("{}", err);
        assert!(msg.contains("Access denied"));
        assert!(msg.contains("4242"));
    }

    #[test]
    fn test_enumeration_race_display() {
        let msg = format!("{}", Error::EnumerationRace(17));
        assert!(msg.contains("17"));
        assert!(msg.contains("vanished"));
    }

    #[test]
    fn test_invalid_selection_display() {
        let err = Error::InvalidSelection("'abc' is not a number".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid selection"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        let msg = format!("{}", err);
        assert!(msg.contains("IO error"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(Error::Other("test error".to_string()));
        assert!(result.is_err());

        if let Err(e) = result {
            assert!(format!("{}", e).contains("test error"));
        }
    }
}
