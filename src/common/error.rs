//! Error types for asv_planner

use std::fmt;

/// Main error type for the planning stack
#[derive(Debug)]
pub enum PlannerError {
    /// Path planning failed
    Planning(String),
    /// Invalid parameter
    InvalidParameter(String),
    /// Map could not be loaded or queried
    MapLoad(String),
    /// Numerical computation failed (singular covariance, etc.)
    Numerical(String),
    /// I/O error
    Io(std::io::Error),
    /// Visualization output error
    Visualization(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Planning(msg) => write!(f, "Planning error: {}", msg),
            PlannerError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            PlannerError::MapLoad(msg) => write!(f, "Map load error: {}", msg),
            PlannerError::Numerical(msg) => write!(f, "Numerical error: {}", msg),
            PlannerError::Io(e) => write!(f, "I/O error: {}", e),
            PlannerError::Visualization(msg) => write!(f, "Visualization error: {}", msg),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(e: std::io::Error) -> Self {
        PlannerError::Io(e)
    }
}

/// Result type alias for planning operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlannerError::Planning("no feasible plan".to_string());
        assert_eq!(format!("{}", err), "Planning error: no feasible plan");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlannerError = io_err.into();
        assert!(matches!(err, PlannerError::Io(_)));
    }
}
