//! Error types for apt operations.
//!
//! Errors carry enough context to tell which reconciliation step failed.
//! Install failures are additionally categorized from apt's stderr so the
//! CLI can print actionable advice.

use thiserror::Error;

/// Categories of apt failures for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Mirrors unreachable, DNS failures, fetch errors
    Network,
    /// Package name unknown to every configured source
    NotFound,
    /// The dpkg/apt lock is held by another process
    Locked,
    /// Not running as root
    Permission,
    /// A required tool (apt-get, apt, apt-rdepends) is missing
    ToolMissing,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Categorize a failure from apt's stderr.
    pub fn from_apt_output(stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if stderr_lower.contains("could not get lock")
            || stderr_lower.contains("unable to acquire the dpkg frontend lock")
            || stderr_lower.contains("is another process using it")
        {
            return Self::Locked;
        }

        if stderr_lower.contains("are you root")
            || stderr_lower.contains("permission denied")
            || stderr_lower.contains("unable to lock the administration directory")
        {
            return Self::Permission;
        }

        if stderr_lower.contains("unable to locate package")
            || stderr_lower.contains("has no installation candidate")
            || stderr_lower.contains("couldn't find any package")
        {
            return Self::NotFound;
        }

        if stderr_lower.contains("temporary failure resolving")
            || stderr_lower.contains("failed to fetch")
            || stderr_lower.contains("could not resolve")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("network is unreachable")
        {
            return Self::Network;
        }

        Self::Other
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Package not found",
            Self::Locked => "Package database locked",
            Self::Permission => "Permission denied",
            Self::ToolMissing => "Required tool not installed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and apt sources, then try again",
            Self::NotFound => "Verify the package name or enable the repository that provides it",
            Self::Locked => "Wait for the other apt/dpkg process to finish and try again",
            Self::Permission => "Run pkgsync as root (e.g. with sudo)",
            Self::ToolMissing => "Install it with: apt-get install apt-rdepends",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while querying or mutating the package set.
#[derive(Debug, Error)]
pub enum Error {
    /// Listing installed packages failed
    #[error("could not list installed packages: {message}")]
    Query {
        /// What went wrong
        message: String,
    },

    /// Dependency query for a single package failed
    #[error("Could not look up dependencies of package \"{name}\"; possibly this is a group?")]
    DependencyLookup {
        /// Package whose dependencies were requested
        name: String,
    },

    /// Member query for a group (meta-package) failed
    #[error("could not expand group \"{group}\": {message}")]
    GroupLookup {
        /// Group that was expanded
        group: String,
        /// What went wrong
        message: String,
    },

    /// The combined install command failed
    #[error("install command failed: {message}")]
    InstallCommand {
        /// Description of the failure
        message: String,
        /// Standard error output, when captured
        stderr: String,
    },

    /// A required executable is not on PATH
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },
}

impl Error {
    /// Get the error category for user feedback.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ToolNotFound(_) => ErrorCategory::ToolMissing,
            Error::InstallCommand { stderr, .. } | Error::CommandFailed { stderr, .. } => {
                ErrorCategory::from_apt_output(stderr)
            }
            _ => ErrorCategory::Other,
        }
    }
}

/// Result type for apt operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_lookup_message() {
        let err = Error::DependencyLookup {
            name: "build-essential".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not look up dependencies of package \"build-essential\"; possibly this is a group?"
        );
    }

    #[test]
    fn test_category_from_apt_output_locked() {
        let stderr = "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 1234";
        assert_eq!(ErrorCategory::from_apt_output(stderr), ErrorCategory::Locked);
    }

    #[test]
    fn test_category_from_apt_output_permission() {
        let stderr = "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\nE: Unable to acquire the dpkg frontend lock (/var/lib/dpkg/lock-frontend), are you root?";
        // Lock-acquire wording wins over the permission hint.
        assert_eq!(ErrorCategory::from_apt_output(stderr), ErrorCategory::Locked);

        let stderr = "E: Unable to lock the administration directory (/var/lib/dpkg/), are you root?";
        assert_eq!(ErrorCategory::from_apt_output(stderr), ErrorCategory::Permission);
    }

    #[test]
    fn test_category_from_apt_output_not_found() {
        let stderr = "E: Unable to locate package definitely-not-a-package";
        assert_eq!(ErrorCategory::from_apt_output(stderr), ErrorCategory::NotFound);
    }

    #[test]
    fn test_category_from_apt_output_network() {
        let stderr = "W: Failed to fetch http://archive.ubuntu.com/ubuntu/dists/jammy/InRelease  Temporary failure resolving 'archive.ubuntu.com'";
        assert_eq!(ErrorCategory::from_apt_output(stderr), ErrorCategory::Network);
    }

    #[test]
    fn test_install_error_category() {
        let err = Error::InstallCommand {
            message: "apt-get install exited with status 100".to_string(),
            stderr: "E: Unable to locate package nope".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = Error::ToolNotFound("apt-rdepends".to_string());
        assert_eq!(err.category(), ErrorCategory::ToolMissing);
    }
}
