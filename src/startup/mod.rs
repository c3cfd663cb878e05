// Start with login
// Per-user Run key on Windows; unsupported everywhere else

#[cfg(windows)]
mod windows_run_key;

#[cfg(windows)]
use self::windows_run_key as platform;

// Stub for non-Windows platforms
#[cfg(not(windows))]
mod platform {
    use crate::error::StartupError;
    use std::path::Path;

    pub const SUPPORTED: bool = false;

    pub fn is_registered() -> bool {
        false
    }

    pub fn register(_exe: &Path) -> Result<(), StartupError> {
        Err(StartupError::Unsupported)
    }

    pub fn unregister() -> Result<(), StartupError> {
        Err(StartupError::Unsupported)
    }
}

use tracing::info;

use crate::error::StartupError;

/// Startup registration for this executable. Always off in portable mode.
#[derive(Debug, Clone, Copy)]
pub struct StartupRegistration {
    portable: bool,
}

impl StartupRegistration {
    pub fn new(portable: bool) -> Self {
        Self { portable }
    }

    /// Whether the menu toggle should be enabled
    pub fn is_available(&self) -> bool {
        platform::SUPPORTED && !self.portable
    }

    pub fn is_enabled(&self) -> bool {
        !self.portable && platform::is_registered()
    }

    pub fn set_enabled(&self, enable: bool) -> Result<(), StartupError> {
        if self.portable {
            return Err(StartupError::PortableMode);
        }

        if enable {
            let exe = std::env::current_exe()?;
            platform::register(&exe)?;
        } else {
            platform::unregister()?;
        }
        info!(enabled = enable, "Updated start with login");
        Ok(())
    }

    /// Flip the current setting; returns the new state
    pub fn toggle(&self) -> Result<bool, StartupError> {
        let enable = !self.is_enabled();
        self.set_enabled(enable)?;
        Ok(enable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portable_mode_refuses_registration() {
        let startup = StartupRegistration::new(true);
        assert!(!startup.is_available());
        assert!(!startup.is_enabled());
        assert!(matches!(
            startup.set_enabled(true),
            Err(StartupError::PortableMode)
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unsupported_platform() {
        let startup = StartupRegistration::new(false);
        assert!(!startup.is_available());
        assert!(matches!(
            startup.set_enabled(true),
            Err(StartupError::Unsupported)
        ));
    }
}
