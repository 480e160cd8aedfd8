//! Opens the authorization URL in the system browser.
//!
//! Deliberately avoids PATH-resolved binaries (`open`, `xdg-open`, `cmd`):
//! on a multi-user machine, or one with a hostile entry earlier in `PATH`,
//! a PATH-resolved launcher can be trivially shadowed. Every platform branch
//! below invokes the system utility by absolute path instead.

use crate::error::{AuthError, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// Injected dependency so authenticators can be driven in tests without
/// spawning a real browser.
#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowserOpener;

#[cfg(target_os = "macos")]
const OPEN_CANDIDATES: &[&str] = &["/usr/bin/open"];

#[cfg(target_os = "windows")]
const SHELL_PATH: &str = r"C:\Windows\System32\cmd.exe";

#[cfg(all(unix, not(target_os = "macos")))]
const OPEN_CANDIDATES: &[&str] = &["/usr/bin/xdg-open", "/usr/local/bin/xdg-open", "/bin/xdg-open"];

#[async_trait]
impl BrowserOpener for SystemBrowserOpener {
    #[instrument(skip(self))]
    async fn open(&self, url: &str) -> Result<()> {
        debug!("opening system browser");

        #[cfg(target_os = "windows")]
        {
            return spawn(SHELL_PATH, &["/c", "start", "", url]);
        }

        #[cfg(any(target_os = "macos", all(unix, not(target_os = "windows"))))]
        {
            let binary = OPEN_CANDIDATES
                .iter()
                .find(|path| std::path::Path::new(path).exists())
                .ok_or_else(|| {
                    AuthError::BrowserOpenFailed(
                        "no browser launcher found among known absolute paths".to_string(),
                    )
                })?;
            return spawn(binary, &[url]);
        }

        #[allow(unreachable_code)]
        {
            Err(AuthError::BrowserOpenFailed("unsupported platform".to_string()).into())
        }
    }
}

fn spawn(program: &str, args: &[&str]) -> Result<()> {
    std::process::Command::new(program)
        .args(args)
        .spawn()
        .map(|_| ())
        .map_err(|e| {
            warn!(error = %e, program, "failed to launch browser");
            AuthError::BrowserOpenFailed(e.to_string()).into()
        })
}
