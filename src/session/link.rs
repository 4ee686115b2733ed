use std::process::Command;

use tracing::info;

/// Opens a record's reference URL in a new viewing context before capture
/// begins.
pub trait LinkOpener: Send {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Hands the URL to the platform's default opener.
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        #[cfg(target_os = "macos")]
        let mut command = {
            let mut c = Command::new("open");
            c.arg(url);
            c
        };

        #[cfg(target_os = "windows")]
        let mut command = {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        };

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut command = {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };

        command.spawn()?;
        info!("Opened reference link: {}", url);
        Ok(())
    }
}

/// Logs instead of opening anything. For tests and headless runs.
#[derive(Default)]
pub struct NoopOpener;

impl LinkOpener for NoopOpener {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        info!("Reference link (not opened): {}", url);
        Ok(())
    }
}
