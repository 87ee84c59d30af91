use std::env;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};

/// Command line used to open the embed URL, with the URL appended as the
/// final argument. `VIDTRACK_PLAYER_CMD` overrides the platform opener;
/// wrappers that speak the player's event protocol print envelope lines on
/// stdout and get full progress sync, plain openers just play.
pub(crate) fn player_command() -> Vec<String> {
    if let Ok(custom) = env::var("VIDTRACK_PLAYER_CMD") {
        let parts: Vec<String> = custom.split_whitespace().map(str::to_string).collect();
        if !parts.is_empty() {
            return parts;
        }
    }
    vec![default_opener().to_string()]
}

#[cfg(target_os = "macos")]
fn default_opener() -> &'static str {
    "open"
}

#[cfg(target_os = "windows")]
fn default_opener() -> &'static str {
    "explorer"
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_opener() -> &'static str {
    "xdg-open"
}

pub(crate) struct PlayerHandle {
    child: Child,
}

/// Spawn the player for `url` and forward every stdout line over `tx`.
/// The reader thread ends on its own when the child's pipe closes; send
/// failures after the receiver is gone are ignored.
pub(crate) fn launch_player(url: &str, tx: mpsc::Sender<String>) -> Result<PlayerHandle> {
    let argv = player_command();
    let mut child = ProcessCommand::new(&argv[0])
        .args(&argv[1..])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to launch player command {}", argv[0]))?;

    if let Some(stdout) = child.stdout.take() {
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    Ok(PlayerHandle { child })
}

impl PlayerHandle {
    pub(crate) fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Block until the child exits; used by the headless watch command.
    pub(crate) fn wait(&mut self) -> Result<()> {
        self.child.wait().context("failed waiting on player process")?;
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
