use std::process::{Command as ProcessCommand, Stdio};

use log::{info, warn};

/// Spoken prompts for an operator whose eyes are on the board.
pub(crate) struct Announcer {
    enabled: bool,
}

impl Announcer {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub(crate) fn say(&self, text: &str) {
        info!("{text}");
        if !self.enabled {
            return;
        }
        match speech_command(text).spawn() {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(err) => warn!("speech command failed: {err}"),
        }
    }

    pub(crate) fn say_blocking(&self, text: &str) {
        info!("{text}");
        if !self.enabled {
            return;
        }
        if let Err(err) = speech_command(text).status() {
            warn!("speech command failed: {err}");
        }
    }
}

fn speech_command(text: &str) -> ProcessCommand {
    let mut cmd = if cfg!(target_os = "macos") {
        let mut cmd = ProcessCommand::new("say");
        cmd.arg(text);
        cmd
    } else if cfg!(windows) {
        let mut cmd = ProcessCommand::new("powershell");
        cmd.arg("-NoProfile").arg("-Command").arg(format!(
            "Add-Type -AssemblyName System.Speech; (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
            text.replace('\'', "''")
        ));
        cmd
    } else {
        let mut cmd = ProcessCommand::new("spd-say");
        cmd.arg("--wait").arg(text);
        cmd
    };
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}
