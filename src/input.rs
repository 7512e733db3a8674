// src/input.rs
use crate::sensor::{KeyInput, KeyState};
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::{debug, warn};

/// Terminal key bindings read on a background thread, one command per line.
///
/// `q`, `esc` or `quit` stops tracking. An empty line, `space` or `r` sets the
/// reference pose. Commands are consumed by the next frame that polls.
pub struct StdinKeys {
    rx: Receiver<KeyState>,
    closed: bool,
}

impl StdinKeys {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read key input: {}", e);
                        break;
                    }
                };
                let Some(keys) = parse_command(&line) else {
                    debug!("Ignoring key input {:?}", line);
                    continue;
                };
                if tx.send(keys).is_err() {
                    break;
                }
            }
        });

        Self { rx, closed: false }
    }
}

fn parse_command(line: &str) -> Option<KeyState> {
    match line.trim().to_ascii_lowercase().as_str() {
        "q" | "esc" | "quit" => Some(KeyState {
            quit: true,
            ..Default::default()
        }),
        "" | "space" | "r" => Some(KeyState {
            set_reference: true,
            ..Default::default()
        }),
        _ => None,
    }
}

impl KeyInput for StdinKeys {
    fn poll(&mut self) -> KeyState {
        let mut state = KeyState::default();
        if self.closed {
            return state;
        }

        loop {
            match self.rx.try_recv() {
                Ok(keys) => {
                    state.quit |= keys.quit;
                    state.set_reference |= keys.set_reference;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Key input closed");
                    self.closed = true;
                    break;
                }
            }
        }
        state
    }
}

/// Pre-recorded key presses, one entry per polled frame. Once exhausted every
/// poll reports no keys.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    script: VecDeque<KeyState>,
}

impl ScriptedKeys {
    pub fn new(script: impl IntoIterator<Item = KeyState>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Presses `set_reference` on frame `reference_at` and quits after `frames` polls.
    pub fn reference_then_quit(reference_at: usize, frames: usize) -> Self {
        Self::new((0..frames).map(|i| KeyState {
            set_reference: i == reference_at,
            quit: i + 1 == frames,
        }))
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl KeyInput for ScriptedKeys {
    fn poll(&mut self) -> KeyState {
        self.script.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(parse_command("q").unwrap().quit);
        assert!(parse_command(" ESC ").unwrap().quit);
        assert!(parse_command("").unwrap().set_reference);
        assert!(parse_command("space").unwrap().set_reference);
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn test_scripted_keys() {
        let mut keys = ScriptedKeys::reference_then_quit(1, 3);
        assert_eq!(keys.poll(), KeyState::default());
        assert!(keys.poll().set_reference);
        let last = keys.poll();
        assert!(last.quit && !last.set_reference);
        assert_eq!(keys.remaining(), 0);
        assert_eq!(keys.poll(), KeyState::default());
    }
}
