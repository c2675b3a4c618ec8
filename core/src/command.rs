//! External control commands.
//!
//! RULE: Commands cross the thread boundary through this queue and
//! nowhere else. The simulation drains the queue only between event
//! executions — a command never interrupts an event in flight.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use crate::types::SimTime;

/// All externally issued control commands.
/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SimCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,
    SetClockRate { rate: f64 },
    AdvanceToTime { time: SimTime },

    // ── Run control ───────────────────────────────
    Terminate,
    Reset,

    // ── Platform property access ──────────────────
    SetProperty { platform: String, property: String, value: Value },
    GetProperty { platform: String, property: String },
}

/// Reply sent back for commands issued with a reply channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Ack,
    Property(Value),
    Error(String),
}

/// A command plus its optional reply channel.
pub struct QueuedCommand {
    pub command: SimCommand,
    pub reply: Option<Sender<CommandReply>>,
}

impl QueuedCommand {
    /// Send a reply if the issuer asked for one. A disappeared issuer is
    /// not an error.
    pub fn respond(&self, reply: CommandReply) {
        if let Some(tx) = &self.reply {
            let _ = tx.send(reply);
        }
    }
}

/// Producer half of the command boundary. Cloneable and sendable to any
/// thread (network layer, UI, test harness).
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<QueuedCommand>,
}

impl CommandSender {
    pub fn send(&self, command: SimCommand) {
        let _ = self.tx.send(QueuedCommand { command, reply: None });
    }

    /// Send a command and obtain a receiver for its reply.
    pub fn send_with_reply(&self, command: SimCommand) -> Receiver<CommandReply> {
        let (reply_tx, reply_rx) = channel();
        let _ = self.tx.send(QueuedCommand { command, reply: Some(reply_tx) });
        reply_rx
    }
}

/// Consumer half, owned by the simulation.
pub struct CommandQueue {
    tx: Sender<QueuedCommand>,
    rx: Receiver<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> CommandSender {
        CommandSender { tx: self.tx.clone() }
    }

    /// Take everything currently queued, without blocking.
    pub fn drain(&self) -> Vec<QueuedCommand> {
        let mut commands = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => commands.push(cmd),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
