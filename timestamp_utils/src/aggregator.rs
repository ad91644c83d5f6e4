//! Progress aggregator
//!
//! One thread owns the progress bar and the counters; workers only send
//! messages. Lines and errors are printed above the bar so they never
//! interleave with it. `finish` is acknowledged only after every message
//! queued before it has been applied.

use crate::modern_ui::progress_style;
use anyhow::{anyhow, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub enum Message {
    /// One job finished, successfully or not
    Increment,
    Log(String),
    Error(String),
    Finish(SyncSender<Summary>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub errors: Vec<String>,
}

impl Summary {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDisplay {
    Terminal,
    Hidden,
}

/// Cheap sender used by workers.
#[derive(Clone)]
pub struct AggregatorHandle {
    sender: Sender<Message>,
}

impl AggregatorHandle {
    pub fn increment(&self) {
        self.send(Message::Increment);
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(Message::Log(line.into()));
    }

    pub fn error(&self, line: impl Into<String>) {
        self.send(Message::Error(line.into()));
    }

    fn send(&self, message: Message) {
        if self.sender.send(message).is_err() {
            tracing::warn!("Progress aggregator already stopped; message dropped");
        }
    }
}

pub struct Aggregator {
    sender: Sender<Message>,
    thread: Option<JoinHandle<()>>,
}

impl Aggregator {
    pub fn spawn(total: usize, prefix: &str, display: ProgressDisplay) -> Result<Self> {
        let bar = build_bar(total as u64, prefix, display);
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("progress-aggregator".to_string())
            .spawn(move || run(receiver, bar, total))?;
        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> AggregatorHandle {
        AggregatorHandle {
            sender: self.sender.clone(),
        }
    }

    /// Drain pending messages, stop the bar, and return the totals.
    pub fn finish(mut self) -> Result<Summary> {
        let (reply, answer) = mpsc::sync_channel(1);
        self.sender
            .send(Message::Finish(reply))
            .map_err(|_| anyhow!("progress aggregator stopped before finish"))?;
        let summary = answer
            .recv()
            .map_err(|_| anyhow!("progress aggregator exited without a summary"))?;
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow!("progress aggregator thread panicked"))?;
        }
        Ok(summary)
    }
}

fn build_bar(total: u64, prefix: &str, display: ProgressDisplay) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(progress_style::BATCH_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(progress_style::PROGRESS_CHARS)
            .tick_chars(progress_style::SPINNER_CHARS),
    );
    bar.set_prefix(prefix.to_string());
    match display {
        ProgressDisplay::Terminal => {
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        ProgressDisplay::Hidden => bar.set_draw_target(ProgressDrawTarget::hidden()),
    }
    bar
}

fn run(receiver: Receiver<Message>, bar: ProgressBar, total: usize) {
    let mut summary = Summary {
        total,
        ..Summary::default()
    };

    for message in receiver {
        match message {
            Message::Increment => {
                summary.completed += 1;
                bar.inc(1);
            }
            Message::Log(line) => bar.println(line),
            Message::Error(line) => {
                bar.println(style(&line).red().to_string());
                summary.errors.push(line);
            }
            Message::Finish(reply) => {
                bar.finish_and_clear();
                if reply.send(summary).is_err() {
                    tracing::warn!("Nobody waiting for the progress summary");
                }
                return;
            }
        }
    }

    bar.abandon();
}
