use std::time::Duration;

use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    Shutdown,
}

/// Drives sampling cycles: a `Tick` every `tick_rate`, and `Shutdown` on Ctrl-C.
///
/// At most one tick is pending. Ticks that fire while the consumer is still
/// busy with a cycle are dropped.
pub struct Ticker {
    rx: mpsc::Receiver<Event>,
    _task: tokio::task::JoinHandle<()>,
}

impl Ticker {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<Event>(1);

        let task = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(tick_rate);
            tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = tick_interval.tick() => {
                        match tx.try_send(Event::Tick) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                tracing::debug!("cycle still running, dropping tick");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                    result = tokio::signal::ctrl_c() => {
                        if result.is_err() {
                            tracing::warn!("unable to listen for Ctrl-C");
                        }
                        let _ = tx.send(Event::Shutdown).await;
                        break;
                    }
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
