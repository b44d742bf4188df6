use tokio::sync::{broadcast, mpsc};

/// One `Sender`, any number of cloned `Receiver`s. Receivers carry an
/// alive-marker, so `Sender::shutdown` resolves only after every holder
/// has dropped its end.
pub fn channel() -> (Sender, Receiver) {
    let (notify, _) = broadcast::channel(1);
    let (alive_marker, all_dropped) = mpsc::channel(1);

    let receiver = Receiver {
        notify: notify.clone(),
        signal: notify.subscribe(),
        alive_marker,
    };

    (
        Sender {
            notify,
            all_dropped,
        },
        receiver,
    )
}

pub struct Sender {
    notify: broadcast::Sender<()>,
    all_dropped: mpsc::Receiver<()>,
}

impl Sender {
    /// Signals every receiver and waits for the holding tasks to exit.
    pub async fn shutdown(mut self) {
        let _ = self.notify.send(());
        let _ = self.all_dropped.recv().await;
    }
}

#[derive(Debug)]
pub struct Receiver {
    notify: broadcast::Sender<()>,
    signal: broadcast::Receiver<()>,
    alive_marker: mpsc::Sender<()>,
}

impl Receiver {
    /// Resolves when shutdown is signalled. The channel can never close
    /// while a receiver is alive (each one holds a sender clone), so this
    /// pends forever if no signal comes.
    pub async fn recv(&mut self) {
        let _ = self.signal.recv().await;
    }
}

impl Clone for Receiver {
    fn clone(&self) -> Self {
        Self {
            notify: self.notify.clone(),
            signal: self.notify.subscribe(),
            alive_marker: self.alive_marker.clone(),
        }
    }
}
