use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier for one open streaming connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    fn new() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pool of long-lived streaming connections, generic over the message
/// type it fans out.
///
/// Fan-out is best effort: a failed write is logged and skipped, and the
/// handle stays in the pool. Removal happens only through [`leave`],
/// driven by disconnect detection upstream.
///
/// [`leave`]: StreamRegistry::leave
pub struct StreamRegistry<M> {
    name: &'static str,
    clients: DashMap<ClientId, mpsc::Sender<M>>,
    max_send_queue: usize,
}

impl<M: Clone> StreamRegistry<M> {
    pub fn new(name: &'static str, max_send_queue: usize) -> Self {
        Self {
            name,
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Add a fresh handle to the pool and hand back its receive side.
    pub fn join(&self) -> (ClientId, mpsc::Receiver<M>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients.insert(id.clone(), tx);
        (id, rx)
    }

    /// Remove a handle. Removing an already-absent handle is a no-op.
    pub fn leave(&self, id: &ClientId) {
        self.clients.remove(id);
    }

    /// Write `message` to every handle present when the call started.
    ///
    /// Membership is snapshotted up front: a handle joining mid-broadcast
    /// is not served, a handle leaving mid-broadcast at worst fails its
    /// one write. Returns the number of successful writes.
    pub fn broadcast(&self, message: &M) -> usize {
        let snapshot: Vec<(ClientId, mpsc::Sender<M>)> = self
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut sent = 0;
        for (id, tx) in snapshot {
            match tx.try_send(message.clone()) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        pool = self.name,
                        client_id = %id,
                        "Send queue full, dropping message"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(
                        pool = self.name,
                        client_id = %id,
                        "Write to closed client failed"
                    );
                }
            }
        }
        sent
    }

    /// Number of handles currently in the pool.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
