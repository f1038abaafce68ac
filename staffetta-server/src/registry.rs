use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Identificatore di una singola connessione, assegnato dalla directory.
pub type ConnId = u64;

/// Directory identità → connessioni vive.
///
/// L'unità di fanout è l'identità utente: ogni utente può avere zero o più
/// connessioni registrate (multi-dispositivo) e tutte ricevono gli stessi
/// eventi. La mappa vive solo in memoria di processo e viene ricostruita
/// ad ogni riconnessione.
pub struct ConnectionRegistry {
    sessions: DashMap<String, Vec<(ConnId, UnboundedSender<String>)>>,
    next_conn_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            sessions: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Associa una connessione viva all'identità e ritorna l'id da usare
    /// per la deregistrazione.
    pub fn register(&self, user_id: &str, tx: UnboundedSender<String>) -> ConnId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .entry(user_id.to_string())
            .or_default()
            .push((conn_id, tx));
        conn_id
    }

    /// Rimuove la connessione; la voce utente sparisce quando resta vuota.
    pub fn unregister(&self, user_id: &str, conn_id: ConnId) {
        if let Some(mut entry) = self.sessions.get_mut(user_id) {
            entry.retain(|(id, _)| *id != conn_id);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.sessions.remove_if(user_id, |_, conns| conns.is_empty());
            }
        }
    }

    /// Invia il payload ad ogni connessione registrata per l'identità.
    ///
    /// No-op se non ce ne sono (l'evento resta comunque durevole grazie alla
    /// persistenza a monte). Il fallimento di send su una connessione non
    /// blocca la consegna alle altre: il canale chiuso viene semplicemente
    /// ignorato, la pulizia avviene alla disconnessione del socket.
    pub fn deliver(&self, user_id: &str, payload: &str) {
        if let Some(entry) = self.sessions.get(user_id) {
            for (_, tx) in entry.iter() {
                let _ = tx.send(payload.to_string());
            }
        }
    }

    /// Numero di connessioni vive per l'identità.
    pub fn connections(&self, user_id: &str) -> usize {
        self.sessions.get(user_id).map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
