//! Running an [`OfflineWorker`] on its own thread.
//!
//! The worker owns its storage and network outright; the rest of the
//! application reaches it only through message passing.

use crate::error::CacheError;
use crate::http::{Request, Response};
use crate::network::Network;
use crate::worker::{ClientAction, OfflineWorker, WorkerState};
use enigma_common::{FetchError, Fetcher, ProgressFn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

type Reply<T> = Sender<Result<T, CacheError>>;

enum Command {
    Install(Reply<()>),
    Activate(Reply<Vec<String>>),
    Fetch(Request, Reply<Response>),
    State(Sender<WorkerState>),
    Push(String),
    NotificationClick,
    Sync(String),
    Shutdown,
}

/// Owns the worker thread. Dropping the handle stops the worker.
pub struct WorkerHandle {
    commands: Sender<Command>,
    actions: Receiver<ClientAction>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<N: Network + Send + 'static>(worker: OfflineWorker<N>) -> Result<Self, CacheError> {
        let (commands, inbox) = mpsc::channel();
        let (outbox, actions) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("offline-worker".into())
            .spawn(move || run(worker, inbox, outbox))?;
        Ok(Self {
            commands,
            actions,
            thread: Some(thread),
        })
    }

    /// A cloneable endpoint for talking to the worker.
    pub fn client(&self) -> WorkerClient {
        WorkerClient {
            commands: self.commands.clone(),
        }
    }

    /// Drain client actions produced since the last call.
    pub fn poll_actions(&self) -> Vec<ClientAction> {
        self.actions.try_iter().collect()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("offline worker thread panicked");
            }
        }
    }
}

fn run<N: Network>(
    mut worker: OfflineWorker<N>,
    inbox: Receiver<Command>,
    outbox: Sender<ClientAction>,
) {
    tracing::debug!("offline worker running");
    for command in inbox {
        match command {
            Command::Install(reply) => {
                let _ = reply.send(worker.install());
            }
            Command::Activate(reply) => {
                let _ = reply.send(worker.activate());
            }
            Command::Fetch(request, reply) => {
                let _ = reply.send(worker.handle_fetch(&request));
            }
            Command::State(reply) => {
                let _ = reply.send(worker.state());
            }
            Command::Push(text) => {
                let _ = outbox.send(worker.handle_push(&text));
            }
            Command::NotificationClick => {
                let _ = outbox.send(worker.handle_notification_click());
            }
            Command::Sync(tag) => {
                worker.handle_sync(&tag);
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!("offline worker stopped");
}

/// Sending half of a [`WorkerHandle`]. Requests block until the worker
/// answers.
#[derive(Clone)]
pub struct WorkerClient {
    commands: Sender<Command>,
}

impl WorkerClient {
    pub fn install(&self) -> Result<(), CacheError> {
        self.request(Command::Install)
    }

    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.request(Command::Activate)
    }

    pub fn fetch_request(&self, request: Request) -> Result<Response, CacheError> {
        self.request(|reply| Command::Fetch(request, reply))
    }

    pub fn state(&self) -> Result<WorkerState, CacheError> {
        let (tx, rx) = mpsc::channel();
        self.send(Command::State(tx))?;
        rx.recv().map_err(|_| CacheError::WorkerStopped)
    }

    pub fn push(&self, text: impl Into<String>) -> Result<(), CacheError> {
        self.send(Command::Push(text.into()))
    }

    pub fn notification_click(&self) -> Result<(), CacheError> {
        self.send(Command::NotificationClick)
    }

    pub fn sync(&self, tag: impl Into<String>) -> Result<(), CacheError> {
        self.send(Command::Sync(tag.into()))
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, CacheError> {
        let (tx, rx) = mpsc::channel();
        self.send(build(tx))?;
        rx.recv().map_err(|_| CacheError::WorkerStopped)?
    }

    fn send(&self, command: Command) -> Result<(), CacheError> {
        self.commands
            .send(command)
            .map_err(|_| CacheError::WorkerStopped)
    }
}

impl Fetcher for WorkerClient {
    async fn fetch(
        &self,
        locator: &str,
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<u8>, FetchError> {
        let response = match self.fetch_request(Request::get(locator)) {
            Ok(response) => response,
            Err(CacheError::Fetch(e)) => return Err(e),
            Err(e) => return Err(FetchError::Network(e.to_string())),
        };
        match response.status {
            200..=299 => {
                let len = response.body.len() as u64;
                progress(len, Some(len));
                Ok(response.body)
            }
            404 => Err(FetchError::NotFound(locator.to_string())),
            status => Err(FetchError::Status {
                status,
                url: locator.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FileNetwork;
    use crate::storage::CacheStorage;
    use crate::worker::WorkerConfig;

    fn spawn_site() -> (tempfile::TempDir, WorkerHandle) {
        let tmp = tempfile::tempdir().unwrap();
        let site = tmp.path().join("site");
        std::fs::create_dir_all(site.join("models")).unwrap();
        std::fs::write(site.join("index.html"), "<html>").unwrap();
        std::fs::write(site.join("models/a.glb"), [9u8; 32]).unwrap();

        let storage = CacheStorage::new(tmp.path().join("cache")).unwrap();
        let network = FileNetwork::new(&site, "https://enigma.local");
        let config = WorkerConfig {
            cache_name: "test-v1".into(),
            precache: vec!["/".into()],
        };
        let handle = WorkerHandle::spawn(OfflineWorker::new(storage, network, config)).unwrap();
        (tmp, handle)
    }

    #[test]
    fn lifecycle_over_channels() {
        let (_tmp, handle) = spawn_site();
        let client = handle.client();
        assert_eq!(client.state().unwrap(), WorkerState::Parsed);
        client.install().unwrap();
        assert!(client.activate().unwrap().is_empty());
        assert_eq!(client.state().unwrap(), WorkerState::Activated);

        let r = client.fetch_request(Request::get("/")).unwrap();
        assert_eq!(r.body, b"<html>");
    }

    #[test]
    fn client_is_a_fetcher() {
        let (tmp, handle) = spawn_site();
        let client = handle.client();
        client.install().unwrap();
        client.activate().unwrap();

        let mut reported = Vec::new();
        let bytes = pollster::block_on(
            client.fetch("/models/a.glb", &mut |loaded, total| reported.push((loaded, total))),
        )
        .unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(reported, vec![(32, Some(32))]);

        // Served from the cache once the file is gone.
        std::fs::remove_file(tmp.path().join("site/models/a.glb")).unwrap();
        let again = pollster::block_on(client.fetch("/models/a.glb", &mut |_, _| {})).unwrap();
        assert_eq!(again, bytes);

        let missing = pollster::block_on(client.fetch("/nope.glb", &mut |_, _| {}));
        assert!(matches!(missing, Err(FetchError::NotFound(_))));
    }

    #[test]
    fn notifications_surface_as_actions() {
        let (_tmp, handle) = spawn_site();
        let client = handle.client();
        client.push("hello").unwrap();
        client.notification_click().unwrap();
        client.sync("enigma-sync").unwrap();
        // A round trip guarantees the earlier messages were processed.
        client.state().unwrap();

        let actions = handle.poll_actions();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], ClientAction::ShowNotification { body, .. } if body == "hello"));
        assert_eq!(actions[1], ClientAction::OpenWindow("/".into()));
    }

    #[test]
    fn dropped_handle_stops_the_client() {
        let (_tmp, handle) = spawn_site();
        let client = handle.client();
        drop(handle);
        assert!(matches!(client.install(), Err(CacheError::WorkerStopped)));
    }
}
