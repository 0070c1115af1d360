//! Request/response plumbing between the signer window and its backend.
//!
//! Every backend call runs on the rayon pool and reports back through one
//! `mpsc` channel that the UI drains in `update()`. Collaborator stderr
//! travels on a separate notification channel owned by the backend.

use std::sync::{Arc, mpsc};

use crate::ops::bridge::{
    BridgeError, LoadedPreview, ProcessRequest, SaveRequest, SignatureBackend, SignerConfig,
};
use crate::session::PreviewTicket;

/// Completed backend call. Errors are flattened to their display text.
#[derive(Debug)]
pub enum SignerMessage {
    ConfigLoaded(Result<SignerConfig, String>),
    PreviewLoaded {
        ticket: PreviewTicket,
        result: Result<LoadedPreview, String>,
    },
    PositionSaved(Result<String, String>),
    DocumentsProcessed(Result<String, String>),
}

pub struct SignerDispatcher {
    backend: Arc<dyn SignatureBackend>,
    sender: mpsc::Sender<SignerMessage>,
    receiver: mpsc::Receiver<SignerMessage>,
    /// Requests sent but not yet drained. Keeps repaint polling alive.
    pending: usize,
}

impl SignerDispatcher {
    pub fn new(backend: Arc<dyn SignatureBackend>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            backend,
            sender,
            receiver,
            pending: 0,
        }
    }

    /// Route future calls to `backend`. Calls already in flight keep the old
    /// one and still answer on this dispatcher's channel.
    pub fn set_backend(&mut self, backend: Arc<dyn SignatureBackend>) {
        self.backend = backend;
    }

    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    pub fn load_config(&mut self) {
        self.spawn(|backend| SignerMessage::ConfigLoaded(flatten(backend.initial_data())));
    }

    /// Fetch and decode a preview off the UI thread. The ticket travels with
    /// the response so the session can drop superseded ones.
    pub fn request_preview(&mut self, ticket: PreviewTicket) {
        self.spawn(move |backend| {
            let result = backend
                .preview(&ticket.signer)
                .and_then(|payload| payload.decode());
            SignerMessage::PreviewLoaded {
                ticket,
                result: flatten(result),
            }
        });
    }

    pub fn save(&mut self, request: SaveRequest) {
        self.spawn(move |backend| SignerMessage::PositionSaved(flatten(backend.save_position(&request))));
    }

    pub fn process(&mut self, request: ProcessRequest) {
        self.spawn(move |backend| {
            SignerMessage::DocumentsProcessed(flatten(backend.process_documents(&request)))
        });
    }

    /// Non-blocking drain of finished requests.
    pub fn try_recv(&mut self) -> Option<SignerMessage> {
        let msg = self.receiver.try_recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(msg)
    }

    fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce(&dyn SignatureBackend) -> SignerMessage + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        self.pending += 1;
        rayon::spawn(move || {
            let _ = sender.send(job(backend.as_ref()));
        });
    }
}

fn flatten<T>(result: Result<T, BridgeError>) -> Result<T, String> {
    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::bridge::{PreviewPayload, SignerEntry, SignerKind, SignerRef};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        saved: Mutex<Vec<[String; 4]>>,
        delay: Duration,
    }

    impl SignatureBackend for FakeBackend {
        fn initial_data(&self) -> Result<SignerConfig, BridgeError> {
            Ok(SignerConfig {
                drivers: vec![SignerEntry {
                    name: "joao.png".into(),
                    display_name: None,
                    has_position_defined: false,
                }],
                responsaveis: Vec::new(),
            })
        }

        fn preview(&self, _signer: &SignerRef) -> Result<PreviewPayload, BridgeError> {
            Ok(PreviewPayload::default())
        }

        fn save_position(&self, request: &SaveRequest) -> Result<String, BridgeError> {
            std::thread::sleep(self.delay);
            if let Ok(mut saved) = self.saved.lock() {
                saved.push(request.position.clone());
            }
            Ok("Position saved.".into())
        }

        fn process_documents(&self, _request: &ProcessRequest) -> Result<String, BridgeError> {
            Err(BridgeError::ScriptFailed("no PDFs in input".into()))
        }
    }

    fn wait(dispatcher: &mut SignerDispatcher) -> SignerMessage {
        for _ in 0..500 {
            if let Some(msg) = dispatcher.try_recv() {
                return msg;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("backend call never completed");
    }

    #[test]
    fn config_and_save_round_trip_through_the_pool() {
        let backend = Arc::new(FakeBackend::default());
        let mut dispatcher = SignerDispatcher::new(backend.clone());

        dispatcher.load_config();
        assert!(dispatcher.has_pending());
        match wait(&mut dispatcher) {
            SignerMessage::ConfigLoaded(Ok(config)) => assert_eq!(config.drivers.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dispatcher.has_pending());

        dispatcher.save(SaveRequest {
            signer: SignerRef::new("joao.png", SignerKind::Driver),
            position: ["1.00".into(), "2.00".into(), "3.00".into(), "4.00".into()],
        });
        match wait(&mut dispatcher) {
            SignerMessage::PositionSaved(Ok(msg)) => assert_eq!(msg, "Position saved."),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.saved.lock().unwrap()[0][3], "4.00");
    }

    #[test]
    fn preview_response_carries_its_ticket() {
        let mut dispatcher = SignerDispatcher::new(Arc::new(FakeBackend::default()));
        let ticket = PreviewTicket {
            seq: 7,
            signer: SignerRef::new("Maria", SignerKind::Responsavel),
        };
        dispatcher.request_preview(ticket.clone());
        match wait(&mut dispatcher) {
            SignerMessage::PreviewLoaded { ticket: got, result } => {
                assert_eq!(got, ticket);
                let preview = result.unwrap();
                assert!(preview.page.is_none());
                assert!(preview.position.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn backend_errors_arrive_as_text() {
        let mut dispatcher = SignerDispatcher::new(Arc::new(FakeBackend::default()));
        dispatcher.process(ProcessRequest {
            emissor_file: "a.png".into(),
            receptor_file: "b.png".into(),
        });
        match wait(&mut dispatcher) {
            SignerMessage::DocumentsProcessed(Err(e)) => assert_eq!(e, "no PDFs in input"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn swapping_backend_keeps_in_flight_replies() {
        let slow = Arc::new(FakeBackend {
            delay: Duration::from_millis(50),
            ..FakeBackend::default()
        });
        let mut dispatcher = SignerDispatcher::new(slow.clone());
        dispatcher.save(SaveRequest {
            signer: SignerRef::new("joao.png", SignerKind::Driver),
            position: ["1.00".into(), "2.00".into(), "3.00".into(), "4.00".into()],
        });

        let replacement = Arc::new(FakeBackend::default());
        dispatcher.set_backend(replacement.clone());
        assert!(dispatcher.has_pending());

        match wait(&mut dispatcher) {
            SignerMessage::PositionSaved(Ok(msg)) => assert_eq!(msg, "Position saved."),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dispatcher.has_pending());
        assert_eq!(slow.saved.lock().unwrap().len(), 1);

        dispatcher.load_config();
        assert!(matches!(wait(&mut dispatcher), SignerMessage::ConfigLoaded(Ok(_))));
        assert!(replacement.saved.lock().unwrap().is_empty());
    }
}
