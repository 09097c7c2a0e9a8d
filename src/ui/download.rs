use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender};

use crate::model_download::{ModelDownloadEvent, ModelKind, ensure_model_ready};

#[derive(Debug)]
pub(super) enum DownloadMessage {
    Event(ModelDownloadEvent),
    Error(String),
    Done,
}

/// Progress of the model downloads as shown in the landmark panel.
#[derive(Clone, Debug)]
pub(super) struct DownloadState {
    pub(super) model: Option<ModelKind>,
    pub(super) downloaded: u64,
    pub(super) total: Option<u64>,
    pub(super) message: String,
    pub(super) error: Option<String>,
    finished: bool,
}

impl DownloadState {
    pub(super) fn new() -> Self {
        Self {
            model: None,
            downloaded: 0,
            total: None,
            message: "Checking hand landmark models...".to_string(),
            error: None,
            finished: false,
        }
    }

    pub(super) fn is_ready(&self) -> bool {
        self.finished && self.error.is_none()
    }

    pub(super) fn poll(&mut self, rx: &Receiver<DownloadMessage>) {
        while let Ok(msg) = rx.try_recv() {
            self.apply(msg);
        }
    }

    fn apply(&mut self, msg: DownloadMessage) {
        match msg {
            DownloadMessage::Event(event) => {
                let model = event.model();
                self.model = Some(model);
                match event {
                    ModelDownloadEvent::AlreadyPresent { .. } => {
                        self.message = format!("{} model already present", model.label());
                    }
                    ModelDownloadEvent::Started { total, .. } => {
                        self.downloaded = 0;
                        self.total = total;
                        self.message = format!("Downloading {} model...", model.label());
                    }
                    ModelDownloadEvent::Progress {
                        downloaded, total, ..
                    } => {
                        self.downloaded = downloaded;
                        self.total = total;
                    }
                    ModelDownloadEvent::Finished { .. } => {
                        self.message = format!("{} model ready", model.label());
                    }
                }
            }
            DownloadMessage::Error(err) => {
                self.error = Some(err);
                self.message = "Model download failed".to_string();
            }
            DownloadMessage::Done => {
                self.finished = true;
                self.message = "Models ready, opening camera...".to_string();
            }
        }
    }

    pub(super) fn detail(&self) -> String {
        match self.total {
            _ if self.finished => "Done".to_string(),
            Some(total) if total > 0 => {
                let percent = (self.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("Downloaded {} KB", self.downloaded / 1024),
        }
    }

    pub(super) fn bar(&self) -> String {
        progress_bar_string(self.downloaded, self.total)
    }
}

/// Fetches every missing model into `model_dir`, then sends `Done`.
pub(super) fn spawn_model_download(
    model_dir: PathBuf,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for kind in ModelKind::ALL {
            let path = model_dir.join(kind.file_name());
            let result = ensure_model_ready(kind, &path, |event| {
                let _ = tx.send(DownloadMessage::Event(event));
            });

            if let Err(err) = result {
                log::error!("failed to download {} model: {err:?}", kind.label());
                let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
                return;
            }
        }
        let _ = tx.send(DownloadMessage::Done);
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 24;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => {
            let head = (downloaded / (64 * 1024)) as usize % BAR_LEN + 1;
            format!("[{:-<head$}] unknown size", ">")
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;

    #[test]
    fn bar_fills_with_known_total() {
        assert_eq!(
            progress_bar_string(50, Some(100)),
            format!("[{}{}]  50.0%", "=".repeat(12), " ".repeat(12))
        );
        assert!(progress_bar_string(200, Some(100)).ends_with("100.0%"));
    }

    #[test]
    fn bar_without_total_is_a_spinner() {
        let bar = progress_bar_string(0, None);
        assert_eq!(bar, "[>] unknown size");
    }

    #[test]
    fn ready_only_after_done_without_error() {
        let (tx, rx) = unbounded();
        let mut state = DownloadState::new();

        tx.send(DownloadMessage::Event(ModelDownloadEvent::Started {
            model: ModelKind::PalmDetector,
            total: Some(2048),
        }))
        .unwrap();
        tx.send(DownloadMessage::Event(ModelDownloadEvent::Progress {
            model: ModelKind::PalmDetector,
            downloaded: 1024,
            total: Some(2048),
        }))
        .unwrap();
        state.poll(&rx);
        assert!(!state.is_ready());
        assert_eq!(state.model, Some(ModelKind::PalmDetector));
        assert_eq!(state.detail(), "50.0%");

        tx.send(DownloadMessage::Done).unwrap();
        state.poll(&rx);
        assert!(state.is_ready());
        assert_eq!(state.detail(), "Done");
    }

    #[test]
    fn error_blocks_readiness() {
        let (tx, rx) = unbounded();
        let mut state = DownloadState::new();
        tx.send(DownloadMessage::Error("offline".into())).unwrap();
        state.poll(&rx);

        assert!(!state.is_ready());
        assert_eq!(state.error.as_deref(), Some("offline"));
    }
}
