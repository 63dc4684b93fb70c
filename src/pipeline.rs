//! Drop handling and the asynchronous load → bind pipeline.
//!
//! A drop spawns the pipeline on the tokio runtime and returns immediately.
//! Finished loads come back through a channel that the frame loop drains
//! without blocking. Every drop starts a new generation: the previous task
//! is aborted and anything it still manages to send is discarded, so a slow
//! stale load can never overwrite a newer one.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::avatar::{self, Avatar, ByteSource, DroppedFile};
use crate::error::LoadError;

/// Identifies one started load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub source: String,
}

/// A finished pipeline run.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub source: String,
    pub result: Result<Avatar, LoadError>,
}

/// Turns file drops into pipeline runs.
pub struct DropHandler {
    runtime: Handle,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
}

impl DropHandler {
    pub fn new(runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            tx,
            rx,
            generation: 0,
            in_flight: None,
        }
    }

    /// A drag is hovering over the window. Every drag is accepted.
    pub fn on_drag_over(&self, files: usize) -> bool {
        tracing::trace!("Drag over with {} file(s)", files);
        true
    }

    /// Start loading the first dropped file. Other files are ignored; an
    /// empty drop does nothing.
    pub fn on_drop(&mut self, files: &[DroppedFile]) -> Option<LoadTicket> {
        let first = files.first()?;
        if files.len() > 1 {
            tracing::debug!("Ignoring {} additional dropped file(s)", files.len() - 1);
        }

        let Some(source) = ByteSource::from_dropped(first) else {
            tracing::warn!("Dropped file '{}' has neither a path nor contents", first.name);
            return None;
        };

        Some(self.open(source))
    }

    /// Start loading a source, superseding any load still in flight.
    pub fn open(&mut self, source: ByteSource) -> LoadTicket {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let name = source.name();
        tracing::info!("Loading {} (generation {})", name, generation);

        let tx = self.tx.clone();
        let source_name = name.clone();
        self.in_flight = Some(self.runtime.spawn(async move {
            let result = run_pipeline(source).await;
            // The receiver only disappears on shutdown
            let _ = tx.send(Completion {
                generation,
                source: source_name,
                result,
            });
        }));

        LoadTicket {
            generation,
            source: name,
        }
    }

    /// Abort the load in flight, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.in_flight.take() {
            if !task.is_finished() {
                tracing::debug!("Cancelling load generation {}", self.generation);
            }
            task.abort();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Current generation (0 before the first drop)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next completion of the current generation, without blocking.
    pub fn try_completion(&mut self) -> Option<Completion> {
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    /// Wait for the next completion of the current generation.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        while let Some(completion) = self.rx.recv().await {
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    fn accept(&mut self, completion: Completion) -> Option<Completion> {
        if completion.generation != self.generation {
            tracing::debug!(
                "Discarding stale load of {} (generation {}, current {})",
                completion.source,
                completion.generation,
                self.generation
            );
            return None;
        }
        self.in_flight = None;
        Some(completion)
    }
}

impl Drop for DropHandler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Load then bind.
pub async fn run_pipeline(source: ByteSource) -> Result<Avatar, LoadError> {
    let scene = avatar::load_async(source).await?;
    avatar::bind_async(scene).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{fixtures, HumanBone};
    use crate::config::Config;
    use crate::driver::testing::RecordingRenderer;
    use crate::state::{InstallOutcome, ViewerState};

    fn rig_file(name: &str, with_head: bool) -> DroppedFile {
        DroppedFile::from_bytes(name, fixtures::glb(&fixtures::rig_json(true, with_head)))
    }

    #[tokio::test]
    async fn test_empty_drop_is_noop() {
        let mut handler = DropHandler::new(Handle::current());
        let mut state = ViewerState::new(Config::default());
        let camera = state.camera.clone();

        assert!(handler.on_drop(&[]).is_none());
        assert_eq!(handler.generation(), 0);
        assert!(!handler.is_loading());
        assert!(handler.try_completion().is_none());
        assert!(state.scene.avatar().is_none());
        assert_eq!(state.camera, camera);

        // The frame loop keeps going
        let mut renderer = RecordingRenderer::default();
        crate::driver::FrameDriver::default().tick(&mut state, 0.016, &mut renderer);
        assert_eq!(renderer.renders, 1);
    }

    #[tokio::test]
    async fn test_drop_loads_and_frames() {
        let mut handler = DropHandler::new(Handle::current());
        let mut state = ViewerState::new(Config::default());
        let mut renderer = RecordingRenderer::default();

        let ticket = handler.on_drop(&[rig_file("a.vrm", true)]).unwrap();
        assert_eq!(ticket.source, "a.vrm");

        let completion = handler.next_completion().await.unwrap();
        assert_eq!(completion.generation, ticket.generation);

        let outcome = state.apply(completion.result, &mut renderer).unwrap();
        assert!(matches!(outcome, InstallOutcome::Framed { .. }));
        assert!((state.camera.position.y - 1.7).abs() < 1e-5);
        assert_eq!(state.scene.avatar().unwrap().name(), "a.vrm");
    }

    #[tokio::test]
    async fn test_only_first_file_is_loaded() {
        let mut handler = DropHandler::new(Handle::current());

        let ticket = handler
            .on_drop(&[rig_file("first.vrm", true), rig_file("second.vrm", false)])
            .unwrap();
        assert_eq!(ticket.source, "first.vrm");

        let completion = handler.next_completion().await.unwrap();
        assert_eq!(completion.result.unwrap().name(), "first.vrm");
    }

    #[tokio::test]
    async fn test_newer_drop_wins() {
        let mut handler = DropHandler::new(Handle::current());

        let first = handler.on_drop(&[rig_file("old.vrm", true)]).unwrap();
        let second = handler.on_drop(&[rig_file("new.vrm", false)]).unwrap();
        assert!(second.generation > first.generation);

        let completion = handler.next_completion().await.unwrap();
        assert_eq!(completion.generation, second.generation);
        let avatar = completion.result.unwrap();
        assert_eq!(avatar.name(), "new.vrm");
        assert!(avatar.bone_node(HumanBone::Head).is_none());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let mut handler = DropHandler::new(Handle::current());
        let ticket = handler.on_drop(&[rig_file("current.vrm", true)]).unwrap();

        handler
            .tx
            .send(Completion {
                generation: ticket.generation - 1,
                source: "stale.vrm".into(),
                result: Err(LoadError::Cancelled),
            })
            .unwrap();

        let completion = handler.next_completion().await.unwrap();
        assert_eq!(completion.source, "current.vrm");
    }

    #[tokio::test]
    async fn test_unreadable_drop_reports_hard_failure() {
        let mut handler = DropHandler::new(Handle::current());
        let mut state = ViewerState::new(Config::default());
        let mut renderer = RecordingRenderer::default();

        handler.on_drop(&[DroppedFile::from_bytes("junk.vrm", b"not a model".to_vec())]);
        let completion = handler.next_completion().await.unwrap();
        assert!(matches!(completion.result, Err(LoadError::Parse { .. })));

        assert!(state.apply(completion.result, &mut renderer).is_none());
        assert!(state.scene.avatar().is_none());
    }

    #[tokio::test]
    async fn test_malformed_mesh_is_parse_failure() {
        let mut handler = DropHandler::new(Handle::current());
        let mut state = ViewerState::new(Config::default());
        let mut renderer = RecordingRenderer::default();

        handler.on_drop(&[DroppedFile::from_bytes("short.glb", fixtures::skinned_glb(1))]);
        let completion = handler.next_completion().await.unwrap();
        assert!(
            matches!(completion.result, Err(LoadError::Parse { .. })),
            "{:?}",
            completion.result
        );

        assert!(state.apply(completion.result, &mut renderer).is_none());
        assert!(state.scene.avatar().is_none());
    }

    #[tokio::test]
    async fn test_drag_over_has_no_side_effects() {
        let handler = DropHandler::new(Handle::current());
        assert!(handler.on_drag_over(3));
        assert_eq!(handler.generation(), 0);
        assert!(!handler.is_loading());
    }

    #[tokio::test]
    async fn test_drop_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("disk.vrm");
        std::fs::write(&path, fixtures::glb(&fixtures::rig_json(true, true))).unwrap();

        let mut handler = DropHandler::new(Handle::current());
        handler.on_drop(&[DroppedFile::from_path(&path)]).unwrap();

        let completion = handler.next_completion().await.unwrap();
        assert_eq!(completion.result.unwrap().name(), "disk.vrm");
        assert!(handler.try_completion().is_none());
    }
}
