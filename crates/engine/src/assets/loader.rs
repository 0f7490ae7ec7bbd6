use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, info, warn};

use super::model::{clips_from_file, load_model, ModelAsset};
use super::AssetError;
use crate::app::AnimationClip;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipRequestSource {
    /// Index into the model's own animation list.
    Embedded(usize),
    /// First animation of a separate clip file.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub name: String,
    pub source: ClipRequestSource,
}

#[derive(Debug, Clone)]
pub struct ActorLoadRequest {
    pub slot: usize,
    pub name: String,
    pub model_path: PathBuf,
    /// Loaded in order. Empty means "use the model's animations as named".
    pub clips: Vec<ClipRequest>,
    /// `(mesh name, material name)` pairs.
    pub material_bindings: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartMaterial {
    pub mesh_name: String,
    pub material: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedActor {
    pub slot: usize,
    pub name: String,
    pub model: ModelAsset,
    pub clips: Vec<AnimationClip>,
    pub parts: Vec<PartMaterial>,
}

#[derive(Debug, Clone)]
pub enum AssetEvent {
    ActorLoaded(LoadedActor),
    ActorFailed {
        slot: usize,
        name: String,
        reason: String,
    },
    AllSettled,
}

/// Loads one actor: model first, then each clip in request order. Any
/// failing clip fails the whole actor.
pub fn load_actor(request: &ActorLoadRequest) -> Result<LoadedActor, AssetError> {
    let model = load_model(&request.model_path)?;

    let clips = if request.clips.is_empty() {
        model.clips.clone()
    } else {
        let mut clips = Vec::with_capacity(request.clips.len());
        for clip in &request.clips {
            let source_clip = match &clip.source {
                ClipRequestSource::Embedded(index) => {
                    model.clips.get(*index).cloned().ok_or_else(|| {
                        AssetError::MissingEmbeddedClip {
                            path: request.model_path.clone(),
                            index: *index,
                        }
                    })?
                }
                ClipRequestSource::File(path) => {
                    let mut from_file = clips_from_file(path)?;
                    from_file.swap_remove(0)
                }
            };
            debug!(
                actor = %request.name,
                clip = %clip.name,
                duration_seconds = source_clip.duration_seconds,
                "actor_clip_loaded"
            );
            clips.push(AnimationClip::new(clip.name.clone(), source_clip.duration_seconds));
        }
        clips
    };

    let parts = model
        .mesh_names
        .iter()
        .map(|mesh_name| PartMaterial {
            mesh_name: mesh_name.clone(),
            material: request
                .material_bindings
                .iter()
                .find(|(mesh, _)| mesh == mesh_name)
                .map(|(_, material)| material.clone()),
        })
        .collect();

    Ok(LoadedActor {
        slot: request.slot,
        name: request.name.clone(),
        model,
        clips,
        parts,
    })
}

/// Receiving end of a background stage load.
///
/// Dropping it disconnects the channel; the worker notices on its next send
/// and exits without loading the remaining actors.
pub struct StageLoader {
    receiver: Receiver<AssetEvent>,
    handle: Option<thread::JoinHandle<()>>,
    settled: bool,
}

pub fn spawn_stage_loader(requests: Vec<ActorLoadRequest>) -> Result<StageLoader, AssetError> {
    let (sender, receiver) = mpsc::channel::<AssetEvent>();
    let handle = thread::Builder::new()
        .name("toonstage-asset-loader".into())
        .spawn(move || {
            for request in requests {
                let event = match load_actor(&request) {
                    Ok(actor) => {
                        info!(
                            actor = %actor.name,
                            clips = actor.clips.len(),
                            meshes = actor.parts.len(),
                            "actor_loaded"
                        );
                        AssetEvent::ActorLoaded(actor)
                    }
                    Err(error) => {
                        warn!(actor = %request.name, error = %error, "actor_load_failed");
                        AssetEvent::ActorFailed {
                            slot: request.slot,
                            name: request.name.clone(),
                            reason: error.to_string(),
                        }
                    }
                };
                if sender.send(event).is_err() {
                    debug!("asset_loader_receiver_dropped");
                    return;
                }
            }
            let _ = sender.send(AssetEvent::AllSettled);
        })
        .map_err(|source| AssetError::SpawnLoader { source })?;

    let mut loader = StageLoader::from_receiver(receiver);
    loader.handle = Some(handle);
    Ok(loader)
}

impl StageLoader {
    /// Wraps a channel fed by some other producer. The loader counts as
    /// settled once `AllSettled` arrives or every sender is gone.
    pub fn from_receiver(receiver: Receiver<AssetEvent>) -> Self {
        Self {
            receiver,
            handle: None,
            settled: false,
        }
    }

    /// Drains every event available now without blocking.
    pub fn poll(&mut self, out: &mut Vec<AssetEvent>) {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if matches!(event, AssetEvent::AllSettled) {
                        self.settled = true;
                    }
                    out.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.settled = true;
                    if let Some(handle) = self.handle.take() {
                        if handle.join().is_err() {
                            warn!("asset_loader_panicked");
                        }
                    }
                    break;
                }
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }
}
