use engine::{ActorHitVolume, AnimationMixer, EntityId, LocomotionClips, Quat, Vec3};

/// Index of the actor's slot in the stage manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ActorId(pub usize);

#[derive(Debug, Clone)]
pub(crate) struct Actor {
    pub id: ActorId,
    pub name: String,
    pub entity: EntityId,
    pub position: Vec3,
    pub orientation: Quat,
    pub target_orientation: Quat,
    pub mixer: AnimationMixer,
    pub locomotion: LocomotionClips,
    /// Model-space bounds, scaled by `scale` for picking.
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub scale: f32,
}

impl Actor {
    pub(crate) fn hit_volume(&self) -> ActorHitVolume {
        ActorHitVolume::from_bounds(self.position, self.bounds_min, self.bounds_max, self.scale)
    }

    pub(crate) fn active_clip(&self) -> Option<&str> {
        self.mixer.active_clip()
    }

    /// Normalized time of the active clip, used for the stride bob.
    pub(crate) fn stride_phase(&self) -> Option<f32> {
        let name = self.mixer.active_clip()?;
        let duration = self
            .mixer
            .clips()
            .iter()
            .find(|clip| clip.name == name)
            .map(|clip| clip.duration_seconds)?;
        if duration <= 0.0 {
            return Some(0.0);
        }
        self.mixer.clip_time(name).map(|time| time / duration)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ActorSlot {
    Loading { name: String },
    Ready(Box<Actor>),
    Failed { name: String, reason: String },
}

impl ActorSlot {
    pub(crate) fn name(&self) -> &str {
        match self {
            ActorSlot::Loading { name } | ActorSlot::Failed { name, .. } => name,
            ActorSlot::Ready(actor) => &actor.name,
        }
    }

    pub(crate) fn state_label(&self) -> &'static str {
        match self {
            ActorSlot::Loading { .. } => "loading",
            ActorSlot::Ready(_) => "ready",
            ActorSlot::Failed { .. } => "failed",
        }
    }
}

/// One slot per manifest actor. Slots only move forward: `Loading` becomes
/// `Ready` or `Failed` once and never changes again.
#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    slots: Vec<ActorSlot>,
}

impl Roster {
    pub(crate) fn loading<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names
                .into_iter()
                .map(|name| ActorSlot::Loading { name: name.into() })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (ActorId, &ActorSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (ActorId(index), slot))
    }

    pub(crate) fn slot(&self, id: ActorId) -> Option<&ActorSlot> {
        self.slots.get(id.0)
    }

    pub(crate) fn get(&self, id: ActorId) -> Option<&Actor> {
        match self.slots.get(id.0)? {
            ActorSlot::Ready(actor) => Some(actor.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        match self.slots.get_mut(id.0)? {
            ActorSlot::Ready(actor) => Some(actor.as_mut()),
            _ => None,
        }
    }

    pub(crate) fn ready(&self) -> impl Iterator<Item = &Actor> {
        self.slots.iter().filter_map(|slot| match slot {
            ActorSlot::Ready(actor) => Some(actor.as_ref()),
            _ => None,
        })
    }

    pub(crate) fn ready_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            ActorSlot::Ready(actor) => Some(actor.as_mut()),
            _ => None,
        })
    }

    pub(crate) fn ready_count(&self) -> usize {
        self.ready().count()
    }

    pub(crate) fn is_settled(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|slot| matches!(slot, ActorSlot::Loading { .. }))
    }

    /// Returns `false` when the slot does not exist or has already settled.
    pub(crate) fn mark_ready(&mut self, actor: Actor) -> bool {
        match self.slots.get_mut(actor.id.0) {
            Some(slot @ ActorSlot::Loading { .. }) => {
                *slot = ActorSlot::Ready(Box::new(actor));
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_failed(&mut self, id: ActorId, reason: impl Into<String>) -> bool {
        match self.slots.get_mut(id.0) {
            Some(slot @ ActorSlot::Loading { .. }) => {
                let name = slot.name().to_string();
                *slot = ActorSlot::Failed {
                    name,
                    reason: reason.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Every slot still loading becomes failed with `reason`.
    pub(crate) fn fail_pending(&mut self, reason: &str) -> usize {
        let pending: Vec<ActorId> = self
            .slots()
            .filter(|(_, slot)| matches!(slot, ActorSlot::Loading { .. }))
            .map(|(id, _)| id)
            .collect();
        for id in &pending {
            self.mark_failed(*id, reason);
        }
        pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::AnimationClip;

    fn actor(slot: usize) -> Actor {
        Actor {
            id: ActorId(slot),
            name: format!("actor_{slot}"),
            entity: EntityId(slot as u64),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            target_orientation: Quat::IDENTITY,
            mixer: AnimationMixer::new(vec![AnimationClip::new("walking", 2.0)]),
            locomotion: LocomotionClips::default(),
            bounds_min: Vec3::new(-0.2, 0.0, -0.2),
            bounds_max: Vec3::new(0.2, 1.8, 0.2),
            scale: 1.0,
        }
    }

    #[test]
    fn slots_settle_once() {
        let mut roster = Roster::loading(["a", "b"]);
        assert!(!roster.is_settled());

        assert!(roster.mark_ready(actor(0)));
        assert!(!roster.mark_ready(actor(0)));
        assert!(roster.mark_failed(ActorId(1), "missing file"));
        assert!(!roster.mark_failed(ActorId(0), "late failure"));
        assert!(!roster.mark_ready(actor(7)));

        assert!(roster.is_settled());
        assert_eq!(roster.ready_count(), 1);
        assert!(roster.get(ActorId(1)).is_none());
        assert_eq!(roster.slot(ActorId(1)).map(ActorSlot::state_label), Some("failed"));
    }

    #[test]
    fn fail_pending_only_touches_loading_slots() {
        let mut roster = Roster::loading(["a", "b", "c"]);
        roster.mark_ready(actor(1));
        assert_eq!(roster.fail_pending("loader stopped"), 2);
        assert_eq!(roster.ready_count(), 1);
        assert!(roster.is_settled());
    }

    #[test]
    fn hit_volume_scales_bounds_around_position() {
        let mut actor = actor(0);
        actor.scale = 5.0;
        actor.position = Vec3::new(2.0, 0.0, 1.0);
        let volume = actor.hit_volume();
        assert!((volume.min - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        assert!((volume.max - Vec3::new(3.0, 9.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn stride_phase_tracks_active_clip_time() {
        let mut actor = actor(0);
        assert_eq!(actor.stride_phase(), None);
        actor.mixer.set_clip("walking", 0.0);
        actor.mixer.update(0.5);
        let phase = actor.stride_phase().expect("phase");
        assert!((phase - 0.25).abs() < 1e-5);
    }
}
