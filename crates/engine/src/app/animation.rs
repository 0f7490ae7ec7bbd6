use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration_seconds: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration_seconds: f32) -> Self {
        Self {
            name: name.into(),
            duration_seconds: if duration_seconds.is_finite() {
                duration_seconds.max(0.0)
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSwitch {
    Switched,
    AlreadyActive,
    UnknownClip,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClipAction {
    time_seconds: f32,
    weight: f32,
    fade_per_second: f32,
    playing: bool,
}

/// Per-actor clip playback state.
///
/// Tracks time and blend weight for every clip the actor owns. Only one clip
/// is active at a time; the previously active clip keeps advancing until its
/// fade-out reaches zero weight.
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<ClipAction>,
    active: Option<usize>,
}

impl AnimationMixer {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        let actions = vec![ClipAction::default(); clips.len()];
        Self {
            clips,
            actions,
            active: None,
        }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn active_clip(&self) -> Option<&str> {
        self.active.map(|index| self.clips[index].name.as_str())
    }

    pub fn clip_time(&self, name: &str) -> Option<f32> {
        self.index_of(name)
            .map(|index| self.actions[index].time_seconds)
    }

    pub fn clip_weight(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|index| self.actions[index].weight)
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.index_of(name)
            .map(|index| self.actions[index].playing)
            .unwrap_or(false)
    }

    /// Cross-fades from the active clip to `name` over `blend_seconds`.
    ///
    /// The new clip restarts from time zero. A zero blend switches weights
    /// immediately.
    pub fn set_clip(&mut self, name: &str, blend_seconds: f32) -> ClipSwitch {
        let Some(next) = self.index_of(name) else {
            warn!(clip = name, "animation_clip_unknown");
            return ClipSwitch::UnknownClip;
        };
        if self.active == Some(next) {
            return ClipSwitch::AlreadyActive;
        }

        if let Some(previous) = self.active {
            self.fade_out(previous, blend_seconds);
        }

        let action = &mut self.actions[next];
        action.time_seconds = 0.0;
        action.playing = true;
        if blend_seconds > 0.0 {
            action.weight = 0.0;
            action.fade_per_second = 1.0 / blend_seconds;
        } else {
            action.weight = 1.0;
            action.fade_per_second = 0.0;
        }
        self.active = Some(next);
        debug!(clip = name, blend_seconds, "animation_clip_switched");
        ClipSwitch::Switched
    }

    /// Fades out the active clip and leaves the mixer with no active clip.
    pub fn stop_active(&mut self, fade_seconds: f32) -> bool {
        let Some(previous) = self.active.take() else {
            return false;
        };
        self.fade_out(previous, fade_seconds);
        true
    }

    pub fn update(&mut self, dt_seconds: f32) {
        if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return;
        }
        for (clip, action) in self.clips.iter().zip(self.actions.iter_mut()) {
            if !action.playing {
                continue;
            }
            action.time_seconds = wrap_clip_time(action.time_seconds + dt_seconds, clip.duration_seconds);

            if action.fade_per_second != 0.0 {
                action.weight = (action.weight + action.fade_per_second * dt_seconds).clamp(0.0, 1.0);
                if action.fade_per_second > 0.0 && action.weight >= 1.0 {
                    action.fade_per_second = 0.0;
                } else if action.fade_per_second < 0.0 && action.weight <= 0.0 {
                    action.fade_per_second = 0.0;
                    action.playing = false;
                }
            }
        }
    }

    fn fade_out(&mut self, index: usize, fade_seconds: f32) {
        let action = &mut self.actions[index];
        if fade_seconds > 0.0 && action.weight > 0.0 {
            action.fade_per_second = -1.0 / fade_seconds;
        } else {
            action.weight = 0.0;
            action.fade_per_second = 0.0;
            action.playing = false;
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|clip| clip.name == name)
    }
}

fn wrap_clip_time(time_seconds: f32, duration_seconds: f32) -> f32 {
    if duration_seconds <= 0.0 {
        return 0.0;
    }
    time_seconds % duration_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4
    }

    fn mixer() -> AnimationMixer {
        AnimationMixer::new(vec![
            AnimationClip::new("standing", 2.0),
            AnimationClip::new("walking", 1.0),
            AnimationClip::new("running", 0.5),
        ])
    }

    #[test]
    fn unknown_clip_is_ignored() {
        let mut mixer = mixer();
        assert_eq!(mixer.set_clip("standing", 0.0), ClipSwitch::Switched);
        assert_eq!(mixer.set_clip("dancing", 0.5), ClipSwitch::UnknownClip);
        assert_eq!(mixer.active_clip(), Some("standing"));
    }

    #[test]
    fn reselecting_active_clip_does_not_restart_it() {
        let mut mixer = mixer();
        mixer.set_clip("walking", 0.0);
        mixer.update(0.3);
        assert_eq!(mixer.set_clip("walking", 0.5), ClipSwitch::AlreadyActive);
        assert!(approx_eq(mixer.clip_time("walking").expect("clip"), 0.3));
    }

    #[test]
    fn crossfade_moves_weight_from_previous_to_next() {
        let mut mixer = mixer();
        mixer.set_clip("standing", 0.0);
        mixer.set_clip("walking", 0.5);

        mixer.update(0.25);
        assert!(approx_eq(mixer.clip_weight("standing").expect("clip"), 0.5));
        assert!(approx_eq(mixer.clip_weight("walking").expect("clip"), 0.5));

        mixer.update(0.5);
        assert!(approx_eq(mixer.clip_weight("standing").expect("clip"), 0.0));
        assert!(approx_eq(mixer.clip_weight("walking").expect("clip"), 1.0));
        assert!(!mixer.is_playing("standing"));
        assert!(mixer.is_playing("walking"));
    }

    #[test]
    fn clip_time_wraps_at_duration() {
        let mut mixer = mixer();
        mixer.set_clip("running", 0.0);
        mixer.update(0.3);
        mixer.update(0.3);
        assert!(approx_eq(mixer.clip_time("running").expect("clip"), 0.1));
    }

    #[test]
    fn stop_active_fades_out_and_clears() {
        let mut mixer = mixer();
        mixer.set_clip("walking", 0.0);
        assert!(mixer.stop_active(0.5));
        assert_eq!(mixer.active_clip(), None);
        assert!(mixer.is_playing("walking"));
        mixer.update(0.6);
        assert!(!mixer.is_playing("walking"));
        assert!(!mixer.stop_active(0.5));
    }

    #[test]
    fn switching_restarts_new_clip_from_zero() {
        let mut mixer = mixer();
        mixer.set_clip("walking", 0.0);
        mixer.update(0.4);
        mixer.set_clip("standing", 0.0);
        mixer.set_clip("walking", 0.0);
        assert!(approx_eq(mixer.clip_time("walking").expect("clip"), 0.0));
    }
}
