use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vec3Tween<K> {
    id: TweenId,
    key: K,
    from: Vec3,
    to: Vec3,
    start_seconds: f64,
    duration_seconds: f32,
}

impl<K> Vec3Tween<K> {
    fn progress(&self, now_seconds: f64) -> f32 {
        if self.duration_seconds <= 0.0 {
            return 1.0;
        }
        let elapsed = (now_seconds - self.start_seconds) as f32;
        (elapsed / self.duration_seconds).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenCompletion<K> {
    pub id: TweenId,
    pub key: K,
    pub value: Vec3,
}

/// Time-based `Vec3` interpolations keyed by their owner.
///
/// The set keeps its own clock, advanced only through [`TweenSet::advance`],
/// so a tween started between two advances begins at the current clock.
/// Cancelled tweens are dropped immediately and never produce a completion.
#[derive(Debug, Clone)]
pub struct TweenSet<K> {
    now_seconds: f64,
    next_id: u64,
    active: Vec<Vec3Tween<K>>,
}

impl<K> Default for TweenSet<K> {
    fn default() -> Self {
        Self {
            now_seconds: 0.0,
            next_id: 0,
            active: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq> TweenSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_seconds(&self) -> f64 {
        self.now_seconds
    }

    pub fn start(
        &mut self,
        key: K,
        from: Vec3,
        to: Vec3,
        duration_seconds: f32,
    ) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let duration_seconds = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        self.active.push(Vec3Tween {
            id,
            key,
            from,
            to,
            start_seconds: self.now_seconds,
            duration_seconds,
        });
        id
    }

    /// Cancels every tween owned by `key`, then starts the new one.
    pub fn replace(
        &mut self,
        key: K,
        from: Vec3,
        to: Vec3,
        duration_seconds: f32,
    ) -> TweenId {
        self.cancel_key(key);
        self.start(key, from, to, duration_seconds)
    }

    pub fn cancel_key(&mut self, key: K) -> usize {
        let before = self.active.len();
        self.active.retain(|tween| tween.key != key);
        before - self.active.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.active.len();
        self.active.clear();
        cancelled
    }

    pub fn is_active(&self, id: TweenId) -> bool {
        self.active.iter().any(|tween| tween.id == id)
    }

    pub fn active_for_key(&self, key: K) -> Option<TweenId> {
        self.active
            .iter()
            .find(|tween| tween.key == key)
            .map(|tween| tween.id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Advances the clock, writes every interpolated value through `apply`,
    /// and appends finished tweens to `completions` in start order.
    pub fn advance<F>(
        &mut self,
        dt_seconds: f32,
        mut apply: F,
        completions: &mut Vec<TweenCompletion<K>>,
    ) where
        F: FnMut(K, Vec3),
    {
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            self.now_seconds += dt_seconds as f64;
        }
        let now_seconds = self.now_seconds;

        self.active.retain(|tween| {
            let t = tween.progress(now_seconds);
            let value = if t >= 1.0 {
                tween.to
            } else {
                tween.from.lerp(tween.to, t)
            };
            apply(tween.key, value);
            if t >= 1.0 {
                completions.push(TweenCompletion {
                    id: tween.id,
                    key: tween.key,
                    value,
                });
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() <= 1e-4
    }

    #[test]
    fn linear_tween_reaches_target_and_completes_once() {
        let mut tweens = TweenSet::<u32>::new();
        let id = tweens.start(7, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 2.0);
        let mut latest = Vec3::ZERO;
        let mut completions = Vec::new();

        tweens.advance(1.0, |_, value| latest = value, &mut completions);
        assert!(approx_eq_vec3(latest, Vec3::new(2.0, 0.0, 0.0)));
        assert!(completions.is_empty());
        assert!(tweens.is_active(id));

        tweens.advance(1.5, |_, value| latest = value, &mut completions);
        assert!(approx_eq_vec3(latest, Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].id, id);
        assert_eq!(completions[0].key, 7);
        assert!(!tweens.is_active(id));

        completions.clear();
        tweens.advance(1.0, |_, _| panic!("finished tween re-applied"), &mut completions);
        assert!(completions.is_empty());
    }

    #[test]
    fn zero_duration_tween_completes_on_next_advance() {
        let mut tweens = TweenSet::<u32>::new();
        tweens.start(1, Vec3::ZERO, Vec3::ONE, 0.0);
        let mut completions = Vec::new();
        tweens.advance(0.0, |_, _| {}, &mut completions);
        assert_eq!(completions.len(), 1);
        assert!(approx_eq_vec3(completions[0].value, Vec3::ONE));
    }

    #[test]
    fn cancelled_tween_never_reports_completion() {
        let mut tweens = TweenSet::<u32>::new();
        let first = tweens.start(1, Vec3::ZERO, Vec3::X, 0.5);
        let second = tweens.replace(1, Vec3::ZERO, Vec3::Z, 1.0);
        assert!(!tweens.is_active(first));
        assert_eq!(tweens.active_for_key(1), Some(second));

        let mut completions = Vec::new();
        tweens.advance(2.0, |_, _| {}, &mut completions);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].id, second);
    }

    #[test]
    fn cancel_key_leaves_other_owners_running() {
        let mut tweens = TweenSet::<u32>::new();
        tweens.start(1, Vec3::ZERO, Vec3::X, 1.0);
        let other = tweens.start(2, Vec3::ZERO, Vec3::Y, 1.0);

        assert_eq!(tweens.cancel_key(1), 1);
        assert_eq!(tweens.active_count(), 1);
        assert!(tweens.is_active(other));
        assert_eq!(tweens.cancel_all(), 1);
        assert_eq!(tweens.active_count(), 0);
    }

    #[test]
    fn tween_started_mid_clock_measures_from_its_start() {
        let mut tweens = TweenSet::<u32>::new();
        let mut completions = Vec::new();
        tweens.advance(10.0, |_, _| {}, &mut completions);

        tweens.start(3, Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), 1.0);
        let mut latest = Vec3::ZERO;
        tweens.advance(0.25, |_, value| latest = value, &mut completions);
        assert!(approx_eq_vec3(latest, Vec3::new(0.0, 0.0, 2.5)));
    }
}
