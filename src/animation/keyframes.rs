#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe<V> {
    /// Position on the timeline in `[0, 1]`.
    pub offset: f32,
    pub value: V,
}

impl<V> Keyframe<V> {
    pub fn new(offset: f32, value: V) -> Self {
        Self {
            offset: offset.clamp(0.0, 1.0),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Waiting,
    Running,
    Paused,
    Finished,
}

/// Keyframed animation of a single layer property.
///
/// The draw-properties walk never samples animations; it only asks whether
/// one is active and what range of values it can produce.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeAnimation<V> {
    keyframes: Vec<Keyframe<V>>,
    pub duration_ms: u32,
    pub run_state: RunState,
}

impl<V> KeyframeAnimation<V> {
    pub fn new(mut keyframes: Vec<Keyframe<V>>) -> Self {
        keyframes.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self {
            keyframes,
            duration_ms: 0,
            run_state: RunState::default(),
        }
    }

    pub fn from_to(from: V, to: V, duration_ms: u32) -> Self {
        Self::new(vec![Keyframe::new(0.0, from), Keyframe::new(1.0, to)]).with_duration(duration_ms)
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_run_state(mut self, run_state: RunState) -> Self {
        self.run_state = run_state;
        self
    }

    pub fn keyframes(&self) -> &[Keyframe<V>] {
        &self.keyframes
    }

    /// Waiting, running and paused animations may still change the value
    /// on a later frame.
    pub fn is_active(&self) -> bool {
        self.run_state != RunState::Finished && !self.keyframes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{TransformAnimation, TransformOperation, TransformOperations};
    use crate::math::Point3F;

    fn scale(factor: f32) -> TransformOperations {
        TransformOperations::new().with(TransformOperation::Scale {
            x: factor,
            y: factor,
            z: 1.0,
        })
    }

    #[test]
    fn keyframes_are_sorted_by_offset() {
        let animation = KeyframeAnimation::new(vec![
            Keyframe::new(1.0, 10.0_f32),
            Keyframe::new(0.0, 0.0),
            Keyframe::new(2.0, 2.0),
        ]);
        let offsets: Vec<f32> = animation.keyframes().iter().map(|keyframe| keyframe.offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 1.0]);
        assert_eq!(animation.keyframes()[0].value, 0.0);
    }

    #[test]
    fn finished_or_empty_animations_are_inactive() {
        let animation = KeyframeAnimation::from_to(0.0_f32, 1.0, 10);
        assert!(animation.is_active());
        assert!(!animation.clone().with_run_state(RunState::Finished).is_active());
        assert!(!KeyframeAnimation::<f32>::new(Vec::new()).is_active());
    }

    #[test]
    fn transform_animation_scale_range() {
        let animation: TransformAnimation = KeyframeAnimation::from_to(scale(1.0), scale(4.0), 100);
        assert!(animation.affects_scale());
        assert_eq!(animation.maximum_scale(), Some(4.0));

        let rotating: TransformAnimation = KeyframeAnimation::from_to(
            scale(1.0),
            TransformOperations::new().with(TransformOperation::Rotate {
                axis: Point3F::new(0.0, 0.0, 1.0),
                degrees: 90.0,
            }),
            100,
        );
        assert_eq!(rotating.maximum_scale(), None);

        let sliding: TransformAnimation = KeyframeAnimation::from_to(
            TransformOperations::new(),
            TransformOperations::new().with(TransformOperation::Translate {
                x: 50.0,
                y: 0.0,
                z: 0.0,
            }),
            100,
        );
        assert!(!sliding.affects_scale());
    }
}
