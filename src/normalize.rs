//! Raw sample normalization.
//!
//! Every backend funnels its native samples through this module so that all devices
//! report the same shapes:
//!
//! - **Linear axes** map a logical `[min, max]` range onto `[-1, 1]` with
//!   `2 * (v - min) / (max - min) - 1`. Ranges are either declared by the device or
//!   discovered on the fly ([`AxisRange::observe`]); a discovered range only ever grows,
//!   and samples seen before the true extremes arrive are not corrected afterwards.
//! - **Hats** always occupy two consecutive axis slots (X then Y) whose values are
//!   `-1`, `0` or `1`. See [`hat_to_xy`] for the octant mapping.
//! - **Half-range controls** (triggers reporting `0..=2h`) map through `v / h - 1`.
//!
//! [`AxisLayout`] ties these together per device: it owns the backend-private descriptors
//! and the last value of every slot, and turns one raw sample into the axis changes to queue.

/// Normalize `value` from `[min, max]` to `[-1, 1]`.
///
/// Degenerate ranges (`max <= min`) report `0.0`. Samples outside the range are clamped.
pub fn linear(value: i64, min: i64, max: i64) -> f32 {
    if max <= min {
        return 0.0;
    }
    let span = (max - min) as f64;
    let n = 2.0 * (value - min) as f64 / span - 1.0;
    n.clamp(-1.0, 1.0) as f32
}

/// Normalize a half-range control (`0..=2*half`) to `[-1, 1]`.
pub fn half_range(value: f64, half: f64) -> f32 {
    if half <= 0.0 {
        return 0.0;
    }
    (value / half - 1.0).clamp(-1.0, 1.0) as f32
}

/// Convert a hat position into an `(x, y)` pair in `{-1, 0, 1}²`.
///
/// `position` counts clockwise from up in `positions` equal steps (8 for a classic hat,
/// 360 for degrees, 36000 for centidegrees). Anything outside `[0, positions)` is the
/// centered position and maps to `(0, 0)`. Up is `y = -1`, right is `x = 1`.
pub fn hat_to_xy(position: i64, positions: i64) -> (f32, f32) {
    if positions <= 0 || position < 0 || position >= positions {
        return (0.0, 0.0);
    }
    let half = positions / 2;
    let quarter = positions / 4;
    let three_quarters = quarter * 3;

    let x = if position > 0 && position < half {
        1.0
    } else if position > half {
        -1.0
    } else {
        0.0
    };
    let y = if position > three_quarters || position < quarter {
        -1.0
    } else if position > quarter && position < three_quarters {
        1.0
    } else {
        0.0
    };
    (x, y)
}

/// Centidegree POV sentinel for "centered" (low word all bits set).
pub const POV_CENTERED: u32 = 0xFFFF;

/// Convert a centidegree POV reading (`0..36000`, or [`POV_CENTERED`]) into `(x, y)`.
pub fn pov_to_xy(pov: u32) -> (f32, f32) {
    if pov & 0xFFFF == POV_CENTERED {
        return (0.0, 0.0);
    }
    hat_to_xy(i64::from(pov), 36_000)
}

/// Logical range of a linear axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i64,
    pub max: i64,
    /// Grow the range when samples fall outside it.
    pub calibrating: bool,
}

impl AxisRange {
    /// A fixed range declared by the device.
    pub fn declared(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            calibrating: false,
        }
    }

    /// A starting range that widens as out-of-range samples arrive.
    pub fn calibrating(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            calibrating: true,
        }
    }

    /// Record `value` and return its normalized form.
    pub fn observe(&mut self, value: i64) -> f32 {
        if self.calibrating {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        linear(value, self.min, self.max)
    }
}

/// How a descriptor's slot is fed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AxisKind {
    Linear(AxisRange),
    /// First slot of a hat pair; `min`/`max` are the logical position range.
    Hat { min: i64, max: i64 },
    /// Second slot of a hat pair. Never fed directly.
    HatSecondHalf,
}

/// Backend-private mapping from one axis slot to the native control behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AxisDescriptor {
    /// Native control identity (element cookie, ABS code, value-cap index, ...).
    pub cookie: u32,
    pub kind: AxisKind,
}

/// Descriptors plus the last value reported on each slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct AxisLayout {
    descriptors: Vec<AxisDescriptor>,
    values: Vec<f32>,
}

impl AxisLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_linear(&mut self, cookie: u32, range: AxisRange) {
        self.descriptors.push(AxisDescriptor {
            cookie,
            kind: AxisKind::Linear(range),
        });
        self.values.push(0.0);
    }

    /// Append a hat, which always takes two slots.
    pub fn push_hat(&mut self, cookie: u32, min: i64, max: i64) {
        self.descriptors.push(AxisDescriptor {
            cookie,
            kind: AxisKind::Hat { min, max },
        });
        self.descriptors.push(AxisDescriptor {
            cookie,
            kind: AxisKind::HatSecondHalf,
        });
        self.values.extend([0.0, 0.0]);
    }

    /// Number of axis slots (hats count twice).
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[cfg_attr(all(windows, not(feature = "hid")), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Slot of the control identified by `cookie`. Hats resolve to their first slot.
    #[cfg_attr(all(windows, not(feature = "hid")), allow(dead_code))]
    pub fn find(&self, cookie: u32) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|d| d.cookie == cookie && d.kind != AxisKind::HatSecondHalf)
    }

    /// Feed one raw sample into `slot`.
    ///
    /// Returns the `(axis, value, last_value)` changes to report, in slot order. Samples that
    /// do not change a slot's value produce nothing.
    pub fn feed(&mut self, slot: usize, raw: i64) -> Vec<(u32, f32, f32)> {
        let mut changes = Vec::new();
        let Some(descriptor) = self.descriptors.get_mut(slot) else {
            return changes;
        };
        match &mut descriptor.kind {
            AxisKind::Linear(range) => {
                let value = range.observe(raw);
                self.set(slot, value, &mut changes);
            }
            AxisKind::Hat { min, max } => {
                let (x, y) = hat_to_xy(raw - *min, *max - *min + 1);
                self.set(slot, x, &mut changes);
                self.set(slot + 1, y, &mut changes);
            }
            AxisKind::HatSecondHalf => {}
        }
        changes
    }

    /// Set a slot to an already-normalized value.
    pub fn set_normalized(&mut self, slot: usize, value: f32) -> Option<(u32, f32, f32)> {
        let mut changes = Vec::new();
        self.set(slot, value.clamp(-1.0, 1.0), &mut changes);
        changes.pop()
    }

    fn set(&mut self, slot: usize, value: f32, changes: &mut Vec<(u32, f32, f32)>) {
        if let Some(last) = self.values.get_mut(slot) {
            if *last != value {
                changes.push((slot as u32, value, *last));
                *last = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn linear_extremes_are_exact() {
        assert_eq!(linear(0, 0, 255), -1.0);
        assert_eq!(linear(255, 0, 255), 1.0);
        assert_eq!(linear(-32768, -32768, 32767), -1.0);
        assert_eq!(linear(32767, -32768, 32767), 1.0);
        assert!((linear(128, 0, 256)).abs() < 1e-6);
        assert!((linear(0, -32768, 32767)).abs() < 1e-4);
    }

    #[test]
    fn degenerate_range_is_zero() {
        assert_eq!(linear(5, 7, 7), 0.0);
        assert_eq!(linear(5, 9, 1), 0.0);
    }

    #[test]
    fn half_range_trigger() {
        assert_eq!(half_range(0.0, 127.5), -1.0);
        assert_eq!(half_range(255.0, 127.5), 1.0);
        assert!(half_range(127.5, 127.5).abs() < 1e-6);
    }

    #[test]
    fn eight_way_hat() {
        let expected = [
            (0.0, -1.0),  // up
            (1.0, -1.0),  // up-right
            (1.0, 0.0),   // right
            (1.0, 1.0),   // down-right
            (0.0, 1.0),   // down
            (-1.0, 1.0),  // down-left
            (-1.0, 0.0),  // left
            (-1.0, -1.0), // up-left
        ];
        for (pos, want) in expected.iter().enumerate() {
            assert_eq!(hat_to_xy(pos as i64, 8), *want, "position {pos}");
        }
        assert_eq!(hat_to_xy(8, 8), (0.0, 0.0));
        assert_eq!(hat_to_xy(-1, 8), (0.0, 0.0));
    }

    #[test]
    fn pov_directions() {
        assert_eq!(pov_to_xy(0), (0.0, -1.0));
        assert_eq!(pov_to_xy(9000), (1.0, 0.0));
        assert_eq!(pov_to_xy(18000), (0.0, 1.0));
        assert_eq!(pov_to_xy(27000), (-1.0, 0.0));
        assert_eq!(pov_to_xy(4500), (1.0, -1.0));
        assert_eq!(pov_to_xy(0xFFFF_FFFF), (0.0, 0.0));
        assert_eq!(pov_to_xy(POV_CENTERED), (0.0, 0.0));
    }

    #[test]
    fn calibrating_range_grows_without_correcting_history() {
        let mut r = AxisRange::calibrating(0, 100);
        assert_eq!(r.observe(100), 1.0);
        // A wider extreme shows up later; the earlier sample is not revisited.
        assert_eq!(r.observe(200), 1.0);
        assert_eq!((r.min, r.max), (0, 200));
        assert_eq!(r.observe(100), 0.0);
        assert_eq!(r.observe(-200), -1.0);
    }

    #[test]
    fn declared_range_clamps() {
        let mut r = AxisRange::declared(0, 100);
        assert_eq!(r.observe(150), 1.0);
        assert_eq!((r.min, r.max), (0, 100));
    }

    #[test]
    fn layout_hat_expands_to_two_slots() {
        let mut layout = AxisLayout::new();
        layout.push_linear(0x30, AxisRange::declared(0, 255));
        layout.push_hat(0x39, 1, 8);
        layout.push_linear(0x31, AxisRange::declared(0, 255));

        assert_eq!(layout.len(), 4);
        assert_eq!(layout.find(0x39), Some(1));
        assert_eq!(layout.find(0x31), Some(3));

        // 1..8 hat: position 3 (raw 3 - min 1 = 2) is right.
        let changes = layout.feed(1, 3);
        assert_eq!(changes, vec![(1, 1.0, 0.0)]);
        // raw 0 is below min: centered.
        let changes = layout.feed(1, 0);
        assert_eq!(changes, vec![(1, 0.0, 1.0)]);
        // Feeding the synthetic half does nothing.
        assert!(layout.feed(2, 5).is_empty());
    }

    #[test]
    fn layout_reports_only_changes() {
        let mut layout = AxisLayout::new();
        layout.push_linear(0, AxisRange::declared(-10, 10));
        assert_eq!(layout.feed(0, 10), vec![(0, 1.0, 0.0)]);
        assert!(layout.feed(0, 10).is_empty());
        assert_eq!(layout.feed(0, -10), vec![(0, -1.0, 1.0)]);
        assert!(layout.feed(7, 0).is_empty());
    }

    proptest! {
        #[test]
        fn linear_stays_in_unit_range(v in any::<i32>(), a in any::<i32>(), b in any::<i32>()) {
            let n = linear(v.into(), a.min(b).into(), a.max(b).into());
            prop_assert!((-1.0..=1.0).contains(&n));
        }

        #[test]
        fn calibrated_samples_stay_in_unit_range(samples in proptest::collection::vec(any::<i16>(), 1..64)) {
            let mut r = AxisRange::calibrating(0, 1);
            for s in samples {
                let n = r.observe(s.into());
                prop_assert!((-1.0..=1.0).contains(&n));
            }
        }

        #[test]
        fn hat_outputs_are_unit_steps(pos in -2i64..400, positions in prop::sample::select(vec![4i64, 8, 360, 36000])) {
            let (x, y) = hat_to_xy(pos, positions);
            prop_assert!([-1.0f32, 0.0, 1.0].contains(&x));
            prop_assert!([-1.0f32, 0.0, 1.0].contains(&y));
        }
    }
}
