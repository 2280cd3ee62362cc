//! Property tests for the wraparound arithmetic and the history queries built
//! on it.

use hvac_common::{
    clock::{minutes, Millis},
    diff,
    events::LOCKOUT_MS,
    fan::FanController,
    sensing::MovingAverage,
    signed_diff, CycleState, EventHistory, FanMode, HvacMode, Mode, PersistedSettings,
};
use proptest::prelude::*;

const HALF_RANGE: u32 = 1 << 31;

proptest! {
    #[test]
    fn diff_is_exact_across_wrap(start in any::<u32>(), elapsed in 0..HALF_RANGE) {
        let prev = Millis::new(start);
        let next = prev.add(elapsed);

        prop_assert_eq!(diff(prev, next), elapsed);
    }

    #[test]
    fn signed_diff_is_antisymmetric(start in any::<u32>(), elapsed in 0..HALF_RANGE) {
        let a = Millis::new(start);
        let b = a.add(elapsed);

        prop_assert_eq!(signed_diff(a, b), elapsed as i32);
        prop_assert_eq!(signed_diff(b, a), -(elapsed as i32));
    }

    #[test]
    fn lockout_only_within_five_minutes_of_opposite_mode(
        start in any::<u32>(),
        run_mins in 1u32..=90,
        gap_ms in 0u32..minutes(20),
        heat_first in any::<bool>(),
    ) {
        let (ran, wants, blocked) = if heat_first {
            (HvacMode::Heat, Mode::Cool, Mode::Heat)
        } else {
            (HvacMode::Cool, Mode::Heat, Mode::Cool)
        };
        let mut history = EventHistory::<10>::new();
        let began = Millis::new(start);
        let stopped = began.add(minutes(run_mins));
        history.record(ran, FanMode::On, began, 700);
        history.record(HvacMode::Idle, FanMode::Off, stopped, 700);
        let now = stopped.add(gap_ms);

        prop_assert_eq!(history.is_locked_out(wants, now), gap_ms < LOCKOUT_MS);
        prop_assert!(!history.is_locked_out(blocked, now));
    }

    #[test]
    fn moving_average_stays_within_samples(samples in proptest::collection::vec(-400i32..=999, 1..40)) {
        let mut average = MovingAverage::<8>::default();
        let mut mean = 0;
        for sample in &samples {
            mean = average.push(*sample);
        }

        let window = &samples[samples.len().saturating_sub(8)..];
        let low = window.iter().copied().min().unwrap_or(0);
        let high = window.iter().copied().max().unwrap_or(0);
        prop_assert!(low <= mean && mean <= high);
    }

    #[test]
    fn fan_bucket_stays_within_period(
        steps in proptest::collection::vec(0u32..minutes(90), 1..30),
        duty in 1u8..=99,
        period in 1u16..=240,
    ) {
        let settings = PersistedSettings {
            fan_on_duty: duty,
            fan_on_min_period: period,
            ..PersistedSettings::default()
        };
        let mut state = CycleState::new(settings, Millis::new(0));
        let mut fan = FanController::new();
        let period_ms = i64::from(minutes(u32::from(period)));

        for step in steps {
            state.now = state.now.add(step);
            fan.run(&mut state);
            prop_assert!((0..=period_ms).contains(&fan.bucket_ms()));
        }
    }
}
