use crate::domain::models::HandState;
use crate::domain::settings::SettingsService;
use std::sync::{Arc, Mutex};

/// Finger flexion normalized against the glove's ADC full-scale.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedHand {
    pub thumb: f32,
    pub index: f32,
    pub middle: f32,
    pub ring: f32,
    pub pinky: f32,
}

pub struct HandProcessor {
    settings: Arc<Mutex<SettingsService>>,
}

impl HandProcessor {
    pub fn new(settings: Arc<Mutex<SettingsService>>) -> Self {
        Self { settings }
    }

    /// Map raw readings to `[0, 1]` for bars and effects. Raw values can sit
    /// outside the nominal range on miscalibrated hardware, so clamping
    /// happens here rather than in the parser.
    pub fn normalize(&self, state: &HandState) -> NormalizedHand {
        let full_scale = {
            let settings = self.settings.lock().unwrap();
            settings.get().max_sensor_value.max(1)
        };

        NormalizedHand {
            thumb: normalize_raw(state.thumb, full_scale),
            index: normalize_raw(state.index, full_scale),
            middle: normalize_raw(state.middle, full_scale),
            ring: normalize_raw(state.ring, full_scale),
            pinky: normalize_raw(state.pinky, full_scale),
        }
    }
}

fn normalize_raw(raw: i32, full_scale: u16) -> f32 {
    (raw as f32 / full_scale as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Settings;
    use std::path::PathBuf;

    fn processor(max_sensor_value: u16) -> HandProcessor {
        let settings = Settings {
            max_sensor_value,
            ..Settings::default()
        };
        HandProcessor::new(Arc::new(Mutex::new(SettingsService::with_settings(
            settings,
            PathBuf::from("unused"),
        ))))
    }

    #[test]
    fn normalizes_against_full_scale() {
        let hand = processor(4095);
        let state = HandState {
            thumb: 0,
            index: 4095,
            middle: 2048,
            ..HandState::default()
        };
        let norm = hand.normalize(&state);
        assert_eq!(norm.thumb, 0.0);
        assert_eq!(norm.index, 1.0);
        assert!((norm.middle - 0.5).abs() < 0.001);
    }

    #[test]
    fn out_of_range_readings_clamp() {
        let hand = processor(4095);
        let state = HandState {
            thumb: 5000,
            index: -100,
            ..HandState::default()
        };
        let norm = hand.normalize(&state);
        assert_eq!(norm.thumb, 1.0);
        assert_eq!(norm.index, 0.0);
    }
}
