//! Runtime render controls
//!
//! [`RenderSettings`] is threaded through every frame. Keyboard input never
//! touches it directly: [`SettingsInput`] turns key state into a
//! [`SettingsDelta`] once per frame and the frame loop applies it.

use serde::{Deserialize, Serialize};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub const BRIGHTNESS_RANGE: (f32, f32) = (0.5, 3.0);
pub const NORMAL_STRENGTH_RANGE: (f32, f32) = (0.1, 1.5);
pub const AO_STRENGTH_RANGE: (f32, f32) = (0.1, 1.2);

const BRIGHTNESS_STEP: f32 = 0.1;
const STRENGTH_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub soft_shadows: bool,
    pub brightness: f32,
    pub normal_strength: f32,
    pub ao_strength: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            soft_shadows: true,
            brightness: 1.0,
            normal_strength: 0.8,
            ao_strength: 0.7,
        }
    }
}

/// Requested change to [`RenderSettings`] for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsDelta {
    pub toggle_soft_shadows: bool,
    pub brightness: f32,
    pub normal_strength: f32,
    pub ao_strength: f32,
}

impl SettingsDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl RenderSettings {
    /// Returns a copy with every value inside its range
    pub fn clamped(self) -> Self {
        Self {
            soft_shadows: self.soft_shadows,
            brightness: clamp_range(self.brightness, BRIGHTNESS_RANGE),
            normal_strength: clamp_range(self.normal_strength, NORMAL_STRENGTH_RANGE),
            ao_strength: clamp_range(self.ao_strength, AO_STRENGTH_RANGE),
        }
    }

    /// Applies `delta`, clamping each value to its range
    pub fn apply(&mut self, delta: SettingsDelta) {
        if delta.is_empty() {
            return;
        }
        let before = *self;

        if delta.toggle_soft_shadows {
            self.soft_shadows = !self.soft_shadows;
        }
        self.brightness = clamp_range(self.brightness + delta.brightness, BRIGHTNESS_RANGE);
        self.normal_strength = clamp_range(self.normal_strength + delta.normal_strength, NORMAL_STRENGTH_RANGE);
        self.ao_strength = clamp_range(self.ao_strength + delta.ao_strength, AO_STRENGTH_RANGE);

        if self.soft_shadows != before.soft_shadows {
            log::info!("Soft shadows: {}", if self.soft_shadows { "ON" } else { "OFF" });
        }
        if self.brightness != before.brightness {
            log::info!("Brightness: {:.2}", self.brightness);
        }
        if self.normal_strength != before.normal_strength {
            log::info!("Normal strength: {:.2}", self.normal_strength);
        }
        if self.ao_strength != before.ao_strength {
            log::info!("AO strength: {:.2}", self.ao_strength);
        }
    }
}

fn clamp_range(value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

/// Keyboard state behind the render controls
///
/// F1 toggles soft shadows once per press. Up/Down (brightness), F2/F3
/// (normal strength) and F4/F5 (AO strength) step every frame they are held.
#[derive(Debug, Default)]
pub struct SettingsInput {
    toggle_queued: bool,
    toggle_held: bool,
    brightness_up: bool,
    brightness_down: bool,
    normal_down: bool,
    normal_up: bool,
    ao_down: bool,
    ao_up: bool,
}

impl SettingsInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key transition; returns true when the key is a render control
    pub fn process_keyboard_event(&mut self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        self.set_key(code, event.state == ElementState::Pressed)
    }

    pub fn set_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        match code {
            KeyCode::F1 => {
                if pressed && !self.toggle_held {
                    self.toggle_queued = true;
                }
                self.toggle_held = pressed;
            }
            KeyCode::ArrowUp => self.brightness_up = pressed,
            KeyCode::ArrowDown => self.brightness_down = pressed,
            KeyCode::F2 => self.normal_down = pressed,
            KeyCode::F3 => self.normal_up = pressed,
            KeyCode::F4 => self.ao_down = pressed,
            KeyCode::F5 => self.ao_up = pressed,
            _ => return false,
        }
        true
    }

    /// The change requested for this frame; consumes a queued F1 toggle
    pub fn frame_delta(&mut self) -> SettingsDelta {
        let axis = |up: bool, down: bool, step: f32| match (up, down) {
            (true, false) => step,
            (false, true) => -step,
            _ => 0.0,
        };

        SettingsDelta {
            toggle_soft_shadows: std::mem::take(&mut self.toggle_queued),
            brightness: axis(self.brightness_up, self.brightness_down, BRIGHTNESS_STEP),
            normal_strength: axis(self.normal_up, self.normal_down, STRENGTH_STEP),
            ao_strength: axis(self.ao_up, self.ao_down, STRENGTH_STEP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_converges_to_bounds() {
        let mut settings = RenderSettings::default();
        let mut input = SettingsInput::new();

        input.set_key(KeyCode::ArrowUp, true);
        for _ in 0..200 {
            settings.apply(input.frame_delta());
            assert!(settings.brightness <= 3.0);
        }
        assert_eq!(settings.brightness, 3.0);

        input.set_key(KeyCode::ArrowUp, false);
        input.set_key(KeyCode::ArrowDown, true);
        for _ in 0..200 {
            settings.apply(input.frame_delta());
            assert!(settings.brightness >= 0.5);
        }
        assert_eq!(settings.brightness, 0.5);
    }

    #[test]
    fn test_strengths_clamp() {
        let mut settings = RenderSettings::default();
        for _ in 0..100 {
            settings.apply(SettingsDelta {
                normal_strength: 0.05,
                ao_strength: -0.05,
                ..Default::default()
            });
        }
        assert_eq!(settings.normal_strength, 1.5);
        assert_eq!(settings.ao_strength, 0.1);
    }

    #[test]
    fn test_toggle_is_edge_triggered() {
        let mut settings = RenderSettings::default();
        let mut input = SettingsInput::new();

        input.set_key(KeyCode::F1, true);
        // key repeat while held
        input.set_key(KeyCode::F1, true);
        for _ in 0..10 {
            settings.apply(input.frame_delta());
        }
        assert!(!settings.soft_shadows);

        input.set_key(KeyCode::F1, false);
        input.set_key(KeyCode::F1, true);
        settings.apply(input.frame_delta());
        assert!(settings.soft_shadows);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut input = SettingsInput::new();
        input.set_key(KeyCode::ArrowUp, true);
        input.set_key(KeyCode::ArrowDown, true);
        assert!(input.frame_delta().is_empty());
    }

    #[test]
    fn test_clamped_repairs_out_of_range_values() {
        let settings = RenderSettings {
            soft_shadows: false,
            brightness: 10.0,
            normal_strength: f32::NAN,
            ao_strength: -1.0,
        }
        .clamped();
        assert_eq!(settings.brightness, 3.0);
        assert_eq!(settings.normal_strength, 0.1);
        assert_eq!(settings.ao_strength, 0.1);
    }

    #[test]
    fn test_unrelated_key_is_ignored() {
        let mut input = SettingsInput::new();
        assert!(!input.set_key(KeyCode::KeyW, true));
        assert!(input.set_key(KeyCode::F4, true));
    }
}
