use winit::keyboard::KeyCode;

use crate::camera_rig::CameraSelection;

/// What a key press asks the application to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectCamera(CameraSelection),
    Exit,
}

/// Map a physical key to a command. Digits 1-5 follow the selection order.
pub fn command_for_key(key: KeyCode) -> Option<Command> {
    let selection = match key {
        KeyCode::Digit1 | KeyCode::Numpad1 => CameraSelection::Front,
        KeyCode::Digit2 | KeyCode::Numpad2 => CameraSelection::Above,
        KeyCode::Digit3 | KeyCode::Numpad3 => CameraSelection::Mercury,
        KeyCode::Digit4 | KeyCode::Numpad4 => CameraSelection::Venus,
        KeyCode::Digit5 | KeyCode::Numpad5 => CameraSelection::Earth,
        KeyCode::Escape => return Some(Command::Exit),
        _ => return None,
    };
    Some(Command::SelectCamera(selection))
}

/// Window title showing the active camera and frame rate
pub fn window_title(base: &str, selection: CameraSelection, fps: f32) -> String {
    format!("{} | Camera: {} [1-5] | FPS: {:.0}", base, selection.label(), fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_follow_selection_order() {
        let keys = [
            KeyCode::Digit1,
            KeyCode::Digit2,
            KeyCode::Digit3,
            KeyCode::Digit4,
            KeyCode::Digit5,
        ];
        for (key, selection) in keys.into_iter().zip(CameraSelection::ALL) {
            assert_eq!(command_for_key(key), Some(Command::SelectCamera(selection)));
        }
    }

    #[test]
    fn test_other_keys() {
        assert_eq!(command_for_key(KeyCode::Escape), Some(Command::Exit));
        assert_eq!(command_for_key(KeyCode::KeyW), None);
    }

    #[test]
    fn test_title() {
        assert_eq!(
            window_title("Orrery", CameraSelection::Earth, 59.6),
            "Orrery | Camera: Earth [1-5] | FPS: 60"
        );
    }
}
