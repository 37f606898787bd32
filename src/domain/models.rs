use crate::domain::frame::SensorFrame;

/// Latest-value view of the glove, fed by parsed frames.
///
/// Only the newest reading is kept; consumers that missed a frame read the
/// current state instead of a backlog. Temperature outlives frames that omit
/// it, since the device only transmits it on some messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandState {
    pub thumb: i32,
    pub index: i32,
    pub middle: i32,
    pub ring: i32,
    pub pinky: i32,
    pub temperature: Option<i32>,
}

impl HandState {
    pub fn apply(&mut self, frame: &SensorFrame) {
        self.thumb = frame.thumb;
        self.index = frame.index;
        self.middle = frame.middle;
        self.ring = frame.ring;
        self.pinky = frame.pinky;
        if let Some(temperature) = frame.temperature {
            self.temperature = Some(temperature);
        }
    }

    pub fn fingers(&self) -> [i32; 5] {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
    }
}

#[derive(Debug, Clone)]
pub enum GloveEvent {
    Frame(SensorFrame),
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_survives_frames_without_one() {
        let mut state = HandState::default();
        state.apply(&SensorFrame {
            thumb: 1,
            index: 2,
            middle: 3,
            ring: 4,
            pinky: 5,
            temperature: Some(14500),
        });
        state.apply(&SensorFrame {
            thumb: 9,
            index: 8,
            middle: 7,
            ring: 6,
            pinky: 5,
            temperature: None,
        });
        assert_eq!(state.fingers(), [9, 8, 7, 6, 5]);
        assert_eq!(state.temperature, Some(14500));
    }
}
