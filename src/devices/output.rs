// MIT License - Copyright (c) 2021 TJForc
// Command output device

use crate::devices::{Device, DeviceKind};

/// A keypad command output (1-4) on a partition.
///
/// The TPI only reports that an output was pressed, so the device tracks
/// press counts rather than an on/off state.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub partition: u8,
    pub output: u8,
    pub presses: u32,
}

impl CommandOutput {
    pub fn new(partition: u8, output: u8) -> Self {
        Self {
            partition,
            output,
            presses: 0,
        }
    }

    pub fn press(&mut self) {
        self.presses = self.presses.saturating_add(1);
    }
}

impl Device for CommandOutput {
    fn kind(&self) -> DeviceKind {
        DeviceKind::CommandOutput
    }

    fn number(&self) -> u16 {
        u16::from(self.output)
    }

    fn address(&self) -> String {
        format!("cmdout_{}_{}", self.partition, self.output)
    }

    fn describe(&self) -> String {
        format!("pressed {} times", self.presses)
    }

    fn name(&self) -> String {
        format!("Command Output {} (partition {})", self.output, self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press() {
        let mut out = CommandOutput::new(1, 2);
        out.press();
        out.press();
        assert_eq!(out.presses, 2);
        assert_eq!(out.address(), "cmdout_1_2");
        assert_eq!(out.describe(), "pressed 2 times");
    }
}
