use serde::Serialize;

/// One break of a colour ramp: the value it sits at and the colour there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColourStop {
    pub value: f32,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl ColourStop {
    pub fn rgba(&self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}
