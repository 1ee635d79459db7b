//! Live key controls and how they mutate [`PipelineParameters`].

use crate::types::{
    PipelineParameters, CANNY_GAP, CANNY_HIGH_MAX, CANNY_LOW_MAX, THICKNESS_MAX, THICKNESS_MIN,
    TOPHAT_MAX, TOPHAT_MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Quit,
    Save,
    MoreSensitive,
    LessSensitive,
    Thinner,
    Thicker,
    SmallerBackground,
    LargerBackground,
}

impl Control {
    /// Maps a typed character to a control, if it is bound.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'q' | 'Q' => Some(Self::Quit),
            's' | 'S' => Some(Self::Save),
            '+' | '=' => Some(Self::MoreSensitive),
            '-' => Some(Self::LessSensitive),
            '[' => Some(Self::Thinner),
            ']' => Some(Self::Thicker),
            ',' => Some(Self::SmallerBackground),
            '.' => Some(Self::LargerBackground),
            _ => None,
        }
    }

    pub const HELP: &'static str =
        "Keys: q=quit, s=save, +/- sensitivity, [ ] thickness, , . background window";
}

impl PipelineParameters {
    /// Applies one parameter control. `Quit` and `Save` leave the
    /// parameters untouched; the loop handles them.
    pub fn apply(&mut self, control: Control) {
        match control {
            Control::MoreSensitive => {
                self.canny_low = self.canny_low.saturating_sub(2);
                self.canny_high = self
                    .canny_high
                    .saturating_sub(4)
                    .max(self.canny_low.saturating_add(CANNY_GAP));
            }
            Control::LessSensitive => {
                self.canny_low = self.canny_low.saturating_add(2).min(CANNY_LOW_MAX);
                self.canny_high = self.canny_high.saturating_add(4).min(CANNY_HIGH_MAX);
            }
            Control::Thinner => {
                self.thickness = self.thickness.saturating_sub(1).max(THICKNESS_MIN);
            }
            Control::Thicker => {
                self.thickness = (self.thickness + 1).min(THICKNESS_MAX);
            }
            Control::SmallerBackground => {
                self.tophat_size = self.tophat_size.saturating_sub(2).max(TOPHAT_MIN);
            }
            Control::LargerBackground => {
                self.tophat_size = (self.tophat_size + 2).min(TOPHAT_MAX);
            }
            Control::Quit | Control::Save => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_floor_and_gap() {
        let mut p = PipelineParameters::default();
        for _ in 0..200 {
            let before = p;
            p.apply(Control::MoreSensitive);
            assert!(p.canny_low <= before.canny_low);
            assert!(p.canny_high >= p.canny_low + CANNY_GAP);
        }
        assert_eq!(p.canny_low, 0);
        assert_eq!(p.canny_high, 10);
    }

    #[test]
    fn sensitivity_ceiling() {
        let mut p = PipelineParameters::default();
        for _ in 0..200 {
            let before = p;
            p.apply(Control::LessSensitive);
            assert!(p.canny_low >= before.canny_low);
            assert!(p.canny_high <= CANNY_HIGH_MAX);
        }
        assert_eq!(p.canny_low, 100);
        assert_eq!(p.canny_high, 250);
    }

    #[test]
    fn thickness_and_background_stay_in_range() {
        let mut p = PipelineParameters::default();
        let script = [
            Control::Thinner,
            Control::Thinner,
            Control::Thinner,
            Control::Thicker,
            Control::SmallerBackground,
            Control::SmallerBackground,
            Control::SmallerBackground,
            Control::SmallerBackground,
            Control::SmallerBackground,
        ];
        for c in script.iter().cycle().take(90) {
            p.apply(*c);
            assert!((THICKNESS_MIN..=THICKNESS_MAX).contains(&p.thickness));
            assert!((TOPHAT_MIN..=TOPHAT_MAX).contains(&p.tophat_size));
        }
        for _ in 0..20 {
            p.apply(Control::Thicker);
            p.apply(Control::LargerBackground);
        }
        assert_eq!(p.thickness, 7);
        assert_eq!(p.tophat_size, 31);
    }

    #[test]
    fn quit_and_save_do_not_touch_parameters() {
        let mut p = PipelineParameters::default();
        p.apply(Control::Quit);
        p.apply(Control::Save);
        assert_eq!(p, PipelineParameters::default());
    }

    #[test]
    fn key_bindings() {
        assert_eq!(Control::from_char('='), Some(Control::MoreSensitive));
        assert_eq!(Control::from_char('+'), Some(Control::MoreSensitive));
        assert_eq!(Control::from_char('.'), Some(Control::LargerBackground));
        assert_eq!(Control::from_char('x'), None);
    }
}
