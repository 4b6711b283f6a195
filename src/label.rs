use std::fmt;

/// The two classes the classifier distinguishes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Label {
    NotTouched,
    Touched,
}

impl Label {
    pub const COUNT: usize = 2;
    pub const ALL: [Label; Label::COUNT] = [Label::NotTouched, Label::Touched];

    pub(crate) fn index(self) -> usize {
        match self {
            Label::NotTouched => 0,
            Label::Touched => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::NotTouched => "not_touched",
            Label::Touched => "touched",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted label plus a confidence in [0,1] for every label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: Label,
    confidences: [f32; Label::COUNT],
}

impl ClassificationResult {
    pub fn new(label: Label, not_touched: f32, touched: f32) -> Self {
        ClassificationResult {
            label,
            confidences: [not_touched, touched],
        }
    }

    pub fn confidence(&self, label: Label) -> f32 {
        self.confidences[label.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidences_are_kept_per_label() {
        let r = ClassificationResult::new(Label::Touched, 0.25, 0.75);
        assert_eq!(r.confidence(Label::NotTouched), 0.25);
        assert_eq!(r.confidence(Label::Touched), 0.75);
        assert_eq!(r.label.to_string(), "touched");
    }
}
