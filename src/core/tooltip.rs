use crate::domain::model::PriceRecord;

/// The one tooltip shared by every converted price. Showing it for another
/// element overwrites content and position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tooltip {
    pub visible: bool,
    pub text: String,
    pub x: i32,
    pub y: i32,
}

impl Tooltip {
    pub fn show(&mut self, record: &PriceRecord, labels: &TooltipLabels, x: i32, y: i32) {
        let rate = record
            .rate
            .map(|r| r.to_string())
            .unwrap_or_else(|| "?".to_string());
        self.text = format!(
            "Original: {}\nRate: 1 {} = {} {}",
            record.original_text.trim(),
            labels.source_code,
            rate,
            labels.target_code
        );
        self.move_to(labels, x, y);
        self.visible = true;
    }

    pub fn move_to(&mut self, labels: &TooltipLabels, x: i32, y: i32) {
        self.x = x.saturating_add(labels.offset);
        self.y = y.saturating_add(labels.offset);
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[derive(Debug, Clone)]
pub struct TooltipLabels {
    pub source_code: String,
    pub target_code: String,
    pub offset: i32,
}
