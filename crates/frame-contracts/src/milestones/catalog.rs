use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub prompt_template: String,
    pub style_preset: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMilestone(pub String);

impl fmt::Display for UnknownMilestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown milestone: {}", self.0)
    }
}

impl std::error::Error for UnknownMilestone {}

/// Read-only table of the milestone categories a photo can be styled for.
///
/// Entries keep their display order, which is the order the picker shows
/// them in.
#[derive(Debug, Clone)]
pub struct MilestoneCatalog {
    milestones: IndexMap<String, Milestone>,
}

impl Default for MilestoneCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MilestoneCatalog {
    pub fn new(milestones: Option<IndexMap<String, Milestone>>) -> Self {
        Self {
            milestones: milestones.unwrap_or_else(default_milestones),
        }
    }

    pub fn lookup(&self, id: &str) -> Result<&Milestone, UnknownMilestone> {
        self.milestones
            .get(id)
            .ok_or_else(|| UnknownMilestone(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.milestones.contains_key(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.milestones.keys().cloned().collect()
    }

    pub fn prompt_for(&self, id: &str) -> Option<&str> {
        self.milestones
            .get(id)
            .map(|milestone| milestone.prompt_template.as_str())
    }

    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }
}

fn default_milestones() -> IndexMap<String, Milestone> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str,
                      name: &str,
                      icon: &str,
                      description: &str,
                      prompt_template: &str,
                      style_preset: &str| {
        map.insert(
            id.to_string(),
            Milestone {
                id: id.to_string(),
                name: name.to_string(),
                icon: icon.to_string(),
                description: description.to_string(),
                prompt_template: prompt_template.to_string(),
                style_preset: style_preset.to_string(),
            },
        );
    };

    insert(
        "first-date",
        "First Date",
        "heart",
        "Where it all began",
        "Transform this couple photo into a romantic, cinematic scene capturing the magic of a \
         first date. Add warm golden hour lighting, soft bokeh background with twinkling city \
         lights or cozy cafe ambiance. Enhance the emotional connection between the subjects \
         with professional portrait lighting. Style: romantic film photography, warm color \
         grading, shallow depth of field.",
        "romantic cinematic",
    );
    insert(
        "engagement",
        "Engagement",
        "gem",
        "The magical proposal",
        "Transform this couple photo into a stunning engagement portrait. Create a dreamy, \
         ethereal atmosphere with soft backlighting and gentle lens flare. Add elegant touches \
         like subtle sparkles or soft rose petals. Enhance with professional bridal photography \
         lighting. Style: high-end engagement photography, soft pastel tones, magazine quality.",
        "elegant bridal",
    );
    insert(
        "wedding",
        "Wedding Day",
        "star",
        "Your perfect day",
        "Transform this couple photo into an elegant, timeless wedding portrait. Add classic \
         wedding photography elements: soft diffused lighting, romantic atmosphere, subtle \
         vignette. Create a fairy-tale quality with gentle warm tones and professional \
         retouching. Style: luxury wedding photography, classic and timeless, editorial quality.",
        "luxury wedding",
    );
    insert(
        "anniversary",
        "Anniversary",
        "calendar",
        "Celebrating love",
        "Transform this couple photo into a celebration of enduring love. Add warm, nostalgic \
         lighting that evokes comfort and deep connection. Create a sophisticated, mature \
         romantic atmosphere with rich colors and elegant composition. Style: anniversary \
         portrait, warm intimate lighting, timeless elegance.",
        "warm intimate",
    );
    insert(
        "vacation",
        "Vacation",
        "camera",
        "Adventures together",
        "Transform this couple photo into an epic travel adventure scene. Enhance with vibrant \
         colors, dramatic lighting, and cinematic composition. Add atmosphere that captures the \
         excitement and joy of exploring together. Style: travel photography, vivid colors, \
         National Geographic quality.",
        "adventure travel",
    );
    insert(
        "celebration",
        "Celebration",
        "gift",
        "Special moments",
        "Transform this couple photo into a joyful celebration moment. Add festive, vibrant \
         atmosphere with dynamic lighting and energy. Enhance colors to be rich and lively while \
         maintaining natural skin tones. Style: celebration photography, vibrant and joyful, \
         candid editorial.",
        "festive celebration",
    );

    map
}
