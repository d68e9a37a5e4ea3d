use frame_contracts::milestones::{Milestone, MilestoneCatalog, UnknownMilestone};
use frame_contracts::payload::ImagePayload;
use frame_contracts::wire::{
    EnhancementRequest, Quality, Resolution, VENDOR_ASPECT_RATIO, VENDOR_MODEL,
};

/// Appended to every milestone prompt. Not configurable.
pub const FACE_PRESERVATION_SUFFIX: &str = "Maintain the original subjects' faces and identities \
while enhancing the overall scene and atmosphere. Output in ultra-high quality 4K resolution.";

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    catalog: MilestoneCatalog,
}

impl RequestBuilder {
    pub fn new(catalog: MilestoneCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MilestoneCatalog {
        &self.catalog
    }

    pub fn milestone(&self, milestone_id: &str) -> Result<&Milestone, UnknownMilestone> {
        self.catalog.lookup(milestone_id)
    }

    pub fn build_prompt(&self, milestone_id: &str) -> Result<String, UnknownMilestone> {
        let milestone = self.catalog.lookup(milestone_id)?;
        Ok(compose_prompt(&milestone.prompt_template))
    }

    pub fn build(
        &self,
        image: &ImagePayload,
        milestone_id: &str,
    ) -> Result<EnhancementRequest, UnknownMilestone> {
        let milestone = self.catalog.lookup(milestone_id)?;
        Ok(EnhancementRequest {
            source_image: image.clone(),
            milestone_id: milestone.id.clone(),
            prompt: compose_prompt(&milestone.prompt_template),
            model: VENDOR_MODEL.to_string(),
            resolution: Resolution::UltraHd,
            aspect_ratio: VENDOR_ASPECT_RATIO.to_string(),
            style_preset: milestone.style_preset.clone(),
            preserve_faces: true,
            quality: Quality::Ultra,
        })
    }
}

fn compose_prompt(template: &str) -> String {
    format!("{} {FACE_PRESERVATION_SUFFIX}", template.trim_end())
}
