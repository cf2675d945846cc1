//! Prompt categories and requests.
//!
//! A batch always covers three fixed categories; each category knows its
//! place in the output archive and the resolution its images are rendered at.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VibepackError};

/// Background scenes are square; outfits are portrait.
pub const BACKGROUND_SIZE: (u32, u32) = (1024, 1024);
pub const OUTFIT_SIZE: (u32, u32) = (768, 1024);

/// Asset category for one generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Background,
    FemaleOutfit,
    MaleOutfit,
}

impl Category {
    /// All categories in batch order: backgrounds first, then outfits.
    pub const ALL: [Category; 3] = [
        Category::Background,
        Category::FemaleOutfit,
        Category::MaleOutfit,
    ];

    /// Directory this category's images live under inside the archive.
    pub fn dir(&self) -> &'static str {
        match self {
            Category::Background => "backgrounds",
            Category::FemaleOutfit => "female",
            Category::MaleOutfit => "male",
        }
    }

    /// Filename prefix for this category.
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Background => "bg",
            Category::FemaleOutfit => "female",
            Category::MaleOutfit => "male",
        }
    }

    /// Native render resolution (width, height).
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Category::Background => BACKGROUND_SIZE,
            Category::FemaleOutfit | Category::MaleOutfit => OUTFIT_SIZE,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir())
    }
}

/// One logical image request, immutable once created.
///
/// Produced by the prompt-expansion step and consumed exactly once by the
/// orchestrator. `index` is zero-based within the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub category: Category,
    pub index: usize,
    pub prompt_text: String,
    pub width: u32,
    pub height: u32,
}

impl PromptRequest {
    /// Create a request at the category's native resolution.
    pub fn new(category: Category, index: usize, prompt_text: impl Into<String>) -> Self {
        let (width, height) = category.resolution();
        Self {
            category,
            index,
            prompt_text: prompt_text.into(),
            width,
            height,
        }
    }

    /// Deterministic archive path for this request's output,
    /// e.g. `backgrounds/bg_01.png`.
    pub fn archive_path(&self) -> String {
        format!(
            "{}/{}_{:02}.png",
            self.category.dir(),
            self.category.prefix(),
            self.index + 1
        )
    }
}

impl std::fmt::Display for PromptRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.archive_path())
    }
}

/// Categorized prompt lists as returned by prompt expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSet {
    pub backgrounds: Vec<String>,
    pub female: Vec<String>,
    pub male: Vec<String>,
}

impl PromptSet {
    fn prompts_for(&self, category: Category) -> &[String] {
        match category {
            Category::Background => &self.backgrounds,
            Category::FemaleOutfit => &self.female,
            Category::MaleOutfit => &self.male,
        }
    }

    /// Flatten into the ordered request list the orchestrator consumes.
    ///
    /// Fails if any category does not carry exactly `num_assets` prompts;
    /// an incomplete set means the upstream expansion call misbehaved and
    /// the batch must not start.
    pub fn into_requests(self, num_assets: usize) -> Result<Vec<PromptRequest>> {
        for category in Category::ALL {
            let got = self.prompts_for(category).len();
            if got != num_assets {
                return Err(VibepackError::PromptGeneration(format!(
                    "expected {} prompts for category '{}', got {}",
                    num_assets, category, got
                )));
            }
        }

        let mut requests = Vec::with_capacity(num_assets * Category::ALL.len());
        for category in Category::ALL {
            for (index, text) in self.prompts_for(category).iter().enumerate() {
                requests.push(PromptRequest::new(category, index, text.clone()));
            }
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_paths_are_zero_padded_and_one_based() {
        let req = PromptRequest::new(Category::Background, 0, "palace");
        assert_eq!(req.archive_path(), "backgrounds/bg_01.png");

        let req = PromptRequest::new(Category::FemaleOutfit, 11, "gown");
        assert_eq!(req.archive_path(), "female/female_12.png");
    }

    #[test]
    fn archive_paths_are_unique_across_categories() {
        let mut paths = std::collections::HashSet::new();
        for category in Category::ALL {
            for index in 0..10 {
                let req = PromptRequest::new(category, index, "x");
                assert!(paths.insert(req.archive_path()));
            }
        }
    }

    #[test]
    fn resolutions_follow_category() {
        let bg = PromptRequest::new(Category::Background, 0, "x");
        assert_eq!((bg.width, bg.height), (1024, 1024));

        let outfit = PromptRequest::new(Category::MaleOutfit, 0, "x");
        assert_eq!((outfit.width, outfit.height), (768, 1024));
    }

    #[test]
    fn prompt_set_flattens_in_category_order() {
        let set = PromptSet {
            backgrounds: vec!["b1".into(), "b2".into()],
            female: vec!["f1".into(), "f2".into()],
            male: vec!["m1".into(), "m2".into()],
        };

        let requests = set.into_requests(2).unwrap();
        assert_eq!(requests.len(), 6);
        assert_eq!(requests[0].category, Category::Background);
        assert_eq!(requests[0].index, 0);
        assert_eq!(requests[2].category, Category::FemaleOutfit);
        assert_eq!(requests[5].prompt_text, "m2");
        assert_eq!(requests[5].index, 1);
    }

    #[test]
    fn prompt_set_rejects_incomplete_categories() {
        let set = PromptSet {
            backgrounds: vec!["b1".into(), "b2".into()],
            female: vec!["f1".into()],
            male: vec!["m1".into(), "m2".into()],
        };

        let err = set.into_requests(2).unwrap_err();
        assert!(matches!(err, VibepackError::PromptGeneration(_)));
        assert!(err.to_string().contains("female"));
    }
}
