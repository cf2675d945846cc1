//! Asset assembler: category-keyed archive built from a batch result.
//!
//! Assembly is a pure function of the completed set; serializing the same
//! archive twice yields byte-identical zip contents (timestamps are pinned).

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use anyhow::Context;

use crate::config::PartialFailurePolicy;
use crate::domain::batch::BatchResult;
use crate::domain::prompt::Category;
use crate::error::{Result, VibepackError};

/// Categorized in-memory archive, immutable after assembly.
#[derive(Debug, Clone)]
pub struct AssetArchive {
    /// Archive path (e.g. `backgrounds/bg_01.png`) to image bytes. Sorted,
    /// so serialization order is independent of completion order.
    pub entries: BTreeMap<String, Vec<u8>>,
    /// The (category, index) pairs dropped under the return-partial policy.
    pub missing: Vec<(Category, usize)>,
}

impl AssetArchive {
    /// Assemble an archive from a finished batch.
    ///
    /// Under [`PartialFailurePolicy::FailWhole`], any failed job aborts
    /// assembly with [`VibepackError::Assembly`] naming the missing assets.
    /// Under [`PartialFailurePolicy::ReturnPartial`], only the completed
    /// subset is packaged and the dropped assets are recorded in `missing`.
    pub fn assemble(result: &BatchResult, policy: PartialFailurePolicy) -> Result<AssetArchive> {
        if !result.failed.is_empty() && policy == PartialFailurePolicy::FailWhole {
            return Err(VibepackError::Assembly {
                missing: result.missing(),
            });
        }

        let mut entries = BTreeMap::new();
        for (request, bytes) in &result.completed {
            let path = request.archive_path();
            if entries.insert(path.clone(), bytes.clone()).is_some() {
                return Err(anyhow::anyhow!("duplicate archive path {}", path).into());
            }
        }

        Ok(AssetArchive {
            entries,
            missing: result.missing(),
        })
    }

    /// Number of images in the archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to zip bytes.
    ///
    /// Entries are written in sorted path order with a pinned modification
    /// time, so identical entries always produce identical bytes.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for (path, bytes) in &self.entries {
            writer
                .start_file(path.clone(), options)
                .with_context(|| format!("failed to start archive entry {}", path))?;
            writer
                .write_all(bytes)
                .with_context(|| format!("failed to write archive entry {}", path))?;
        }

        let cursor = writer
            .finish()
            .context("failed to finalize archive")?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::FailureReason;
    use crate::domain::prompt::PromptRequest;

    fn batch_with_failures(completed: usize, failed: usize) -> BatchResult {
        let mut result = BatchResult::default();
        for index in 0..completed {
            result.completed.push((
                PromptRequest::new(Category::Background, index, "p"),
                vec![index as u8; 32],
            ));
        }
        for index in 0..failed {
            result.failed.push((
                PromptRequest::new(Category::MaleOutfit, index, "p"),
                FailureReason::MissingOutput,
            ));
        }
        result
    }

    #[test]
    fn fail_whole_rejects_partial_batches() {
        let result = batch_with_failures(2, 1);
        let err = AssetArchive::assemble(&result, PartialFailurePolicy::FailWhole).unwrap_err();

        match err {
            VibepackError::Assembly { missing } => {
                assert_eq!(missing, vec![(Category::MaleOutfit, 0)])
            }
            other => panic!("expected assembly error, got {}", other),
        }
    }

    #[test]
    fn return_partial_packages_completed_subset() {
        let result = batch_with_failures(2, 1);
        let archive =
            AssetArchive::assemble(&result, PartialFailurePolicy::ReturnPartial).unwrap();

        assert_eq!(archive.len(), 2);
        assert!(archive.entries.contains_key("backgrounds/bg_01.png"));
        assert!(archive.entries.contains_key("backgrounds/bg_02.png"));
        assert_eq!(archive.missing, vec![(Category::MaleOutfit, 0)]);
    }

    #[test]
    fn fully_successful_batch_assembles_under_either_policy() {
        let result = batch_with_failures(3, 0);
        for policy in [
            PartialFailurePolicy::FailWhole,
            PartialFailurePolicy::ReturnPartial,
        ] {
            let archive = AssetArchive::assemble(&result, policy).unwrap();
            assert_eq!(archive.len(), 3);
            assert!(archive.missing.is_empty());
        }
    }

    #[test]
    fn zip_serialization_is_deterministic() {
        let result = batch_with_failures(3, 0);
        let archive = AssetArchive::assemble(&result, PartialFailurePolicy::FailWhole).unwrap();

        let first = archive.to_zip_bytes().unwrap();
        let second = archive.to_zip_bytes().unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn zip_round_trips_entry_contents() {
        let result = batch_with_failures(2, 0);
        let archive = AssetArchive::assemble(&result, PartialFailurePolicy::FailWhole).unwrap();
        let bytes = archive.to_zip_bytes().unwrap();

        let mut reader = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 2);

        let mut names: Vec<String> = (0..reader.len())
            .map(|i| reader.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["backgrounds/bg_01.png", "backgrounds/bg_02.png"]);

        let mut file = reader.by_name("backgrounds/bg_02.png").unwrap();
        let mut contents = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut contents).unwrap();
        assert_eq!(contents, vec![1u8; 32]);
    }
}
