use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;
use url::Url;

use crate::assemble::Mode;
use crate::pattern::{ChunkKey, FilePattern};
use crate::stage::StageDescriptor;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SourceItem {
    pub key: ChunkKey,
    pub urls: Vec<Url>,
}

/// Everything the execution engine needs to run one recipe.
#[derive(Serialize, Clone, Debug)]
pub struct JobDescription {
    recipe_id: String,
    mode: Mode,
    store_name: String,
    source: Vec<SourceItem>,
    stages: Vec<StageDescriptor>,
}

impl JobDescription {
    pub fn new(
        recipe_id: &str,
        mode: Mode,
        store_name: &str,
        pattern: &FilePattern,
        stages: Vec<StageDescriptor>,
    ) -> Self {
        let source = pattern
            .items()
            .map(|(key, urls)| SourceItem {
                key: key.clone(),
                urls: urls.to_vec(),
            })
            .collect();
        Self {
            recipe_id: recipe_id.to_string(),
            mode,
            store_name: store_name.to_string(),
            source,
            stages,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn source(&self) -> &[SourceItem] {
        &self.source
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::credentials::{ClientOptions, Credentials, EARTHDATA_LOGIN_HOST};

    fn mock_job() -> JobDescription {
        let urls = vec![
            Url::parse("https://host/data/day1.nc4").unwrap(),
            Url::parse("https://host/data/day2.nc4").unwrap(),
        ];
        let pattern = FilePattern::from_file_sequence(urls, "time", 1, &[]).unwrap();
        let options =
            ClientOptions::new(EARTHDATA_LOGIN_HOST, Credentials::new("alice", "s3cr3t"), true);
        let stages = assemble(&pattern, &options, Mode::Materialize, "gpm.zarr").unwrap();
        JobDescription::new("test.recipe", Mode::Materialize, "gpm.zarr", &pattern, stages)
    }

    #[test]
    fn test_source_items_follow_pattern() {
        let job = mock_job();
        assert_eq!(job.source().len(), 2);
        assert_eq!(job.source()[1].key, ChunkKey::new(vec![1]));
        assert_eq!(job.source()[1].urls[0].as_str(), "https://host/data/day2.nc4");
        assert_eq!(job.stages().len(), 3);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs").join("job.json");
        mock_job().write(&path).unwrap();
        assert!(path.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("s3cr3t"));

        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["recipe_id"], "test.recipe");
        assert_eq!(value["mode"], "materialize");
        assert_eq!(value["store_name"], "gpm.zarr");
        assert_eq!(value["source"][0]["key"], serde_json::json!([0]));
        assert_eq!(value["stages"][2]["kind"], "store-to-zarr");
        assert_eq!(
            value["stages"][2]["params"]["combine_dims"],
            serde_json::json!([{"name": "time", "operation": "concat", "items_per_file": 1}])
        );
    }
}
