#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use sensitivity_gateway::api::models::RequestContext;
use sensitivity_gateway::config::Settings;
use sensitivity_gateway::embedding::EmbeddingProvider;
use sensitivity_gateway::{PipelineError, Result, Services};

/// Writes each input value back as `<trust>|<sensitivity>|<value>::masking`
pub const ECHO_ENGINE: &str = r#"
while IFS= read -r line || [ -n "$line" ]; do
    printf '%s|%s|%s::masking\n' "$2" "$3" "${line#*::}"
done < "$4" > "$5"
echo "Starting Anonymization Process..."
echo "ANONYMIZATION_SCORE: 0.75"
echo "UTILITY_RETAINED: 80%"
"#;

/// Embeds by keyword: medical terms on x, numbers on y, everything else on z
pub struct KeywordEmbedder {
    pub dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text == "offline" {
            return Err(PipelineError::EmbeddingFailure("model unreachable".into()));
        }
        if text.contains("diabetes") || text.contains("asthma") {
            Ok(vec![1.0, 0.0, 0.0])
        } else if text.chars().next().map_or(false, |c| c.is_ascii_digit()) {
            Ok(vec![0.0, 1.0, 0.0])
        } else {
            Ok(vec![0.0, 0.0, 1.0])
        }
    }
}

/// A scratch deployment: artifacts, one data source and an engine script
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
}

impl Fixture {
    pub fn new(engine_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write_json(
            &root.join("domain_index.json"),
            json!({
                "model": "keyword-test",
                "dimension": 3,
                "entries": [
                    {"text": "blood test results", "label": "Healthcare", "vector": [1.0, 0.0, 0.0]},
                    {"text": "patient diagnosis", "label": "Healthcare", "vector": [0.9, 0.1, 0.0]},
                    {"text": "annual salary", "label": "Finance", "vector": [0.0, 1.0, 0.0]},
                    {"text": "loan balance", "label": "Finance", "vector": [0.1, 0.9, 0.0]},
                    {"text": "home town", "label": "Geography", "vector": [0.0, 0.0, 1.0]},
                    {"text": "postal area", "label": "Geography", "vector": [0.0, 0.1, 0.9]},
                    {"text": "region", "label": "Geography", "vector": [0.1, 0.0, 0.9]}
                ]
            }),
        );
        write_json(
            &root.join("owner_index.json"),
            json!({
                "dimension": 3,
                "entries": [
                    {"text": "patient record", "label": "Individual", "vector": [1.0, 0.0, 0.0]},
                    {"text": "person address", "label": "Individual", "vector": [0.0, 0.0, 1.0]},
                    {"text": "residence", "label": "Individual", "vector": [0.1, 0.0, 0.9]},
                    {"text": "company payroll", "label": "Company", "vector": [0.0, 1.0, 0.0]},
                    {"text": "corporate accounts", "label": "Company", "vector": [0.1, 0.9, 0.0]}
                ]
            }),
        );
        write_json(
            &root.join("trust_model.json"),
            json!({
                "encoders": {
                    "email_type": ["Organisational", "Personal"],
                    "domain": ["Finance", "Healthcare"],
                    "purpose": ["Marketing", "Research"]
                },
                "classes": [0, 1, 2],
                "trees": [{"nodes": [
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 4},
                    {"feature": 2, "threshold": 0.5, "left": 2, "right": 3},
                    {"value": [0.0, 6.0, 1.0]},
                    {"value": [0.0, 1.0, 6.0]},
                    {"value": [9.0, 0.0, 0.0]}
                ]}]
            }),
        );
        fs::write(
            root.join("policy.csv"),
            "label,level,owner,explainability,sharing entity\n\
             Healthcare,High,,,\n\
             Finance,Moderate,,,\n\
             Company,Medium,,,\n\
             Healthcare,High,Patients,Clinical records,Hospital network\n",
        )
        .unwrap();
        fs::write(
            root.join("registry.csv"),
            "filename,about,domain\nclinic.csv,Patients,Healthcare\n",
        )
        .unwrap();

        let data = root.join("uploads");
        fs::create_dir(&data).unwrap();
        let people = "name,city,salary,notes\n\
                      Ann,Paris,50000,diabetes\n\
                      Bob,Lyon,50000,\n\
                      Cy,Paris,,offline\n";
        fs::write(data.join("people.csv"), people).unwrap();
        fs::write(data.join("clinic.csv"), people).unwrap();

        let work = root.join("work");
        fs::create_dir(&work).unwrap();

        let mut settings = Settings::default();
        settings.index.domain_path = root.join("domain_index.json");
        settings.index.owner_path = Some(root.join("owner_index.json"));
        settings.index.k = 3;
        settings.trust.model_path = root.join("trust_model.json");
        settings.policy.path = root.join("policy.csv");
        settings.sources.data_dir = data;
        settings.sources.metadata_path = Some(root.join("registry.csv"));
        settings.engine.program = "sh".to_string();
        settings.engine.args = vec!["-c".to_string(), engine_script.to_string(), "engine".to_string()];
        settings.engine.timeout_secs = 10;
        settings.engine.work_dir = Some(work);

        Self { dir, settings }
    }

    pub fn services(&self) -> Services {
        Services::with_embedder(&self.settings, Arc::new(KeywordEmbedder { dimension: 3 })).unwrap()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Files left behind in the engine work dir
    pub fn leftovers(&self) -> Vec<PathBuf> {
        fs::read_dir(self.work_dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

pub fn request(email: &str, domain: &str, purpose: &str, source: &str, attributes: &[&str]) -> RequestContext {
    RequestContext {
        requester_email: email.to_string(),
        requested_domain: domain.to_string(),
        purpose: purpose.to_string(),
        source_identifier: source.to_string(),
        selected_attributes: attributes.iter().map(|a| a.to_string()).collect(),
    }
}

fn write_json(path: &Path, value: serde_json::Value) {
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}
