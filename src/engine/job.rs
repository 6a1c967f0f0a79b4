use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::engine::protocol::{serialize_input, TaggedValue};
use crate::error::Result;
use crate::level::{SensitivityLevel, TrustScore};

/// One invocation's worth of input, owned by a single request.
///
/// Both files are uniquely named temp files. Dropping the job deletes them;
/// [`finish`](Self::finish) may instead keep the output file for diagnosis.
#[derive(Debug)]
pub struct AnonymizationJob {
    requester_id: String,
    tagged_values: Vec<TaggedValue>,
    trust_score: TrustScore,
    overall_sensitivity: SensitivityLevel,
    input: TempPath,
    output: TempPath,
}

impl AnonymizationJob {
    /// Writes the input file and allocates an (empty) output file in `dir`.
    pub fn create(
        dir: &Path,
        requester_id: &str,
        tagged_values: Vec<TaggedValue>,
        trust_score: TrustScore,
        overall_sensitivity: SensitivityLevel,
    ) -> Result<Self> {
        let mut input = Builder::new()
            .prefix("anon-input-")
            .suffix(".txt")
            .tempfile_in(dir)?;
        input.write_all(serialize_input(&tagged_values).as_bytes())?;
        input.flush()?;
        let input = input.into_temp_path();

        let output = Builder::new()
            .prefix("anon-output-")
            .suffix(".txt")
            .tempfile_in(dir)?
            .into_temp_path();

        debug!(
            "Created job with {} values: input {}, output {}",
            tagged_values.len(),
            input.display(),
            output.display()
        );
        Ok(Self {
            requester_id: requester_id.to_string(),
            tagged_values,
            trust_score,
            overall_sensitivity,
            input,
            output,
        })
    }

    pub fn tagged_values(&self) -> &[TaggedValue] {
        &self.tagged_values
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Positional engine arguments:
    /// `requester_id trust_score sensitivity input_path output_path`
    pub fn arguments(&self) -> Vec<OsString> {
        vec![
            OsString::from(&self.requester_id),
            OsString::from(self.trust_score.as_str()),
            OsString::from(self.overall_sensitivity.as_str()),
            self.input.as_os_str().to_os_string(),
            self.output.as_os_str().to_os_string(),
        ]
    }

    /// Deletes the input file, and the output file unless `retain_output`.
    /// Returns the retained output path, if any.
    pub fn finish(self, retain_output: bool) -> Option<PathBuf> {
        let input_path = self.input.to_path_buf();
        if let Err(e) = self.input.close() {
            warn!("Failed to delete engine input {}: {}", input_path.display(), e);
        }

        if retain_output && self.output.exists() {
            match self.output.keep() {
                Ok(path) => {
                    warn!("Retaining engine output {} for diagnosis", path.display());
                    return Some(path);
                }
                Err(e) => warn!("Failed to retain engine output: {}", e),
            }
            return None;
        }

        let output_path = self.output.to_path_buf();
        if let Err(e) = self.output.close() {
            warn!("Failed to delete engine output {}: {}", output_path.display(), e);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::fs;

    fn job(dir: &Path) -> AnonymizationJob {
        AnonymizationJob::create(
            dir,
            "analyst@clinic.org",
            vec![
                TaggedValue::new("blood_type", "O+"),
                TaggedValue::new("age", "42"),
            ],
            Level::Moderate,
            Level::High,
        )
        .unwrap()
    }

    #[test]
    fn test_input_file_written_output_allocated() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        assert_eq!(
            fs::read_to_string(job.input_path()).unwrap(),
            "blood_type::O+\nage::42"
        );
        assert_eq!(fs::read_to_string(job.output_path()).unwrap(), "");
        assert_ne!(job.input_path(), job.output_path());
    }

    #[test]
    fn test_arguments_order() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        let args = job.arguments();
        assert_eq!(args[0], "analyst@clinic.org");
        assert_eq!(args[1], "Moderate");
        assert_eq!(args[2], "High");
        assert_eq!(Path::new(&args[3]), job.input_path());
        assert_eq!(Path::new(&args[4]), job.output_path());
    }

    #[test]
    fn test_finish_deletes_both() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        let (input, output) = (job.input_path().to_path_buf(), job.output_path().to_path_buf());
        assert_eq!(job.finish(false), None);
        assert!(!input.exists());
        assert!(!output.exists());
    }

    #[test]
    fn test_finish_can_retain_output() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        let input = job.input_path().to_path_buf();
        let retained = job.finish(true).unwrap();
        assert!(!input.exists());
        assert!(retained.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        let (input, output) = (job.input_path().to_path_buf(), job.output_path().to_path_buf());
        drop(job);
        assert!(!input.exists());
        assert!(!output.exists());
    }

    #[test]
    fn test_unique_files_per_job() {
        let dir = tempfile::tempdir().unwrap();
        let a = job(dir.path());
        let b = job(dir.path());
        assert_ne!(a.input_path(), b.input_path());
        assert_ne!(a.output_path(), b.output_path());
    }
}
