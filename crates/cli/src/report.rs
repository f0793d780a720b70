//! Rendering of the final job snapshot.

use hpc_core::job::{FileUploadJob, JobStatus};

/// One line per job: name, status, progress, job id and outcome.
pub fn render_line(job: &FileUploadJob) -> String {
    let job_id = job.job_id.as_deref().unwrap_or("-");
    let outcome = match (job.status, &job.result, &job.error) {
        (JobStatus::Completed, Some(result), _) => format!("result={result:?}"),
        (JobStatus::Error, _, Some(error)) => format!("error={error}"),
        _ => String::new(),
    };
    format!(
        "{:<32} {:<12} {:>3}% {:<36} {}",
        job.file_name, job.status, job.progress, job_id, outcome
    )
    .trim_end()
    .to_string()
}

pub fn render_table(jobs: &[FileUploadJob]) -> String {
    jobs.iter().map(render_line).collect::<Vec<_>>().join("\n")
}

pub fn render_json(jobs: &[FileUploadJob]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(jobs)
}

/// Whether any job ended in `error`.
pub fn has_failures(jobs: &[FileUploadJob]) -> bool {
    jobs.iter().any(|job| job.status == JobStatus::Error)
}

#[cfg(test)]
mod tests {
    use hpc_core::job::JobPatch;

    use super::*;

    fn completed() -> FileUploadJob {
        let mut job = FileUploadJob::new("data.txt");
        job.apply(&JobPatch::handed_off("job-1"));
        job.apply(
            &JobPatch::new()
                .with_status(JobStatus::Completed)
                .with_progress(100)
                .with_result(vec![3.0, 1.5]),
        );
        job
    }

    fn failed() -> FileUploadJob {
        let mut job = FileUploadJob::new("bad.csv");
        job.apply(&JobPatch::failed("Chunk 0 failed"));
        job
    }

    #[test]
    fn completed_line_shows_result() {
        let line = render_line(&completed());
        assert!(line.starts_with("data.txt"));
        assert!(line.contains("completed"));
        assert!(line.contains("100%"));
        assert!(line.contains("job-1"));
        assert!(line.ends_with("result=[3.0, 1.5]"));
    }

    #[test]
    fn failed_line_shows_error_and_placeholder_id() {
        let line = render_line(&failed());
        assert!(line.contains(" - "));
        assert!(line.ends_with("error=Chunk 0 failed"));
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let json = render_json(&[completed()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["fileName"], "data.txt");
        assert_eq!(value[0]["jobId"], "job-1");
        assert_eq!(value[0]["status"], "completed");
    }

    #[test]
    fn failures_detected() {
        assert!(!has_failures(&[completed()]));
        assert!(has_failures(&[completed(), failed()]));
        assert_eq!(render_table(&[completed(), failed()]).lines().count(), 2);
    }
}
