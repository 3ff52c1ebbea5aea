use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::gallery::collection_store::VectorCollectionStore;
use crate::gallery::domain::gallery_error::GalleryError;
use crate::pipeline::enroll_identity_use_case::EnrollIdentityUseCase;
use crate::pipeline::face_analyzer::FaceAnalyzer;
use crate::shared::constants::{IMAGE_EXTENSIONS, SAMPLES_PER_IDENTITY};

#[derive(Clone, Debug, PartialEq)]
pub enum BulkOutcome {
    Enrolled { entries: usize },
    Skipped { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulkEnrollReport {
    pub collection: String,
    /// `(identity, outcome)` in folder name order.
    pub results: Vec<(String, BulkOutcome)>,
}

impl BulkEnrollReport {
    pub fn enrolled(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, o)| matches!(o, BulkOutcome::Enrolled { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results.len() - self.enrolled()
    }
}

struct Job {
    index: usize,
    identity: String,
    dir: PathBuf,
}

/// Enrolls every identity found in a dataset directory.
///
/// Layout: one subfolder per identity, named after it. The first
/// [`SAMPLES_PER_IDENTITY`] image files (by file name) are enrolled;
/// folders that cannot be enrolled are skipped and reported.
pub struct BulkEnrollUseCase {
    store: Arc<VectorCollectionStore>,
    enroll: EnrollIdentityUseCase,
    workers: usize,
}

impl BulkEnrollUseCase {
    pub fn new(store: Arc<VectorCollectionStore>, analyzer: FaceAnalyzer, workers: usize) -> Self {
        Self {
            enroll: EnrollIdentityUseCase::new(store.clone(), analyzer),
            store,
            workers: workers.max(1),
        }
    }

    pub fn execute(
        &self,
        dataset_dir: &Path,
        collection: &str,
    ) -> Result<BulkEnrollReport, GalleryError> {
        let jobs = identity_dirs(dataset_dir)?;
        if !self.store.contains(collection) {
            self.store.create_collection(collection)?;
        }
        log::info!(
            "Bulk enrolling {} identities from {} into '{collection}' with {} workers",
            jobs.len(),
            dataset_dir.display(),
            self.workers
        );

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, String, BulkOutcome)>();
        let total = jobs.len();
        for job in jobs {
            // Receiver is alive until the scope below ends.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        std::thread::scope(|s| {
            for _ in 0..self.workers.min(total.max(1)) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || {
                    for job in job_rx.iter() {
                        let outcome = self.enroll_dir(collection, &job);
                        if result_tx.send((job.index, job.identity, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<(usize, String, BulkOutcome)> = result_rx.iter().collect();
        results.sort_by_key(|(index, _, _)| *index);
        let report = BulkEnrollReport {
            collection: collection.to_string(),
            results: results
                .into_iter()
                .map(|(_, identity, outcome)| (identity, outcome))
                .collect(),
        };
        log::info!(
            "Bulk enrollment into '{collection}': {} enrolled, {} skipped",
            report.enrolled(),
            report.skipped()
        );
        Ok(report)
    }

    fn enroll_dir(&self, collection: &str, job: &Job) -> BulkOutcome {
        let outcome = match self.load_samples(&job.dir) {
            Ok(samples) => match self.enroll.execute(collection, &job.identity, &samples) {
                Ok(enrollment) => BulkOutcome::Enrolled {
                    entries: enrollment.entry_ids.len(),
                },
                Err(e) => BulkOutcome::Skipped {
                    reason: e.to_string(),
                },
            },
            Err(reason) => BulkOutcome::Skipped { reason },
        };
        if let BulkOutcome::Skipped { reason } = &outcome {
            log::warn!("Skipping '{}': {reason}", job.identity);
        }
        outcome
    }

    fn load_samples(&self, dir: &Path) -> Result<Vec<Vec<u8>>, String> {
        let files = image_files(dir).map_err(|e| format!("cannot list {}: {e}", dir.display()))?;
        if files.len() < SAMPLES_PER_IDENTITY {
            return Err(format!(
                "found {} images, need {SAMPLES_PER_IDENTITY}",
                files.len()
            ));
        }
        files
            .iter()
            .take(SAMPLES_PER_IDENTITY)
            .map(|path| fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display())))
            .collect()
    }
}

/// Identity subfolders of `dataset_dir`, sorted by name. Blank names are ignored.
fn identity_dirs(dataset_dir: &Path) -> Result<Vec<Job>, GalleryError> {
    let io_err = |source: std::io::Error| GalleryError::Io {
        path: dataset_dir.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dataset_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping non UTF-8 folder {}", path.display());
            continue;
        };
        if name.trim().is_empty() || name.starts_with('.') {
            continue;
        }
        dirs.push((name.trim().to_string(), path));
    }
    dirs.sort();
    Ok(dirs
        .into_iter()
        .enumerate()
        .map(|(index, (identity, dir))| Job {
            index,
            identity,
            dir,
        })
        .collect())
}

fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}
