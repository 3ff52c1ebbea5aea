mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rollcall_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use rollcall_core::embedding::infrastructure::onnx_arcface_embedder::OnnxArcfaceEmbedder;
use rollcall_core::gallery::collection_store::VectorCollectionStore;
use rollcall_core::gallery::infrastructure::json_directory_persistence::JsonDirectoryPersistence;
use rollcall_core::pipeline::bulk_enroll_use_case::{BulkEnrollUseCase, BulkOutcome};
use rollcall_core::pipeline::enroll_identity_use_case::EnrollIdentityUseCase;
use rollcall_core::pipeline::face_analyzer::FaceAnalyzer;
use rollcall_core::pipeline::recognize_faces_use_case::RecognizeFacesUseCase;
use rollcall_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use rollcall_core::shared::model_resolver;

use settings::Settings;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Classroom face galleries: enroll students and take attendance from photos.
#[derive(Parser)]
#[command(name = "rollcall")]
struct Cli {
    /// Directory holding the classroom galleries.
    #[arg(long, global = true)]
    gallery_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage classrooms.
    #[command(subcommand)]
    Classrooms(ClassroomCommand),

    /// Inspect or remove enrolled students.
    #[command(subcommand)]
    Students(StudentCommand),

    /// Enroll a student from exactly three photos.
    Register {
        classroom: String,
        name: String,
        #[arg(num_args = 3, required = true)]
        images: Vec<PathBuf>,
    },

    /// Name every face in a photo.
    Recognize {
        classroom: String,
        image: PathBuf,

        /// Maximum cosine distance accepted as a match.
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Enroll every student folder of a dataset directory.
    BulkRegister {
        dataset_dir: PathBuf,

        /// Target classroom (defaults to the dataset folder name).
        #[arg(long)]
        classroom: Option<String>,

        /// Worker threads.
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ClassroomCommand {
    List,
    Create { name: String },
    Rename { old: String, new: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum StudentCommand {
    List { classroom: String },
    Delete { classroom: String, name: String },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> CliResult {
    let cli = Cli::parse();
    let settings = Settings::load();
    let confidence = cli.confidence.unwrap_or(settings.confidence);
    validate_confidence(confidence)?;

    let gallery_dir = cli
        .gallery_dir
        .or_else(|| settings.gallery_dir())
        .ok_or("No gallery directory: pass --gallery-dir")?;
    let store = open_store(&gallery_dir)?;

    match cli.command {
        Command::Classrooms(cmd) => run_classrooms(&store, cmd),
        Command::Students(cmd) => run_students(&store, cmd),
        Command::Register {
            classroom,
            name,
            images,
        } => {
            let samples = images
                .iter()
                .map(|p| read_image(p))
                .collect::<CliResult<Vec<_>>>()?;
            let use_case = EnrollIdentityUseCase::new(store, build_analyzer(confidence)?);
            let enrollment = use_case.execute(&classroom, &name, &samples)?;
            println!(
                "Registered '{}' in '{}' ({} samples)",
                enrollment.identity_name,
                enrollment.collection,
                enrollment.entry_ids.len()
            );
            Ok(())
        }
        Command::Recognize {
            classroom,
            image,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(settings.threshold);
            let bytes = read_image(&image)?;
            let use_case = RecognizeFacesUseCase::new(store, build_analyzer(confidence)?);
            let recognition = use_case.execute(&classroom, &bytes, threshold)?;
            if recognition.faces.is_empty() {
                println!("No faces found");
            }
            for face in &recognition.faces {
                let label = face.identity().unwrap_or("unknown");
                match face.distance() {
                    Some(d) => println!("{label}\t{d:.4}"),
                    None => println!("{label}"),
                }
            }
            Ok(())
        }
        Command::BulkRegister {
            dataset_dir,
            classroom,
            workers,
        } => {
            let classroom = match classroom {
                Some(c) => c,
                None => dataset_name(&dataset_dir)?,
            };
            let workers = workers.unwrap_or(settings.workers);
            let use_case = BulkEnrollUseCase::new(store, build_analyzer(confidence)?, workers);
            let report = use_case.execute(&dataset_dir, &classroom)?;
            for (identity, outcome) in &report.results {
                match outcome {
                    BulkOutcome::Enrolled { entries } => {
                        println!("registered\t{identity}\t{entries} samples")
                    }
                    BulkOutcome::Skipped { reason } => println!("skipped\t{identity}\t{reason}"),
                }
            }
            println!(
                "{} registered, {} skipped in '{}'",
                report.enrolled(),
                report.skipped(),
                report.collection
            );
            Ok(())
        }
    }
}

fn run_classrooms(store: &VectorCollectionStore, cmd: ClassroomCommand) -> CliResult {
    match cmd {
        ClassroomCommand::List => {
            for name in store.list_collections() {
                println!("{name}");
            }
        }
        ClassroomCommand::Create { name } => {
            store.create_collection(&name)?;
            println!("Created '{name}'");
        }
        ClassroomCommand::Rename { old, new } => {
            store.rename_collection(&old, &new)?;
            println!("Renamed '{old}' to '{new}'");
        }
        ClassroomCommand::Delete { name } => {
            store.delete_collection(&name)?;
            println!("Deleted '{name}'");
        }
    }
    Ok(())
}

fn run_students(store: &VectorCollectionStore, cmd: StudentCommand) -> CliResult {
    match cmd {
        StudentCommand::List { classroom } => {
            for name in store.list_identities(&classroom)? {
                println!("{name}");
            }
        }
        StudentCommand::Delete { classroom, name } => {
            let name = name.trim();
            let removed = store.delete_entries(&classroom, name)?;
            if removed == 0 {
                println!("'{name}' is not enrolled in '{classroom}'");
            } else {
                println!("Removed '{name}' from '{classroom}'");
            }
        }
    }
    Ok(())
}

fn open_store(gallery_dir: &Path) -> CliResult<Arc<VectorCollectionStore>> {
    log::debug!("Opening gallery at {}", gallery_dir.display());
    let persistence = JsonDirectoryPersistence::new(gallery_dir)?;
    Ok(Arc::new(VectorCollectionStore::open(Box::new(persistence))?))
}

fn build_analyzer(confidence: f64) -> CliResult<FaceAnalyzer> {
    let detector_path = resolve_model(YOLO_MODEL_NAME, YOLO_MODEL_URL, "face detection")?;
    let embedder_path =
        resolve_model(EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, "face embedding")?;

    let detector = OnnxYoloDetector::new(&detector_path, confidence)
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    let embedder = OnnxArcfaceEmbedder::new(&embedder_path)
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(FaceAnalyzer::new(Arc::new(detector), Arc::new(embedder)))
}

fn resolve_model(name: &str, url: &str, label: &'static str) -> CliResult<PathBuf> {
    log::info!("Resolving model: {name}");
    let path = model_resolver::resolve(
        name,
        url,
        None,
        Some(Box::new(move |downloaded: u64, total: u64| {
            download_progress(label, downloaded, total)
        })),
    )?;
    Ok(path)
}

fn read_image(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()).into())
}

fn dataset_name(dataset_dir: &Path) -> CliResult<String> {
    dataset_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            format!(
                "Cannot derive a classroom name from {}; pass --classroom",
                dataset_dir.display()
            )
            .into()
        })
}

fn validate_confidence(confidence: f64) -> CliResult {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("Confidence must be between 0.0 and 1.0, got {confidence}").into());
    }
    Ok(())
}

fn download_progress(label: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {label} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {label} model... {downloaded} bytes");
    }
}
