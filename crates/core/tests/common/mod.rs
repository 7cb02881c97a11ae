//! Shared harness for the orchestrator integration tests.
//!
//! Workers are played by a small `sh` script standing in for conda. It
//! appends one line per invocation to `calls.log` under the test root.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use naiade_core::{
    testing::{fixtures, RecordingNotifier},
    Config, CondaWorkerInvoker, JobQueue, FileTransfer, FsResultStore, NaiadeJobHandler, PhotoDispatcher,
    PhotoProcessor, PhotoProcessorDeps, QueueScheduler, QueueWorker, SourceFetcher,
    SqliteJobQueue, SqliteTaskLock, SqliteTaskStore, TicketProcessor,
};

const FAKE_CONDA: &str = r#"
# $1=run $2=-n $3=<env> $4=<python> $5=<entry> $6..=<args>
echo "$3 $5 $6 $7" >> "__CALLS__"
case "$5" in
  bucle.py)
    ticket="${6#--ticket=}"
    if [ "$ticket" = "T3" ]; then
      echo "CUDA out of memory" >&2
      exit 3
    fi
    mkdir -p "naiade_output/$ticket"
    for f in "naiade_tmp/$ticket"/*; do
      cp "$f" "naiade_output/$ticket/processed_$(basename "$f")"
    done
    ;;
  script.py)
    sleep __PHOTO_DELAY__
    if [ "$3" = "BACKGROUND-REMOVAL" ]; then
      echo '{"success": false, "message": "no subject found"}'
      exit 0
    fi
    name="${6#--filename=}"
    mkdir -p output
    cp "tmp_image/$name" "output/processed_$name"
    echo "{\"success\": true, \"processed_image\": \"processed_$name\", \"message\": \"ok\"}"
    ;;
esac
"#;

pub struct Stack {
    _temp: TempDir,
    pub root: PathBuf,
    pub config: Config,
    pub tasks: Arc<SqliteTaskStore>,
    pub queue: Arc<SqliteJobQueue>,
    pub notifier: RecordingNotifier,
    pub photos: Arc<PhotoProcessor>,
    pub scheduler: QueueScheduler,
    pub dispatcher: PhotoDispatcher,
    pub worker: QueueWorker,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_photo_delay(Duration::ZERO)
    }

    /// A stack whose single-photo worker takes at least `delay`.
    pub fn with_photo_delay(delay: Duration) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        let config = fixtures::test_config(&root);

        std::fs::create_dir_all(&config.file_server.root).unwrap();
        std::fs::create_dir_all(config.services.gfpgan.root()).unwrap();
        std::fs::create_dir_all(config.services.rembg.root()).unwrap();

        let script = root.join("fake-conda.sh");
        let body = FAKE_CONDA
            .replace("__CALLS__", &root.join("calls.log").display().to_string())
            .replace("__PHOTO_DELAY__", &format!("{:.3}", delay.as_secs_f64()));
        std::fs::write(&script, body).unwrap();

        let tasks = Arc::new(SqliteTaskStore::new(&config.database.path).unwrap());
        let queue = Arc::new(SqliteJobQueue::new(&config.database.path).unwrap());
        let lock = Arc::new(SqliteTaskLock::new(&config.database.path).unwrap());
        let notifier = RecordingNotifier::new();
        let invoker = Arc::new(CondaWorkerInvoker::new(
            fixtures::script_runtime(&script),
            config.services.clone(),
            config.photo.worker_timeout(),
        ));

        let tickets = Arc::new(TicketProcessor::new(
            tasks.clone(),
            invoker.clone(),
            FileTransfer::new(config.transfer.clone()),
            config.file_server.clone(),
            config.services.clone(),
        ));
        let photos = Arc::new(PhotoProcessor::new(
            PhotoProcessorDeps {
                invoker,
                lock,
                fetcher: SourceFetcher::new(&config.photo).unwrap(),
                results: Arc::new(FsResultStore::new(&config.storage, config.transfer.clone())),
                notifier: Arc::new(notifier.clone()),
                transfer: FileTransfer::new(config.transfer.clone()),
            },
            config.services.clone(),
            config.photo.lock_ttl(),
        ));

        let worker = QueueWorker::new(
            queue.clone(),
            Arc::new(NaiadeJobHandler::new(tickets, photos.clone())),
            config.queues.all(),
            Duration::from_millis(20),
        );

        Self {
            scheduler: QueueScheduler::new(queue.clone(), config.queues.ticket_queue.clone()),
            dispatcher: PhotoDispatcher::new(queue.clone(), config.queues.photo_queues.clone()),
            _temp: temp,
            root,
            config,
            tasks,
            queue,
            notifier,
            photos,
            worker,
        }
    }

    pub fn ticket_dir(&self, ticket: &str) -> PathBuf {
        self.config.file_server.ticket_dir(ticket)
    }

    pub fn queue_len(&self, queue: &str) -> u64 {
        self.queue.count(queue).unwrap()
    }

    /// Lines the fake worker logged, one per invocation.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.root.join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
