//! 日志系统：控制台 + 文件双通道，退出时归档为 zip。

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{io, panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024; // 10MB
const ARCHIVE_WAIT_MS: u64 = 300;
const LATEST_LOG: &str = "latest.log";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("time formatting failed: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, Copy, Debug)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    pub archive_on_exit: bool,
    pub console: bool,
}

impl LogOptions {
    /// 命令行：`--quiet` 时控制台静默，文件日志照常写入。
    pub fn for_cli(debug: bool, quiet: bool) -> Self {
        Self {
            debug,
            console: !quiet,
            ..Self::default()
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            use_color: true,
            archive_on_exit: true,
            console: true,
        }
    }
}

/// `<base>/logs/latest.log` 及其 zip 归档。
#[derive(Debug, Clone)]
struct LogFiles {
    dir: PathBuf,
    latest: PathBuf,
}

impl LogFiles {
    fn under(base_dir: Option<&Path>) -> Self {
        let dir = base_dir
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let latest = dir.join(LATEST_LOG);
        Self { dir, latest }
    }

    /// 上次运行留下的大日志先归档，避免单个文件无限增长。
    fn rotate_if_large(&self) -> Result<(), LogError> {
        if let Ok(meta) = fs::metadata(&self.latest)
            && meta.len() >= MAX_LOG_BYTES
        {
            self.archive()?;
        }
        Ok(())
    }

    /// 空日志直接删除；否则压缩为 `log_<时间戳>.zip` 并删除原文件。
    fn archive(&self) -> Result<Option<PathBuf>, LogError> {
        let Ok(meta) = fs::metadata(&self.latest) else {
            return Ok(None);
        };
        if meta.len() == 0 {
            let _ = fs::remove_file(&self.latest);
            return Ok(None);
        }

        let timestamp = OffsetDateTime::now_utc().format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))?;
        let archive_path = self.dir.join(format!("log_{timestamp}.zip"));

        let mut zip = zip::ZipWriter::new(File::create(&archive_path)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(format!("{timestamp}.log"), options)?;
        {
            let mut source = File::open(&self.latest)?;
            io::copy(&mut source, &mut zip)?;
        }
        zip.finish()?;
        let _ = fs::remove_file(&self.latest);

        info!("log archived to {}", archive_path.display());
        Ok(Some(archive_path))
    }
}

/// 持有文件写入线程；drop 时刷新并按需归档。
pub struct LogSystem {
    runtime: Arc<LogRuntime>,
}

impl LogSystem {
    /// `base_dir` 为空时日志写入当前目录下的 `logs/`。
    pub fn init_with_base(options: LogOptions, base_dir: Option<&Path>) -> Result<Self, LogError> {
        let files = LogFiles::under(base_dir);
        fs::create_dir_all(&files.dir)?;
        files.rotate_if_large()?;

        let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(&files.dir, LATEST_LOG));

        let console_writer = if options.console {
            BoxMakeWriter::new(io::stderr)
        } else {
            BoxMakeWriter::new(io::sink)
        };
        let console_layer = fmt::layer()
            .with_target(false)
            .with_ansi(options.use_color)
            .with_writer(console_writer)
            .with_filter(if options.debug {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            });

        // 文件里保留 target（session / navigate / download ...）便于排查是哪一跳出错
        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                if e.to_string().contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let runtime = Arc::new(LogRuntime {
            files,
            guard: Mutex::new(Some(guard)),
            exit_called: AtomicBool::new(false),
            archive_on_exit: options.archive_on_exit,
        });
        runtime.install_signal_handler();
        runtime.install_panic_hook();

        Ok(Self { runtime })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.runtime.shutdown();
    }
}

struct LogRuntime {
    files: LogFiles,
    guard: Mutex<Option<WorkerGuard>>,
    exit_called: AtomicBool,
    archive_on_exit: bool,
}

impl LogRuntime {
    fn install_signal_handler(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        // Ctrl-C 中断下载时仍需刷新并归档日志；部分文件留在磁盘上，可用 --resume 续传
        let _ = ctrlc::set_handler(move || {
            runtime.shutdown();
            std::process::exit(130);
        });
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            match info.location() {
                Some(at) => error!("panic at {}:{}: {}", at.file(), at.line(), info),
                None => error!("panic: {info}"),
            }
            runtime.shutdown();
            previous(info);
        }));
    }

    /// 只执行一次：先放掉写入线程的 guard 让缓冲落盘，再归档。
    fn shutdown(&self) {
        if self.exit_called.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        if self.archive_on_exit {
            thread::sleep(Duration::from_millis(ARCHIVE_WAIT_MS));
            if let Err(err) = self.files.archive() {
                eprintln!("failed to archive log: {err}");
            }
        }
    }
}
