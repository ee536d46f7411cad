//! 可续传的分块下载。
//!
//! 状态：Fresh → Transferring → Complete；Resuming → Transferring → Complete，
//! 或 Resuming → AlreadyComplete。续传用的 Range 头由守卫持有，
//! 在本次调用的任何出口都会从共享会话上移除。

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, info};
use url::Url;

use super::models::{DownloadCandidate, ProgressCallback, SaveOutcome, TransferState};
use super::navigate::NavigationChain;
use super::progress::ProgressReporter;
use crate::base_system::context::safe_fs_name;
use crate::error::{FzError, Result};
use crate::network_parser::session::Session;

pub const DEFAULT_CHUNK_KB: usize = 512;

pub struct SaveOptions {
    pub dir: PathBuf,
    pub filename: String,
    /// 以 KB（1000 字节）计。
    pub chunk_size_kb: usize,
    pub resume: bool,
    pub progress_bar: bool,
    pub progress: Option<ProgressCallback>,
}

impl SaveOptions {
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
            chunk_size_kb: DEFAULT_CHUNK_KB,
            resume: false,
            progress_bar: false,
            progress: None,
        }
    }

    pub fn chunk_size_kb(mut self, kb: usize) -> Self {
        self.chunk_size_kb = kb;
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn progress_bar(mut self, show: bool) -> Self {
        self.progress_bar = show;
        self
    }

    pub fn on_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn target_path(&self) -> PathBuf {
        self.dir.join(safe_fs_name(&self.filename, "_", 200))
    }

    fn chunk_bytes(&self) -> usize {
        self.chunk_size_kb.max(1) * 1000
    }
}

pub struct Download {
    chain: NavigationChain,
    candidate: DownloadCandidate,
}

impl Download {
    pub fn new(session: Session, candidate: DownloadCandidate) -> Self {
        Self {
            chain: NavigationChain::new(session),
            candidate,
        }
    }

    pub fn candidate(&self) -> &DownloadCandidate {
        &self.candidate
    }

    pub fn final_url(&self) -> Result<Url> {
        self.chain.final_url(&self.candidate)
    }

    pub fn save(&self, options: SaveOptions) -> Result<SaveOutcome> {
        let url = self.final_url()?;
        transfer(self.chain.session(), &url, options)
    }
}

/// 把 `url` 流式写到 `options.target_path()`。
pub fn transfer(session: &Session, url: &Url, options: SaveOptions) -> Result<SaveOutcome> {
    let path = options.target_path();
    let chunk_size = options.chunk_bytes();

    let offset = if options.resume {
        fs::metadata(&path)
            .map_err(|_| FzError::ResumeTargetMissing(path.clone()))?
            .len()
    } else {
        0
    };

    let _range = options.resume.then(|| session.set_range(offset));
    info!(
        target: "download",
        path = %path.display(),
        resume = options.resume,
        offset,
        "开始下载"
    );
    let mut resp = session.get_stream(url)?;
    let status = resp.status();

    if options.resume && status == StatusCode::RANGE_NOT_SATISFIABLE {
        info!(target: "download", path = %path.display(), "文件已完整，无需续传");
        return Ok(SaveOutcome::AlreadyComplete(path));
    }
    resp.error_for_status_ref()?;

    let length = resp
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let mut resuming = options.resume;
    if resuming {
        if length == 0 {
            info!(target: "download", path = %path.display(), "文件已完整，无需续传");
            return Ok(SaveOutcome::AlreadyComplete(path));
        }
        if status != StatusCode::PARTIAL_CONTENT {
            // 服务器忽略了 Range，返回的是完整文件
            if length == offset {
                info!(target: "download", path = %path.display(), "文件已完整，无需续传");
                return Ok(SaveOutcome::AlreadyComplete(path));
            }
            debug!(target: "download", status = status.as_u16(), "服务器不支持续传，重新下载");
            resuming = false;
        }
    } else if length == 0 {
        return Err(FzError::MissingContentLength);
    }

    let state = TransferState {
        target_path: path,
        bytes_on_disk: if resuming { offset } else { 0 },
        total_size: if resuming { offset + length } else { length },
        chunk_size,
    };
    write_body(&mut resp, &state, options)?;
    Ok(SaveOutcome::Saved(state.target_path))
}

fn write_body(body: &mut impl Read, state: &TransferState, options: SaveOptions) -> Result<()> {
    if let Some(parent) = state.target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = open_target(&state.target_path, state.is_resuming())?;

    let label = state
        .target_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut reporter = ProgressReporter::new(
        &label,
        state.bytes_on_disk,
        state.total_size,
        options.progress,
        options.progress_bar,
    );

    let mut buf = vec![0u8; state.chunk_size];
    let mut written = 0u64;
    loop {
        let n = body.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        written += n as u64;
        reporter.advance(n as u64);
    }
    file.flush()?;
    reporter.finish();

    info!(
        target: "download",
        path = %state.target_path.display(),
        written,
        total = state.total_size,
        "下载完成"
    );
    Ok(())
}

fn open_target(path: &Path, append: bool) -> Result<fs::File> {
    let mut opts = OpenOptions::new();
    if append {
        opts.append(true);
    } else {
        opts.write(true).create(true).truncate(true);
    }
    Ok(opts.open(path)?)
}
