//! 任务执行器
//!
//! 执行器运行在独立线程中，只通过消息与调用方通信：
//! - 控制线程按顺序处理请求，维护 `ready` 与当前任务（最多一个）
//! - 每个任务在单独的工作线程中执行，进度直接发往应答通道
//! - 任务结束后由控制线程先清除当前任务，再发出 `Done*` / `Error`，
//!   因此调用方收到结果后可以立即开始下一个任务
//!
//! 没有取消消息。销毁 `ExecutorHandle` 是唯一的中止方式：
//! 应答通道关闭后，正在运行的任务会在下一次报告进度时中止并删除未完成的输出。

use std::fs::File;
use std::io::BufReader;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::AeadEngine;
use crate::error::{AllcryptError, Result};
use crate::fs::atomic::unique_name;
use crate::hygiene::{Password, SecretBytes};
use crate::job::{Job, JobKind, Progress};
use crate::protocol::{JobInput, Request, Response};
use crate::sink::{
    AnySink, FsStore, MemorySink, PersistentSink, PersistentStore, SinkMode, SinkOutput,
};

enum Inbound {
    Request(Request),
    Finished(Result<SinkOutput>),
    Shutdown,
}

/// 从请求中取出的任务参数
struct JobRequest {
    kind: JobKind,
    password: Password,
    input: JobInput,
    sink_mode: SinkMode,
    sink_name: String,
}

struct CurrentJob {
    sink_name: String,
    worker: JoinHandle<()>,
}

/// 最近一次结果的摘要；结果本身已经转交给调用方
struct ResultSummary {
    persistent: Option<String>,
    size: u64,
}

struct ControlLoop {
    config: Config,
    store: FsStore,
    inbound: Sender<Inbound>,
    responses: Sender<Response>,
    ready: bool,
    current: Option<CurrentJob>,
    last: Option<ResultSummary>,
}

impl ControlLoop {
    fn run(mut self, inbound: Receiver<Inbound>) {
        while let Ok(message) = inbound.recv() {
            match message {
                Inbound::Request(request) => self.handle(request),
                Inbound::Finished(outcome) => self.finish(outcome),
                Inbound::Shutdown => break,
            }
        }

        if let Some(job) = self.current.take() {
            debug!("waiting for running job to stop");
            let _ = job.worker.join();
        }
        info!("executor stopped");
    }

    fn respond(&self, response: Response) {
        if self.responses.send(response).is_err() {
            debug!("caller disconnected, response dropped");
        }
    }

    fn reject(&self, err: AllcryptError) {
        self.respond(Response::error(err.to_string()));
    }

    fn handle(&mut self, request: Request) {
        debug!(?request, "request");

        match request {
            Request::Initialize => {
                if !self.ready {
                    self.ready = true;
                    info!(dir = %self.store.root().display(), "executor ready");
                }
                self.respond(Response::Ready);
            }
            Request::RunEncrypt {
                password,
                input,
                chunk_exp,
                sink_mode,
                sink_name,
            } => {
                let kind = JobKind::Encrypt {
                    chunk_exp: chunk_exp.unwrap_or(self.config.chunk_exp),
                };
                let sink_name = sink_name.unwrap_or_else(|| unique_name("allcrypt", "acry"));
                self.start(JobRequest {
                    kind,
                    password,
                    input,
                    sink_mode,
                    sink_name,
                });
            }
            Request::RunDecrypt {
                password,
                input,
                sink_mode,
                sink_name,
            } => {
                let sink_name = sink_name.unwrap_or_else(|| unique_name("allcrypt", "bin"));
                self.start(JobRequest {
                    kind: JobKind::Decrypt,
                    password,
                    input,
                    sink_mode,
                    sink_name,
                });
            }
            Request::ClearResult => {
                if self.current.is_some() {
                    return self.reject(AllcryptError::JobInProgress);
                }
                if let Some(last) = self.last.take() {
                    debug!(sink = ?last.persistent, size = last.size, "cleared last result");
                }
                self.respond(Response::Cleared);
            }
            Request::CleanupPersistent { sink_id } => {
                let busy = self
                    .current
                    .as_ref()
                    .is_some_and(|job| job.sink_name == sink_id);
                if busy {
                    return self.reject(AllcryptError::JobInProgress);
                }

                match self.store.remove(&sink_id) {
                    Ok(()) => {
                        let forgotten = self
                            .last
                            .as_ref()
                            .is_some_and(|last| last.persistent.as_deref() == Some(sink_id.as_str()));
                        if forgotten {
                            self.last = None;
                        }
                        self.respond(Response::CleanedPersistent { sink_id });
                    }
                    Err(e) => self.reject(AllcryptError::sink(e)),
                }
            }
        }
    }

    fn start(&mut self, request: JobRequest) {
        if !self.ready {
            return self.reject(AllcryptError::NotInitialized);
        }
        if self.current.is_some() {
            return self.reject(AllcryptError::JobInProgress);
        }

        let sink_name = request.sink_name.clone();
        let config = self.config.clone();
        let store = self.store.clone();
        let inbound = self.inbound.clone();
        let responses = self.responses.clone();

        let spawned = thread::Builder::new()
            .name("allcrypt-job".into())
            .spawn(move || {
                let outcome = guarded(|| execute(request, &config, store, &responses));
                let _ = inbound.send(Inbound::Finished(outcome));
            });

        match spawned {
            Ok(worker) => self.current = Some(CurrentJob { sink_name, worker }),
            Err(e) => self.reject(AllcryptError::Engine(format!("failed to start job: {e}"))),
        }
    }

    fn finish(&mut self, outcome: Result<SinkOutput>) {
        if let Some(job) = self.current.take() {
            let _ = job.worker.join();
        }

        let response = match outcome {
            Ok(SinkOutput::Memory(mut bytes)) => {
                self.last = Some(ResultSummary {
                    persistent: None,
                    size: bytes.len() as u64,
                });
                Response::Done {
                    bytes: std::mem::take(&mut *bytes),
                }
            }
            Ok(SinkOutput::Persistent { sink_id, size }) => {
                self.last = Some(ResultSummary {
                    persistent: Some(sink_id.clone()),
                    size,
                });
                Response::DonePersistent { sink_id, size }
            }
            Err(err) => Response::error(err.to_string()),
        };

        self.respond(response);
    }
}

/// 把任务中的 panic 转成普通错误，保证控制线程总能收到 `Finished`
fn guarded(job: impl FnOnce() -> Result<SinkOutput>) -> Result<SinkOutput> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        error!(%reason, "job panicked");
        Err(AllcryptError::Engine(format!("job panicked: {reason}")))
    })
}

/// 在工作线程中执行一个任务
fn execute(
    request: JobRequest,
    config: &Config,
    store: FsStore,
    responses: &Sender<Response>,
) -> Result<SinkOutput> {
    let JobRequest {
        kind,
        password,
        input,
        sink_mode,
        sink_name,
    } = request;

    let mut on_progress = |progress: Progress| {
        responses
            .send(Response::Progress {
                processed: progress.processed,
                total: progress.total,
            })
            .map_err(|_| AllcryptError::Aborted("caller disconnected".into()))
    };

    let target = SinkTarget {
        mode: sink_mode,
        name: sink_name,
        store,
        threshold: config.persistent_threshold,
    };
    let engine = AeadEngine::new(config.algorithm);

    match input {
        JobInput::Path(path) => {
            let file = File::open(&path)?;
            let len = file.metadata()?.len();
            let job = new_job(kind, password, len);
            job.run(&engine, BufReader::new(file), target.open(len)?, &mut on_progress)
        }
        JobInput::Bytes(bytes) => {
            let bytes: SecretBytes = Zeroizing::new(bytes);
            let len = bytes.len() as u64;
            let job = new_job(kind, password, len);
            job.run(&engine, &bytes[..], target.open(len)?, &mut on_progress)
        }
    }
}

fn new_job(kind: JobKind, password: Password, input_len: u64) -> Job {
    match kind {
        JobKind::Encrypt { chunk_exp } => Job::encrypt(password, input_len, chunk_exp),
        JobKind::Decrypt => Job::decrypt(password),
    }
}

struct SinkTarget {
    mode: SinkMode,
    name: String,
    store: FsStore,
    threshold: u64,
}

impl SinkTarget {
    fn open(self, input_len: u64) -> Result<AnySink<FsStore>> {
        if self.mode.use_persistent(input_len, self.threshold) {
            Ok(AnySink::Persistent(PersistentSink::create(self.store, self.name)?))
        } else {
            Ok(AnySink::Memory(MemorySink::new()))
        }
    }
}

/// 调用方持有的执行器句柄
///
/// Drop 时通知执行器退出并等待其结束。
pub struct ExecutorHandle {
    requests: Option<Sender<Inbound>>,
    responses: Option<Receiver<Response>>,
    control: Option<JoinHandle<()>>,
}

/// 调用方拿到的任务结果，内存结果在 drop 时清零
pub enum JobResult {
    Memory(SecretBytes),
    Persistent { sink_id: String, size: u64 },
}

impl ExecutorHandle {
    /// 启动执行器线程
    pub fn spawn(config: Config) -> Result<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let (responses_tx, responses_rx) = mpsc::channel();

        let control = ControlLoop {
            store: FsStore::new(&config.persistent_dir),
            config,
            inbound: inbound_tx.clone(),
            responses: responses_tx,
            ready: false,
            current: None,
            last: None,
        };

        let thread = thread::Builder::new()
            .name("allcrypt-executor".into())
            .spawn(move || control.run(inbound_rx))
            .map_err(|e| AllcryptError::Engine(format!("failed to start executor: {e}")))?;

        Ok(Self {
            requests: Some(inbound_tx),
            responses: Some(responses_rx),
            control: Some(thread),
        })
    }

    pub fn send(&self, request: Request) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or_else(stopped)?
            .send(Inbound::Request(request))
            .map_err(|_| stopped())
    }

    /// 阻塞等待下一条应答；执行器已退出时返回 `None`
    pub fn recv(&self) -> Option<Response> {
        self.responses.as_ref()?.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Response> {
        match self.responses.as_ref()?.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// 发送请求并等待最终应答，期间的进度交给 `on_progress`
    pub fn request(
        &self,
        request: Request,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<Response> {
        self.send(request)?;

        loop {
            match self.recv().ok_or_else(stopped)? {
                Response::Progress { processed, total } => {
                    on_progress(Progress { processed, total })
                }
                response => return Ok(response),
            }
        }
    }

    /// 发送 Initialize 并等待 Ready
    pub fn initialize(&self) -> Result<()> {
        match self.request(Request::Initialize, |_| {})? {
            Response::Ready => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// 运行一个任务直到 `Done*` 或 `Error`
    pub fn run(&self, request: Request, on_progress: impl FnMut(Progress)) -> Result<JobResult> {
        match self.request(request, on_progress)? {
            Response::Done { bytes } => Ok(JobResult::Memory(Zeroizing::new(bytes))),
            Response::DonePersistent { sink_id, size } => Ok(JobResult::Persistent { sink_id, size }),
            Response::Error { message } => Err(AllcryptError::Executor(message)),
            other => Err(unexpected(&other)),
        }
    }

    pub fn clear_result(&self) -> Result<()> {
        match self.request(Request::ClearResult, |_| {})? {
            Response::Cleared => Ok(()),
            Response::Error { message } => Err(AllcryptError::Executor(message)),
            other => Err(unexpected(&other)),
        }
    }

    pub fn cleanup_persistent(&self, sink_id: impl Into<String>) -> Result<()> {
        let sink_id = sink_id.into();
        match self.request(Request::CleanupPersistent { sink_id }, |_| {})? {
            Response::CleanedPersistent { .. } => Ok(()),
            Response::Error { message } => Err(AllcryptError::Executor(message)),
            other => Err(unexpected(&other)),
        }
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        if let Some(requests) = self.requests.take() {
            let _ = requests.send(Inbound::Shutdown);
        }
        // 先关闭应答通道，运行中的任务会在下一次报告进度时中止
        self.responses.take();

        if let Some(control) = self.control.take() {
            if control.join().is_err() {
                warn!("executor thread panicked");
            }
        }
    }
}

fn stopped() -> AllcryptError {
    AllcryptError::Aborted("executor stopped".into())
}

fn unexpected(response: &Response) -> AllcryptError {
    AllcryptError::Executor(format!("unexpected response {response:?}"))
}
