//! allcrypt 命令行入口
//!
//! 用法：
//!   allcrypt encrypt <input> <output> [--algorithm chacha20-poly1305] [--chunk-exp 16]
//!   allcrypt decrypt <input> <output>
//!   allcrypt inspect <container>
//!   allcrypt serve
//!
//! 加解密都经过执行器，输出以持久化方式写到目标路径。
//! `serve` 在 stdin / stdout 上逐行收发 JSON 协议消息。

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zeroize::Zeroizing;

use allcrypt::{
    AeadAlgorithm, Config, ExecutorHandle, FsStore, Header, JobInput, JobResult, Password, Progress,
    Request, Response, SinkMode,
};

#[derive(Parser)]
#[command(name = "allcrypt", version, about = "Chunked AEAD file encryption")]
struct Cli {
    /// TOML 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别（被 RUST_LOG 覆盖）
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 加密文件
    Encrypt {
        input: PathBuf,
        output: PathBuf,
        /// 不提供时交互式输入（需要输入两次）
        #[arg(long)]
        password: Option<String>,
        #[arg(long, value_enum)]
        algorithm: Option<AeadAlgorithm>,
        /// chunk 大小为 2^chunk_exp 字节
        #[arg(long)]
        chunk_exp: Option<u8>,
    },
    /// 解密文件
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },
    /// 打印容器 Header
    Inspect { input: PathBuf },
    /// 以 JSON lines 在 stdio 上提供执行器协议
    Serve,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Encrypt {
            input,
            output,
            password,
            algorithm,
            chunk_exp,
        } => {
            if let Some(algorithm) = algorithm {
                config.algorithm = algorithm;
            }
            let password = read_password(password, true)?;
            let (store_dir, sink_name) = split_output(&output)?;
            config.persistent_dir = store_dir;

            let request = Request::RunEncrypt {
                password,
                input: JobInput::Path(input),
                chunk_exp,
                sink_mode: SinkMode::Persistent,
                sink_name: Some(sink_name),
            };
            let size = run_job(config, request)?;
            eprintln!("wrote {size} bytes to {}", output.display());
        }
        Command::Decrypt {
            input,
            output,
            password,
        } => {
            let password = read_password(password, false)?;
            let (store_dir, sink_name) = split_output(&output)?;
            config.persistent_dir = store_dir;

            let request = Request::RunDecrypt {
                password,
                input: JobInput::Path(input),
                sink_mode: SinkMode::Persistent,
                sink_name: Some(sink_name),
            };
            let size = run_job(config, request)?;
            eprintln!("wrote {size} bytes to {}", output.display());
        }
        Command::Inspect { input } => {
            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let header = Header::read(file)?;
            print_header(&header);
        }
        Command::Serve => serve(config)?,
    }

    Ok(())
}

/// 输出路径拆成（存储目录，资源名）
fn split_output(output: &Path) -> anyhow::Result<(PathBuf, String)> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(name) = output.file_name().and_then(|name| name.to_str()) else {
        bail!("output path {} has no usable file name", output.display());
    };
    Ok((dir, name.to_owned()))
}

fn read_password(given: Option<String>, confirm: bool) -> anyhow::Result<Password> {
    if let Some(password) = given {
        return Ok(Password::new(password));
    }

    let password = Password::new(rpassword::prompt_password("Password: ")?);
    if password.is_empty() {
        bail!("password must not be empty");
    }

    if confirm {
        let again = Password::new(rpassword::prompt_password("Confirm password: ")?);
        if again.as_bytes() != password.as_bytes() {
            bail!("passwords do not match");
        }
    }

    Ok(password)
}

fn run_job(config: Config, request: Request) -> anyhow::Result<u64> {
    let executor = ExecutorHandle::spawn(config)?;
    executor.initialize()?;

    let mut last_percent = None;
    let result = executor.run(request, |Progress { processed, total }| {
        let percent = processed.saturating_mul(100).checked_div(total).unwrap_or(100);
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            eprint!("\r{percent:>3}%");
        }
    });
    if last_percent.is_some() {
        eprintln!();
    }

    match result? {
        JobResult::Persistent { sink_id, size } => {
            debug!(sink_id = %sink_id, size, "job output");
            Ok(size)
        }
        JobResult::Memory(bytes) => Ok(bytes.len() as u64),
    }
}

fn print_header(header: &Header) {
    println!("version:       {}", header.version);
    println!("kdf:           argon2id ({:#04x})", header.kdf);
    println!("algorithm:     {}", header.algorithm.name());
    println!(
        "chunk size:    {} bytes (2^{})",
        header.chunk_size(),
        header.chunk_exp
    );
    println!("original size: {} bytes", header.original_size);
    println!("salt:          {}", hex(&header.salt));
    println!("base nonce:    {}", hex(&header.base_nonce));
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// 每行一个请求；每个请求的应答逐条输出，直到最终应答
fn serve(config: Config) -> anyhow::Result<()> {
    // 上次异常退出遗留的未完成输出
    FsStore::new(&config.persistent_dir)
        .purge_partials()
        .with_context(|| format!("cleaning {}", config.persistent_dir.display()))?;

    let executor = ExecutorHandle::spawn(config)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        // 请求行里带着密码
        let line = Zeroizing::new(line?);
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                emit(&mut stdout, &Response::error(format!("invalid request: {e}")))?;
                continue;
            }
        };

        executor.send(request)?;
        loop {
            let Some(response) = executor.recv() else {
                bail!("executor stopped");
            };
            emit(&mut stdout, &response)?;
            if response.is_terminal() {
                break;
            }
        }
    }

    Ok(())
}

fn emit(out: &mut impl Write, response: &Response) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, response)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
