//! allcrypt 加密流程实现
//!
//! 加密流程（严格顺序）：
//! 1. Initializing：调用 `init_encrypt` 生成 salt / base_nonce 并派生密钥，Header 作为第一次写入
//! 2. Iterating：按 chunk 读取明文、加密、写入输出端，清零明文窗口，报告进度
//! 3. 结束时密钥与 nonce 随作用域清零，由 `Job::run` 关闭输出端
//!
//! 空输入只产生 44 字节的 Header，没有任何 chunk。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{CipherEngine, EncryptInit, NonceSequence};
use crate::error::{AllcryptError, Result};
use crate::format::header::validate_chunk_exp;
use crate::format::stream::{ChunkLayout, read_window};
use crate::hygiene::{Password, SecretBytes};
use crate::job::{Job, JobPhase, ProgressFn};
use crate::sink::{MemorySink, OutputSink, SinkOutput};

pub(crate) fn run<E, R, S>(
    engine: &E,
    job: &mut Job,
    chunk_exp: u8,
    mut reader: R,
    sink: &mut S,
    on_progress: &mut ProgressFn<'_>,
) -> Result<()>
where
    E: CipherEngine,
    R: Read,
    S: OutputSink,
{
    job.enter(JobPhase::Initializing);

    validate_chunk_exp(chunk_exp).map_err(AllcryptError::Engine)?;
    let layout = ChunkLayout::new(chunk_exp, engine.tag_size());
    let total = job.total();

    // chunk_index 是 u32，提前拒绝会耗尽序号空间的输入
    if layout.chunk_count(total) > u64::from(u32::MAX) + 1 {
        return Err(AllcryptError::Engine(format!(
            "input of {total} bytes needs more than 2^32 chunks at chunk_exp {chunk_exp}"
        )));
    }

    let password = job.take_password()?;
    let EncryptInit {
        key,
        base_nonce,
        mut header,
        mut header_bytes,
    } = engine.init_encrypt(password.as_bytes(), total, chunk_exp)?;
    drop(password);

    // Header 中的 salt / base_nonce 副本写出后即清零
    header.zeroize();
    let written = sink.write(header_bytes.to_vec());
    header_bytes.zeroize();
    written?;

    job.enter(JobPhase::Iterating);

    let chunk_size = layout.chunk_size();
    let window_len = usize::try_from(total).map_or(chunk_size, |t| t.min(chunk_size));
    let mut window = Zeroizing::new(vec![0u8; window_len]);

    let mut nonces = NonceSequence::new();
    let mut processed = 0u64;

    while processed < total {
        let want = (total - processed).min(chunk_size as u64) as usize;
        let plaintext = &mut window[..want];

        let got = read_window(&mut reader, plaintext)?;
        if got < want {
            plaintext.zeroize();
            return Err(AllcryptError::Input(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input ended at {} of {total} bytes", processed + got as u64),
            )));
        }

        let chunk_index = nonces.advance()?;
        let sealed = engine.encrypt_chunk(&key, &base_nonce, chunk_index, plaintext);
        plaintext.zeroize();

        sink.write(sealed?)?;

        processed += want as u64;
        job.report(processed, on_progress)?;
    }

    // key / base_nonce / window 在此 drop 并清零
    Ok(())
}

/// 在内存中加密一段字节
pub fn encrypt_bytes<E: CipherEngine>(
    engine: &E,
    password: Password,
    plaintext: &[u8],
    chunk_exp: u8,
) -> Result<SecretBytes> {
    let job = Job::encrypt(password, plaintext.len() as u64, chunk_exp);

    match job.run(engine, plaintext, MemorySink::new(), &mut |_| Ok(()))? {
        SinkOutput::Memory(bytes) => Ok(bytes),
        SinkOutput::Persistent { .. } => Err(AllcryptError::Engine(
            "memory sink produced a persistent output".into(),
        )),
    }
}

/// 使用密码加密文件，输出经临时文件原子写入
pub fn encrypt_file<E: CipherEngine>(
    engine: &E,
    input_path: &Path,
    output_path: &Path,
    password: Password,
    chunk_exp: u8,
) -> Result<u64> {
    let input = File::open(input_path)?;
    let total = input.metadata()?.len();

    let sink = crate::persistent_sink_for(output_path)?;

    let job = Job::encrypt(password, total, chunk_exp);
    let output = job.run(engine, BufReader::new(input), sink, &mut |_| Ok(()))?;

    Ok(output.len())
}
