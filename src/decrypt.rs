//! allcrypt 解密流程实现
//!
//! 解密流程（严格顺序）：
//! 1. Initializing：读取恰好 44 字节并解析 Header，用其中的 salt + 密码派生密钥
//! 2. Iterating：从偏移 44 开始，每次读取最多 `2^chunk_exp + tag` 字节并解密；
//!    最后一次读取可以更短
//! 3. Trimming：累计输出超过 `original_size` 的部分在写入前截掉，
//!    最终长度只以 Header 中的 `original_size` 为准
//!
//! 注意：
//! - 任一 chunk 认证失败都立即终止任务，不输出未校验的明文
//! - 容器在产出 `original_size` 字节之前结束，视为被截断（认证失败）
//! - 截断点之后的 chunk 仍然逐个认证，只是明文被丢弃
//!
//! 残余风险：Header 没有作为 AAD 绑定进任何 chunk（与既有容器保持兼容），
//! 改小 `original_size` 的容器仍能解密成功，只是输出被静默截短。
//! 需要完整性保证的调用方应当自行核对输出长度。

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{CipherEngine, NonceSequence};
use crate::error::{AllcryptError, Result};
use crate::format::header::Header;
use crate::format::stream::{ChunkLayout, read_window};
use crate::hygiene::{Password, SecretBytes};
use crate::job::{Job, JobPhase, ProgressFn};
use crate::sink::{MemorySink, OutputSink, SinkOutput};

pub(crate) fn run<E, R, S>(
    engine: &E,
    job: &mut Job,
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

    let mut header = Header::read(&mut reader)?;
    let engine = engine.for_cipher(header.algorithm);
    let layout = ChunkLayout::new(header.chunk_exp, engine.tag_size());
    let original_size = header.original_size;
    job.set_total(original_size);

    let password = job.take_password()?;
    let derived = engine.derive_key(password.as_bytes(), &header.salt);
    drop(password);
    let base_nonce = Zeroizing::new(header.base_nonce);
    header.zeroize();
    let key = derived?;

    job.enter(JobPhase::Iterating);

    let mut window = Zeroizing::new(vec![0u8; layout.encrypted_chunk_len()]);
    let mut nonces = NonceSequence::new();
    let mut produced = 0u64;

    loop {
        let got = read_window(&mut reader, &mut window)?;
        if got == 0 {
            break;
        }

        let chunk_index = nonces.advance()?;
        let opened = engine.decrypt_chunk(&key, &base_nonce, chunk_index, &window[..got]);
        window[..got].zeroize();
        let mut plaintext = opened?;

        // 超出 original_size 的部分先清零再截断
        let remaining = original_size - produced;
        if plaintext.len() as u64 > remaining {
            let keep = remaining as usize;
            plaintext[keep..].zeroize();
            plaintext.truncate(keep);
        }

        produced += plaintext.len() as u64;
        if !plaintext.is_empty() {
            sink.write(plaintext)?;
        }

        job.report(produced, on_progress)?;
    }

    if produced < original_size {
        let missing = u32::try_from(nonces.issued()).unwrap_or(u32::MAX);
        return Err(AllcryptError::Authentication {
            chunk_index: missing,
        });
    }

    Ok(())
}

/// 在内存中解密一段容器字节
pub fn decrypt_bytes<E: CipherEngine>(
    engine: &E,
    password: Password,
    container: &[u8],
) -> Result<SecretBytes> {
    let job = Job::decrypt(password);

    match job.run(engine, container, MemorySink::new(), &mut |_| Ok(()))? {
        SinkOutput::Memory(bytes) => Ok(bytes),
        SinkOutput::Persistent { .. } => Err(AllcryptError::Engine(
            "memory sink produced a persistent output".into(),
        )),
    }
}

/// 使用密码解密文件，输出经临时文件原子写入
pub fn decrypt_file<E: CipherEngine>(
    engine: &E,
    input_path: &Path,
    output_path: &Path,
    password: Password,
) -> Result<u64> {
    let input = File::open(input_path)?;
    let sink = crate::persistent_sink_for(output_path)?;

    let job = Job::decrypt(password);
    let output = job.run(engine, BufReader::new(input), sink, &mut |_| Ok(()))?;

    Ok(output.len())
}
