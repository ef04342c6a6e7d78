use std::fs;
use std::path::Path;

use allcrypt::{
    Config, ExecutorHandle, JobInput, JobResult, Password, Progress, Request, Response, SinkMode,
};
use tempfile::tempdir;

fn config_in(dir: &Path) -> Config {
    Config {
        persistent_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

fn encrypt_request(bytes: &[u8], sink_mode: SinkMode, sink_name: Option<&str>) -> Request {
    Request::RunEncrypt {
        password: Password::new("password123"),
        input: JobInput::Bytes(bytes.to_vec()),
        chunk_exp: Some(2),
        sink_mode,
        sink_name: sink_name.map(str::to_owned),
    }
}

/// 收集应答直到出现 `count` 个最终应答
fn collect_until_terminal(executor: &ExecutorHandle, count: usize) -> Vec<Response> {
    let mut responses = Vec::new();
    let mut terminal = 0;
    while terminal < count {
        let response = executor.recv().expect("executor alive");
        if response.is_terminal() {
            terminal += 1;
        }
        responses.push(response);
    }
    responses
}

#[test]
fn run_before_initialize_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");

    executor
        .send(encrypt_request(b"data", SinkMode::Memory, None))
        .expect("send");
    assert_eq!(
        executor.recv().expect("response"),
        Response::error("not initialized")
    );

    executor.initialize().expect("initialize");
    // 重复初始化也只是回复 Ready
    executor.initialize().expect("initialize again");
}

#[test]
fn memory_roundtrip_reports_monotonic_progress() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");
    executor.initialize().expect("initialize");

    let mut events = Vec::new();
    let container = match executor
        .run(
            encrypt_request(b"INI FILE TEST", SinkMode::Memory, None),
            |progress| events.push(progress),
        )
        .expect("encrypt")
    {
        JobResult::Memory(bytes) => bytes,
        JobResult::Persistent { .. } => panic!("expected memory output"),
    };

    let processed: Vec<u64> = events.iter().map(|p| p.processed).collect();
    assert_eq!(processed, vec![4, 8, 12, 13]);
    assert!(events.iter().all(|p| p.total == 13));

    let mut events = Vec::new();
    let plaintext = match executor
        .run(
            Request::RunDecrypt {
                password: Password::new("password123"),
                input: JobInput::Bytes(container.to_vec()),
                sink_mode: SinkMode::Memory,
                sink_name: None,
            },
            |progress| events.push(progress),
        )
        .expect("decrypt")
    {
        JobResult::Memory(bytes) => bytes,
        JobResult::Persistent { .. } => panic!("expected memory output"),
    };

    assert_eq!(&plaintext[..], b"INI FILE TEST");
    assert_eq!(
        events.last(),
        Some(&Progress {
            processed: 13,
            total: 13
        })
    );
    assert!(events.windows(2).all(|w| w[0].processed <= w[1].processed));
}

#[test]
fn persistent_output_and_cleanup() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");
    executor.initialize().expect("initialize");

    let result = executor
        .run(
            encrypt_request(b"INI FILE TEST", SinkMode::Persistent, Some("ini.acry")),
            |_| {},
        )
        .expect("encrypt");

    let path = dir.path().join("ini.acry");
    match result {
        JobResult::Persistent { sink_id, size } => {
            assert_eq!(sink_id, "ini.acry");
            assert_eq!(size, 44 + 3 * 20 + 17);
            assert_eq!(fs::metadata(&path).expect("stat").len(), size);
        }
        JobResult::Memory(_) => panic!("expected persistent output"),
    }

    // 持久化的容器可以作为下一个任务的文件输入
    let plaintext = match executor
        .run(
            Request::RunDecrypt {
                password: Password::new("password123"),
                input: JobInput::Path(path.clone()),
                sink_mode: SinkMode::Auto,
                sink_name: None,
            },
            |_| {},
        )
        .expect("decrypt")
    {
        JobResult::Memory(bytes) => bytes,
        JobResult::Persistent { .. } => panic!("small input should stay in memory"),
    };
    assert_eq!(&plaintext[..], b"INI FILE TEST");

    executor.cleanup_persistent("ini.acry").expect("cleanup");
    assert!(!path.exists());

    // 资源已不存在
    assert!(executor.cleanup_persistent("ini.acry").is_err());
}

#[test]
fn auto_mode_switches_on_threshold() {
    let dir = tempdir().expect("create temp dir");
    let config = Config {
        persistent_threshold: 8,
        ..config_in(dir.path())
    };
    let executor = ExecutorHandle::spawn(config).expect("spawn");
    executor.initialize().expect("initialize");

    let small = executor
        .run(encrypt_request(b"tiny", SinkMode::Auto, None), |_| {})
        .expect("encrypt small");
    assert!(matches!(small, JobResult::Memory(_)));

    let large = executor
        .run(encrypt_request(b"INI FILE TEST", SinkMode::Auto, None), |_| {})
        .expect("encrypt large");
    match large {
        JobResult::Persistent { sink_id, .. } => {
            assert!(dir.path().join(&sink_id).exists());
            assert!(sink_id.ends_with(".acry"));
        }
        JobResult::Memory(_) => panic!("expected persistent output"),
    }
}

#[test]
fn failed_job_leaves_executor_ready() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");
    executor.initialize().expect("initialize");

    let err = executor
        .run(
            Request::RunDecrypt {
                password: Password::new("password123"),
                input: JobInput::Bytes(b"definitely not a container".to_vec()),
                sink_mode: SinkMode::Persistent,
                sink_name: Some("garbage.bin".into()),
            },
            |_| {},
        )
        .err()
        .expect("decrypt should fail");
    assert!(err.to_string().contains("malformed header"), "{err}");

    // 失败的持久化输出不会留下任何文件
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);

    let ok = executor.run(encrypt_request(b"again", SinkMode::Memory, None), |_| {});
    assert!(ok.is_ok());
}

#[test]
fn second_run_while_busy_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");
    executor.initialize().expect("initialize");

    // 第二个请求在第一个任务派生密钥期间到达
    executor
        .send(encrypt_request(b"first job", SinkMode::Memory, None))
        .expect("send first");
    executor
        .send(encrypt_request(b"second job", SinkMode::Memory, None))
        .expect("send second");
    executor.send(Request::ClearResult).expect("send clear");

    let responses = collect_until_terminal(&executor, 3);
    let terminal: Vec<&Response> = responses.iter().filter(|r| r.is_terminal()).collect();

    assert_eq!(terminal[0], &Response::error("job already in progress"));
    assert_eq!(terminal[1], &Response::error("job already in progress"));
    assert!(matches!(terminal[2], Response::Done { .. }));

    // 任务结束后可以清除结果
    executor.clear_result().expect("clear");
}

#[test]
fn dropping_the_handle_aborts_the_job() {
    let dir = tempdir().expect("create temp dir");
    let executor = ExecutorHandle::spawn(config_in(dir.path())).expect("spawn");
    executor.initialize().expect("initialize");

    executor
        .send(encrypt_request(
            b"abandoned payload",
            SinkMode::Persistent,
            Some("abandoned.acry"),
        ))
        .expect("send");
    drop(executor);

    assert!(!dir.path().join("abandoned.acry").exists());
    assert!(!dir.path().join(".abandoned.acry.partial").exists());
}
