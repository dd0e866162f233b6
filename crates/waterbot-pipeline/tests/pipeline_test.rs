use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mockall::{Sequence, mock};
use proptest::prelude::*;
use secrecy::SecretString;
use waterbot_core::{Op, RegistryAuth, SourceTree};
use waterbot_engine::{DockerError, DockerExecutor, Engine, ExecError};
use waterbot_pipeline::{
    APP_PORT, PipelineError, REGISTRY_ADDRESS, build, build_environment, container_echo, publish,
    test,
};

mock! {
    Executor {}

    impl DockerExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, DockerError>;
        async fn exec_streaming(&self, args: &[String]) -> Result<(), DockerError>;
        async fn exec_with_stdin(
            &self,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, DockerError>;
        fn spawn_detached(&self, args: &[String]) -> Result<(), DockerError>;
    }
}

const PASSING: &str = "============ 3 passed in 0.12s ============\n";
const FAILING: &str = "FAILED tests/test_app.py::test_root - assert 500 == 200\n\
    !!!!!!!!!! stopping after 1 failures !!!!!!!!!!\n\
    ============ 1 failed in 0.10s ============\n";

fn is(args: &[String], command: &str) -> bool {
    args.first().map(String::as_str) == Some(command)
}

fn runs_pytest(args: &[String]) -> bool {
    is(args, "run") && args.contains(&"pytest".to_owned())
}

fn fake_build(args: &[String], id: &str) -> Result<String, DockerError> {
    let pos = args.iter().position(|a| a == "--iidfile").unwrap();
    std::fs::write(&args[pos + 1], id).unwrap();
    Ok(String::new())
}

fn test_failure() -> DockerError {
    DockerError::CommandFailed {
        args: vec![],
        status: "exit status: 1".to_owned(),
        stdout: FAILING.to_owned(),
        stderr: String::new(),
    }
}

fn python_project(dir: &Path) -> SourceTree {
    std::fs::create_dir_all(dir.join("src/app")).unwrap();
    std::fs::create_dir_all(dir.join("tests")).unwrap();
    std::fs::write(dir.join("pyproject.toml"), "[project]\nname = \"water-bot\"\n").unwrap();
    std::fs::write(dir.join("uv.lock"), "version = 1\n").unwrap();
    std::fs::write(dir.join("src/app/main.py"), "app = None\n").unwrap();
    std::fs::write(dir.join("tests/test_app.py"), "def test_root():\n    pass\n").unwrap();
    SourceTree::open(dir).unwrap()
}

// ── Environment ──

#[test]
fn environment_steps_in_fixed_order() {
    let source = SourceTree::new("/project");
    let env = build_environment(&source);

    assert_eq!(env.base(), Some("python:3.13-slim"));
    assert!(matches!(
        &env.ops()[0],
        Op::Directory { path, source: s } if path == "/src" && s == &source
    ));
    assert_eq!(env.workdir(), Some("/src"));

    let mounts = env.cache_mounts();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].cache.name(), "pip_cache");
    assert_eq!(mounts[0].path, "/root/.cache/pip");

    let execs: Vec<Vec<&str>> = env
        .execs()
        .iter()
        .map(|e| e.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(
        execs,
        vec![
            vec!["pip", "install", "--upgrade", "pip"],
            vec!["pip", "install", "uv"],
            vec!["uv", "sync"],
        ]
    );
}

#[test]
fn environment_is_idempotent() {
    let source = SourceTree::new("/project");
    assert_eq!(build_environment(&source), build_environment(&source));
}

// ── Build ──

#[test]
fn build_overlays_runtime_configuration() {
    let source = SourceTree::new("/project");
    let image = build(&source).unwrap();

    let env = image.env_variables();
    assert_eq!(env.len(), 2);
    assert_eq!(env["HOST"], "0.0.0.0");
    assert_eq!(env["PORT"], "5001");
    assert_eq!(image.exposed_ports(), vec![5001]);
    assert_eq!(image.entrypoint().unwrap(), ["uv", "run", "src/app/main.py"]);
}

#[test]
fn build_does_not_run_tests() {
    let image = build(&SourceTree::new("/project")).unwrap();
    assert!(
        image
            .execs()
            .iter()
            .all(|exec| !exec.contains(&"pytest".to_owned()))
    );
}

#[test]
fn build_extends_the_environment() {
    let source = SourceTree::new("/project");
    let env = build_environment(&source);
    let image = build(&source).unwrap();

    assert_eq!(&image.ops()[..env.ops().len()], env.ops());
}

proptest! {
    #[test]
    fn build_always_exposes_only_app_port(root in "/[a-z0-9_]{1,12}(/[a-z0-9_.-]{1,12}){0,3}") {
        let image = build(&SourceTree::new(root)).unwrap();

        prop_assert_eq!(image.exposed_ports(), vec![APP_PORT]);
        let env = image.env_variables();
        prop_assert_eq!(env.len(), 2);
        prop_assert_eq!(env.get("HOST").copied(), Some("0.0.0.0"));
        prop_assert_eq!(env.get("PORT").copied(), Some("5001"));
    }

    #[test]
    fn environment_is_idempotent_for_any_tree(root in "/[a-z0-9_]{1,12}(/[a-z0-9_.-]{1,12}){0,3}") {
        let source = SourceTree::new(root);
        prop_assert_eq!(build_environment(&source), build_environment(&source));
    }
}

// ── Echo ──

#[test]
fn echo_container_runs_echo_on_pi_image() {
    let container = container_echo("hello");

    assert_eq!(container.base(), Some("dtcooper/raspberrypi-os:python"));
    assert_eq!(container.execs(), vec![["echo", "hello"].as_slice()]);
}

#[tokio::test]
async fn echo_container_outputs_message() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|args| fake_build(args, "sha256:pi"));
    mock.expect_exec()
        .withf(|args| is(args, "run"))
        .returning(|args| {
            // stand-in for echo: print everything after the command name
            let pos = args.iter().position(|a| a == "echo").unwrap();
            Ok(format!("{}\n", args[pos + 1..].join(" ")))
        });

    let engine = Engine::with_executor(mock);
    let output = engine.stdout(&container_echo("hello")).await.unwrap();

    assert_eq!(output.trim_end(), "hello");
}

// ── Test stage ──

#[tokio::test]
async fn test_returns_pytest_stdout() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .times(1)
        .returning(|args| fake_build(args, "sha256:env"));
    mock.expect_exec()
        .withf(|args| {
            runs_pytest(args)
                && args.contains(&"sha256:env".to_owned())
                && args.ends_with(&[
                    "uv".to_owned(),
                    "run".to_owned(),
                    "pytest".to_owned(),
                    "--maxfail=1".to_owned(),
                    "--disable-warnings".to_owned(),
                ])
        })
        .times(1)
        .returning(|_| Ok(PASSING.to_owned()));

    let engine = Engine::with_executor(mock);
    let output = test(&engine, &source).await.unwrap();

    assert_eq!(output, PASSING);
    assert!(!output.contains("FAILED"));
}

#[tokio::test]
async fn test_failure_is_surfaced() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|args| fake_build(args, "sha256:env"));
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .returning(|_| Err(test_failure()));

    let engine = Engine::with_executor(mock);
    let err = test(&engine, &source).await.unwrap_err();

    assert_eq!(err.stage(), "test");
    match err {
        PipelineError::Test {
            source: DockerError::CommandFailed { stdout, .. },
        } => assert!(stdout.contains("1 failed")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn environment_failure_skips_tests() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|_| {
            Err(DockerError::CommandFailed {
                args: vec![],
                status: "exit status: 1".to_owned(),
                stdout: String::new(),
                stderr: "error: No `pyproject.toml` found".to_owned(),
            })
        });
    mock.expect_exec().withf(|args| is(args, "run")).never();

    let engine = Engine::with_executor(mock);
    let err = test(&engine, &source).await.unwrap_err();

    assert!(matches!(err, PipelineError::Environment { .. }));
}

// ── Publish ──

#[tokio::test]
async fn publish_after_passing_tests_returns_reference() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .times(2)
        .returning(|args| {
            let dockerfile = std::fs::read_to_string(
                Path::new(args.last().unwrap()).join("Dockerfile"),
            )
            .unwrap();
            if dockerfile.contains("ENTRYPOINT") {
                fake_build(args, "sha256:app")
            } else {
                fake_build(args, "sha256:env")
            }
        });
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .times(1)
        .returning(|_| Ok(PASSING.to_owned()));
    mock.expect_exec()
        .withf(|args| is(args, "tag") && args[1] == "sha256:app")
        .times(1)
        .returning(|_| Ok(String::new()));
    mock.expect_exec()
        .withf(|args| is(args, "push") && args[1].starts_with(REGISTRY_ADDRESS))
        .times(1)
        .returning(|_| Ok("latest: digest: sha256:feedbeef size: 1570\n".to_owned()));

    let engine = Engine::with_executor(mock);
    let reference = publish(&engine, &source, None).await.unwrap();

    assert!(!reference.is_empty());
    assert_eq!(
        reference,
        "docker.io/johnhkchen/water-bot:latest@sha256:feedbeef"
    );
}

#[tokio::test]
async fn publish_never_pushes_when_tests_fail() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let pushes = Arc::new(AtomicUsize::new(0));
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .times(1)
        .returning(|args| fake_build(args, "sha256:env"));
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .returning(|_| Err(test_failure()));
    let counter = Arc::clone(&pushes);
    mock.expect_exec()
        .withf(|args| is(args, "tag") || is(args, "push"))
        .returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        });
    mock.expect_exec_with_stdin().never();

    let engine = Engine::with_executor(mock);
    let publish_err = publish(&engine, &source, None).await.unwrap_err();

    assert_eq!(pushes.load(Ordering::SeqCst), 0);
    assert_eq!(publish_err.stage(), "test");
    assert!(publish_err.to_string().contains("test suite failed"));
}

#[tokio::test]
async fn publish_fails_the_same_way_test_does() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|args| fake_build(args, "sha256:env"));
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .times(2)
        .returning(|_| Err(test_failure()));
    mock.expect_exec()
        .withf(|args| is(args, "push"))
        .never();

    let engine = Engine::with_executor(mock);
    let test_err = test(&engine, &source).await.unwrap_err();
    let publish_err = publish(&engine, &source, None).await.unwrap_err();

    assert_eq!(test_err.to_string(), publish_err.to_string());
    assert!(matches!(publish_err, PipelineError::Test { .. }));
}

#[tokio::test]
async fn publish_logs_in_before_push_when_credentials_are_set() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let auth = RegistryAuth {
        username: "johnhkchen".to_owned(),
        password: SecretString::from("hunter2".to_owned()),
    };
    let mut mock = MockExecutor::new();
    let mut seq = Sequence::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|args| fake_build(args, "sha256:img"));
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .returning(|_| Ok(PASSING.to_owned()));
    mock.expect_exec()
        .withf(|args| is(args, "tag"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(String::new()));
    mock.expect_exec_with_stdin()
        .withf(|args, stdin| {
            is(args, "login")
                && args[1] == "docker.io"
                && args.contains(&"johnhkchen".to_owned())
                && stdin == b"hunter2"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok("Login Succeeded\n".to_owned()));
    mock.expect_exec()
        .withf(|args| is(args, "push"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(String::new()));

    let engine = Engine::with_executor(mock);
    let reference = publish(&engine, &source, Some(&auth)).await.unwrap();

    assert_eq!(reference, "docker.io/johnhkchen/water-bot:latest");
}

#[tokio::test]
async fn publish_push_failure_is_reported() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .returning(|args| fake_build(args, "sha256:img"));
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .returning(|_| Ok(PASSING.to_owned()));
    mock.expect_exec()
        .withf(|args| is(args, "tag"))
        .returning(|_| Ok(String::new()));
    mock.expect_exec()
        .withf(|args| is(args, "push"))
        .returning(|_| {
            Err(DockerError::CommandFailed {
                args: vec![],
                status: "exit status: 1".to_owned(),
                stdout: String::new(),
                stderr: "unauthorized: authentication required".to_owned(),
            })
        });

    let engine = Engine::with_executor(mock);
    let err = publish(&engine, &source, None).await.unwrap_err();

    assert_eq!(err.stage(), "publish");
}

// ── Concurrency ──

#[tokio::test]
async fn build_and_test_run_concurrently_on_one_tree() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = python_project(tmp.path());
    let mut mock = MockExecutor::new();

    mock.expect_exec()
        .withf(|args| is(args, "build"))
        .times(2)
        .returning(|args| {
            // each evaluation has a private context holding the full tree
            let context = Path::new(args.last().unwrap());
            assert!(context.join("dir0/src/app/main.py").exists());
            fake_build(args, "sha256:img")
        });
    mock.expect_exec()
        .withf(|args| runs_pytest(args))
        .returning(|_| Ok(PASSING.to_owned()));

    let engine = Engine::with_executor(mock);
    let image = build(&source).unwrap();

    let (built, tested) = tokio::join!(engine.build_image(&image), test(&engine, &source));

    assert_eq!(built.unwrap().as_str(), "sha256:img");
    assert_eq!(tested.unwrap(), PASSING);
}

#[tokio::test]
async fn echo_without_exec_is_rejected() {
    let engine = Engine::with_executor(MockExecutor::new());
    let result = engine
        .stdout(&build(&SourceTree::new("/project")).unwrap())
        .await;
    assert!(matches!(result, Err(ExecError::NoExec)));
}
