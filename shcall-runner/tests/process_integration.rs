#![cfg(unix)]

use std::fs;
use std::time::Duration;

use anyhow::Result;
use pretty_assertions::assert_eq;
use shcall_runner::{Command, Error, ExitOutcome, Invocation, Process, ProcessOptions, Redirect};
use tokio_test::{assert_err, assert_ok};

fn call() -> Invocation {
    Invocation::new()
}

#[tokio::test]
async fn captured_output_is_read_after_exit() -> Result<()> {
    let echo = Command::new("echo").capture(call().arg("hello")).await?;
    assert_eq!(echo.read_text().await?, "hello\n");
    assert_eq!(echo.try_outcome()?, Some(ExitOutcome::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn input_is_fed_to_stdin() -> Result<()> {
    let cat = Command::new("cat").capture(call().input("a\nb\n")).await?;
    assert_eq!(cat.read_text().await?, "a\nb\n");

    let head = Command::new("head")
        .capture(call().opt("n", 1).input("first\nsecond\n"))
        .await?;
    assert_eq!(head.read_text().await?, "first\n");
    Ok(())
}

#[tokio::test]
async fn lines_match_the_text() -> Result<()> {
    let seq = Command::new("seq").capture(call().arg(3)).await?;
    let lines = seq.lines()?.collect().await?;
    assert_eq!(lines, ["1", "2", "3"]);
    assert_eq!(seq.try_outcome()?, Some(ExitOutcome::Exited(0)));

    let again = seq.lines()?.collect().await?;
    assert!(again.is_empty());

    let printf = Command::new("printf").index(["a\\r\\nb\\n\\nc\\n"]);
    let text = printf.capture(call()).await?.read_text().await?;
    let lines = printf.capture(call()).await?.lines()?.collect().await?;
    assert_eq!(lines, ["a", "b", "", "c"]);
    assert_eq!(
        lines.iter().map(|line| format!("{line}\n")).collect::<String>(),
        text.replace("\r\n", "\n")
    );
    Ok(())
}

#[tokio::test]
async fn exhausted_lines_raise_the_exit_status() -> Result<()> {
    let sh = Command::new("sh")
        .capture(call().args(["-c", "echo a; exit 2"]))
        .await?;
    let mut lines = sh.lines()?;
    assert_eq!(lines.next_line().await?.as_deref(), Some("a"));
    let error = assert_err!(lines.next_line().await);
    assert!(error.is_code(2));
    Ok(())
}

#[tokio::test]
async fn reading_raises_when_checked() -> Result<()> {
    let sh = Command::new("sh")
        .capture(call().args(["-c", "echo out; exit 1"]))
        .await?;
    let error = assert_err!(sh.read_text().await);
    assert!(error.is_code(1));
    assert_eq!(
        error.to_string(),
        "Command 'sh -c echo out; exit 1' failed with status code 1"
    );
    Ok(())
}

#[tokio::test]
async fn test_reports_success_without_raising() -> Result<()> {
    assert!(Command::new("true").test(call()).await?);
    assert!(!Command::new("false").test(call()).await?);
    assert!(!Command::new("false").test(call().check(true)).await?);

    let checked = Command::new("false").with_process(&ProcessOptions::new().check(true));
    assert!(!checked.test(call()).await?);
    Ok(())
}

#[tokio::test]
async fn check_return_code_ignores_the_check_setting() -> Result<()> {
    let falsy = Command::new("false").call(call().check(false)).await?;
    assert!(!falsy.success().await?);
    assert_ok!(falsy.wait().await);

    let error = assert_err!(falsy.check_return_code().await);
    assert!(error.is_code(1));

    let truthy = Command::new("true").call(call().check(false)).await?;
    assert_ok!(truthy.check_return_code().await);
    Ok(())
}

#[tokio::test]
async fn failing_call_raises_on_wait() -> Result<()> {
    let error = assert_err!(Command::new("false").call(call()).await);
    let failure = error.command_error().expect("classified failure");
    assert_eq!(failure.argv(), ["false"]);
    assert_eq!(failure.return_code(), 1);
    Ok(())
}

#[tokio::test]
async fn timed_out_wait_leaves_the_process_running() -> Result<()> {
    let sleep = Command::new("sleep")
        .call(call().arg("0.3").wait(false).timeout(Duration::from_millis(20)))
        .await?;
    assert_eq!(sleep.timeout(), Some(Duration::from_millis(20)));

    let error = assert_err!(sleep.wait().await);
    assert!(error.is_timeout());
    assert_eq!(sleep.try_outcome()?, None);

    let outcome = sleep.wait_timeout(Duration::from_secs(10)).await?;
    assert_eq!(outcome, ExitOutcome::Exited(0));
    Ok(())
}

#[tokio::test]
async fn unrepresentable_timeouts_wait_without_a_deadline() -> Result<()> {
    let truthy = Command::new("true").call(call().wait(false)).await?;
    assert_eq!(truthy.wait_timeout(Duration::MAX).await?, ExitOutcome::Exited(0));

    let waited = Command::new("true")
        .call(call().timeout(Duration::from_secs(u64::MAX)))
        .await?;
    assert_eq!(waited.try_outcome()?, Some(ExitOutcome::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn waiting_call_honours_its_timeout() -> Result<()> {
    let error = assert_err!(
        Command::new("sleep")
            .call(call().arg(5).timeout(Duration::from_millis(50)))
            .await
    );
    assert!(matches!(error, Error::Timeout { ref command, .. } if command == "sleep 5"));
    Ok(())
}

#[tokio::test]
async fn terminated_process_is_classified_by_signal() -> Result<()> {
    let sleep = Command::new("sleep").call(call().arg(5).wait(false)).await?;
    assert_eq!(sleep.try_outcome()?, None);
    sleep.terminate()?;

    let error = assert_err!(sleep.wait().await);
    assert!(error.is_signal("SIGTERM"));
    assert!(!error.is_code(15));
    let failure = error.command_error().expect("classified failure");
    assert_eq!(failure.return_code(), -15);
    assert_eq!(failure.outcome(), ExitOutcome::Signaled(15));
    assert_eq!(error.to_string(), "Command 'sleep 5' failed with SIGTERM");

    // Signalling an exited process is a no-op.
    assert_ok!(sleep.terminate());
    Ok(())
}

#[tokio::test]
async fn concurrent_waits_agree() -> Result<()> {
    let sleep = Command::new("sleep").call(call().arg("0.1").wait(false)).await?;
    let (first, second) = tokio::join!(sleep.wait(), sleep.wait());
    assert_eq!(first?, second?);
    Ok(())
}

#[tokio::test]
async fn scope_waits_on_success() -> Result<()> {
    let sleep = Command::new("sleep").call(call().arg("0.1").wait(false)).await?;
    let pid = sleep
        .scope(async |process: &Process| Ok(process.pid()))
        .await?;
    assert!(pid.is_some());
    assert_eq!(sleep.try_outcome()?, Some(ExitOutcome::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn scope_raises_the_exit_status() -> Result<()> {
    let falsy = Command::new("false").call(call().wait(false)).await?;
    let error = assert_err!(falsy.scope(async |_: &Process| Ok(())).await);
    assert!(error.is_code(1));
    Ok(())
}

#[tokio::test]
async fn scope_body_error_wins_and_process_is_reaped() -> Result<()> {
    let falsy = Command::new("sh")
        .call(call().args(["-c", "sleep 0.1; exit 3"]).wait(false))
        .await?;
    let error = assert_err!(
        falsy
            .scope(async |_: &Process| Err::<(), _>(Error::NotCapturing))
            .await
    );
    assert!(matches!(error, Error::NotCapturing));
    assert_eq!(falsy.try_outcome()?, Some(ExitOutcome::Exited(3)));
    Ok(())
}

#[tokio::test]
async fn single_stream_reads_need_exactly_one_capture() -> Result<()> {
    let both = Command::new("echo")
        .capture(call().arg("x").capture_stderr(true))
        .await?;
    assert!(matches!(both.read_text().await, Err(Error::AmbiguousCapture)));
    let stdout = both.take_stdout();
    let stderr = both.take_stderr();
    assert!(stdout.is_some() && stderr.is_some());
    both.wait().await?;
    drop((stdout, stderr));

    let neither = Command::new("true").call(call()).await?;
    assert!(matches!(neither.read_text().await, Err(Error::NotCapturing)));
    assert!(matches!(neither.lines(), Err(Error::NotCapturing)));
    Ok(())
}

#[tokio::test]
async fn stderr_can_be_captured() -> Result<()> {
    let sh = Command::new("sh")
        .call(
            call()
                .args(["-c", "echo oops >&2"])
                .capture_stderr(true)
                .wait(false),
        )
        .await?;
    assert!(sh.captures_stderr());
    assert!(!sh.captures_stdout());
    assert_eq!(sh.read_text().await?, "oops\n");
    Ok(())
}

#[tokio::test]
async fn stderr_can_follow_stdout() -> Result<()> {
    let both = || call().args(["-c", "echo a; echo b >&2"]);

    let sh = Command::new("sh")
        .capture(both().stderr(Redirect::Stdout))
        .await?;
    assert!(sh.captures_stdout());
    assert!(!sh.captures_stderr());
    assert_eq!(sh.read_text().await?, "a\nb\n");

    let dir = tempfile::tempdir()?;
    let log = dir.path().join("log.txt");
    Command::new("sh")
        .call(both().stdout(Redirect::File(log.clone())).stderr(Redirect::Stdout))
        .await?;
    assert_eq!(fs::read_to_string(&log)?, "a\nb\n");

    let error = assert_err!(
        Command::new("true")
            .call(call().stdout(Redirect::Stdout))
            .await
    );
    assert!(matches!(error, Error::InvalidOptions(_)));
    Ok(())
}

#[tokio::test]
async fn redirects_and_working_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out.txt");

    Command::new("echo")
        .call(call().arg("saved").stdout(Redirect::File(out.clone())))
        .await?;
    assert_eq!(fs::read_to_string(&out)?, "saved\n");

    let cat = Command::new("cat")
        .capture(call().stdin(Redirect::File(out.clone())))
        .await?;
    assert_eq!(cat.read_text().await?, "saved\n");

    let ls = Command::new("ls").capture(call().cwd(dir.path())).await?;
    assert_eq!(ls.read_text().await?, "out.txt\n");

    Command::new("echo")
        .call(call().arg("dropped").stdout(Redirect::Null))
        .await?;
    Ok(())
}

#[tokio::test]
async fn environment_and_shell_mode() -> Result<()> {
    let sh = Command::new("sh")
        .capture(call().args(["-c", "echo $GREETING"]).env("GREETING", "hi"))
        .await?;
    assert_eq!(sh.read_text().await?, "hi\n");

    let shell = Command::new("echo")
        .capture(call().args(["a", "|", "tr", "a", "b"]).shell(true))
        .await?;
    assert_eq!(shell.read_text().await?, "b\n");
    Ok(())
}

#[tokio::test]
async fn missing_programs_fail_to_spawn() {
    let error = assert_err!(
        Command::new("shcall-definitely-missing-program")
            .call(call())
            .await
    );
    assert!(error.is_not_found());
    assert!(error.command_error().is_none());
}

#[tokio::test]
async fn conflicting_options_are_rejected_before_spawning() {
    let error = assert_err!(
        Command::new("cat")
            .call(call().input("x").stdin(Redirect::Null))
            .await
    );
    assert!(matches!(error, Error::InvalidOptions(_)));
}
