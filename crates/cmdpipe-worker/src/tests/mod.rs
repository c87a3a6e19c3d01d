//! Unit and behavioural tests for the reference worker.


use std::io::{self, Cursor};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use mockall::mock;
use mockall::predicate::eq;
use mockall::Sequence;
use nix::unistd::{Pid, getppid};
use rstest::rstest;

use crate::{
    CommandExecutor, CommandStatus, ExecuteError, FailureNotifier, NotifyError, ShellExecutor,
    WorkerError, WorkerExit, parent_pid, run_worker,
};

mock! {
    Executor {}
    impl CommandExecutor for Executor {
        fn execute(&self, command: &str) -> Result<CommandStatus, ExecuteError>;
    }
}

mock! {
    Notifier {}
    impl FailureNotifier for Notifier {
        fn notify(&self) -> Result<(), NotifyError>;
    }
}

struct Run {
    exit: Result<WorkerExit, WorkerError>,
    stdout: String,
    stderr: String,
}

fn drive(input: &str, executor: &MockExecutor, notifier: &MockNotifier) -> Run {
    let mut reader = Cursor::new(input.as_bytes().to_vec());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run_worker(&mut reader, &mut stdout, &mut stderr, executor, notifier);
    Run {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

fn unused_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().never();
    notifier
}

#[rstest]
fn runs_every_command_until_end_of_input() {
    let mut executor = MockExecutor::new();
    let mut sequence = Sequence::new();
    for command in ["ping", "whoami"] {
        executor
            .expect_execute()
            .with(eq(command))
            .once()
            .in_sequence(&mut sequence)
            .returning(|_| Ok(CommandStatus::Succeeded));
    }

    let run = drive("ping\n\nwhoami\n", &executor, &unused_notifier());

    assert_eq!(run.exit.expect("worker completes"), WorkerExit::Completed);
    assert_eq!(
        run.stdout,
        "Child: running command 1: ping\n\
         Child: command 1 succeeded\n\
         Child: running command 2: whoami\n\
         Child: command 2 succeeded\n"
    );
    assert!(run.stderr.is_empty());
}

#[rstest]
fn unterminated_last_line_is_still_run() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(eq("date"))
        .once()
        .returning(|_| Ok(CommandStatus::Succeeded));

    let run = drive("date", &executor, &unused_notifier());
    assert_eq!(run.exit.expect("worker completes"), WorkerExit::Completed);
}

#[rstest]
#[case::exit_code(Ok(CommandStatus::ExitedWithCode(2)), "exited with code 2")]
#[case::signal(Ok(CommandStatus::KilledBySignal(15)), "killed by signal 15")]
#[case::spawn(
    Err(ExecuteError::Spawn {
        shell: String::from("/bin/nope"),
        source: io::Error::from(io::ErrorKind::NotFound),
    }),
    "failed to start shell '/bin/nope'"
)]
fn first_failure_signals_parent_and_stops(
    #[case] result: Result<CommandStatus, ExecuteError>,
    #[case] reason: &str,
) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(eq("ok"))
        .once()
        .returning(|_| Ok(CommandStatus::Succeeded));
    executor
        .expect_execute()
        .with(eq("bad"))
        .once()
        .return_once(move |_| result);
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().once().returning(|| Ok(()));

    let run = drive("ok\nbad\nnever\n", &executor, &notifier);

    assert_eq!(run.exit.expect("worker stops"), WorkerExit::CommandFailed);
    assert!(run.stderr.contains(reason), "stderr: {}", run.stderr);
    assert!(run.stderr.contains("command 2 failed"));
    assert!(!run.stdout.contains("never"));
}

#[rstest]
fn notification_failure_is_reported_but_not_fatal() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|_| Ok(CommandStatus::ExitedWithCode(1)));
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().once().returning(|| {
        Err(NotifyError::Signal {
            pid: 99_999,
            source: nix::errno::Errno::ESRCH,
        })
    });

    let run = drive("false\n", &executor, &notifier);

    assert_eq!(run.exit.expect("worker stops"), WorkerExit::CommandFailed);
    assert!(run.stderr.contains("failed to signal parent 99999"));
}

#[rstest]
#[case::success(ExitStatus::from_raw(0), CommandStatus::Succeeded)]
#[case::code(ExitStatus::from_raw(3 << 8), CommandStatus::ExitedWithCode(3))]
#[case::signal(ExitStatus::from_raw(9), CommandStatus::KilledBySignal(9))]
fn classifies_raw_statuses(#[case] status: ExitStatus, #[case] expected: CommandStatus) {
    assert_eq!(CommandStatus::from_status(status), expected);
}

#[rstest]
fn shell_executor_reports_real_exit_codes() {
    let executor = ShellExecutor::new("/bin/sh");
    assert_eq!(
        executor.execute("exit 0").expect("shell runs"),
        CommandStatus::Succeeded
    );
    assert_eq!(
        executor.execute("exit 4").expect("shell runs"),
        CommandStatus::ExitedWithCode(4)
    );
}

#[rstest]
fn shell_executor_reports_missing_shell() {
    let executor = ShellExecutor::new("/nonexistent/shell");
    let error = executor.execute("true").expect_err("spawn fails");
    assert!(matches!(error, ExecuteError::Spawn { .. }));
}

#[rstest]
#[case::explicit(Some("4242"), Pid::from_raw(4242))]
#[case::padded(Some(" 4242\n"), Pid::from_raw(4242))]
fn parent_pid_prefers_the_override(#[case] value: Option<&str>, #[case] expected: Pid) {
    assert_eq!(parent_pid(value), expected);
}

#[rstest]
#[case::unset(None)]
#[case::garbage(Some("not-a-pid"))]
#[case::init(Some("1"))]
#[case::negative(Some("-5"))]
fn parent_pid_falls_back_to_the_real_parent(#[case] value: Option<&str>) {
    assert_eq!(parent_pid(value), getppid());
}
