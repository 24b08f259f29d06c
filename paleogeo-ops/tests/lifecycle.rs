//! End-to-end lifecycle behavior of the controller: cancellation timing,
//! rejected starts, non-essential failures, and start/stop discipline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use paleogeo_core::{
    FeedbackMessage, FeedbackSink, ParamDef, ParamForm, ParamKind, RunResult, RunState, Severity,
};
use paleogeo_ops::{
    Controller, EngineConfig, OperationKind, OperationPlan, OpsError, ProcessingStep,
    StartOutcome, ABORT_LINE_1, ABORT_LINE_2,
};

#[derive(Default)]
struct RecordingSink {
    percents: Mutex<Vec<u8>>,
}

impl FeedbackSink for RecordingSink {
    fn progress(&self, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }
}

fn error_lines(messages: &[FeedbackMessage]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.severity >= Severity::Error)
        .map(|m| m.text.as_str())
        .collect()
}

/// Cancel between the first and second step: the first step's progress
/// lands, the remaining steps never run, and the run ends `Canceled` with
/// the two fixed abort lines.
#[test]
fn test_cancel_between_steps() {
    // The first step parks until the test has called stop().
    let (entered_tx, entered_rx): (Sender<()>, Receiver<()>) = channel();
    let (resume_tx, resume_rx): (Sender<()>, Receiver<()>) = channel();
    let entered_rx = Arc::new(Mutex::new(entered_rx));
    let resume_rx = Arc::new(Mutex::new(resume_rx));
    let later_steps_ran = Arc::new(AtomicBool::new(false));

    let mut controller = Controller::new(EngineConfig::default(), {
        let later_steps_ran = later_steps_ran.clone();
        let resume_rx = resume_rx.clone();
        let entered_tx = entered_tx.clone();
        move || {
            let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
            plan.push(ProcessingStep::essential("one", 33, {
                let entered_tx = entered_tx.clone();
                let resume_rx = resume_rx.clone();
                move |_| {
                    entered_tx.send(()).map_err(|_| OpsError::Artifact("handshake".into()))?;
                    resume_rx
                        .lock()
                        .unwrap()
                        .recv()
                        .map_err(|_| OpsError::Artifact("handshake".into()))?;
                    Ok(())
                }
            }));
            for label in ["two", "three"] {
                let later_steps_ran = later_steps_ran.clone();
                plan.push(ProcessingStep::essential(label, 33, move |_| {
                    later_steps_ran.store(true, Ordering::SeqCst);
                    Ok(())
                }));
            }
            plan.push(ProcessingStep::essential("pad", 1, |_| Ok(())));
            Ok(plan)
        }
    });
    let sink = Arc::new(RecordingSink::default());
    controller.feedback().set_sink(sink.clone());

    assert_eq!(controller.start(), StartOutcome::Started);
    entered_rx.lock().unwrap().recv().unwrap();
    controller.stop();
    resume_tx.send(()).unwrap();

    assert_eq!(controller.join(), RunState::Canceled);
    assert!(!later_steps_ran.load(Ordering::SeqCst));

    // Exactly the two fixed abort lines, nothing else at error severity.
    let messages = controller.feedback().messages();
    assert_eq!(error_lines(&messages), vec![ABORT_LINE_1, ABORT_LINE_2]);

    // The first step's 33 may land, the later steps' percents never do.
    let percents = sink.percents.lock().unwrap().clone();
    assert!(!percents.contains(&66));
    assert!(!percents.contains(&100));
}

/// The in-flight step finishes after stop() and posts its weight, but the
/// terminal event re-asserts the reset: a canceled run always ends at 0.
#[test]
fn test_canceled_run_ends_at_zero_progress() {
    let (entered_tx, entered_rx): (Sender<()>, Receiver<()>) = channel();
    let (resume_tx, resume_rx): (Sender<()>, Receiver<()>) = channel();
    let resume_rx = Arc::new(Mutex::new(resume_rx));

    let mut controller = Controller::new(EngineConfig::default(), move || {
        let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
        plan.push(ProcessingStep::essential("one", 33, {
            let entered_tx = entered_tx.clone();
            let resume_rx = resume_rx.clone();
            move |_| {
                entered_tx.send(()).map_err(|_| OpsError::Artifact("handshake".into()))?;
                resume_rx
                    .lock()
                    .unwrap()
                    .recv()
                    .map_err(|_| OpsError::Artifact("handshake".into()))?;
                Ok(())
            }
        }));
        plan.push(ProcessingStep::essential("two", 67, |_| Ok(())));
        Ok(plan)
    });
    let sink = Arc::new(RecordingSink::default());
    controller.feedback().set_sink(sink.clone());

    assert_eq!(controller.start(), StartOutcome::Started);
    entered_rx.recv().unwrap();
    controller.stop();
    resume_tx.send(()).unwrap();

    assert_eq!(controller.join(), RunState::Canceled);
    assert_eq!(controller.feedback().progress(), 0);
    let percents = sink.percents.lock().unwrap().clone();
    assert_eq!(percents.last().copied(), Some(0));
}

/// A snapshot that fails to capture rejects the start with one error
/// message naming the missing control, and no worker is spawned.
#[test]
fn test_missing_mandatory_parameter_rejects_start() {
    let mut form = ParamForm::new();
    form.register(ParamDef::mandatory("base", ParamKind::Layer))
        .unwrap();

    let mut controller = Controller::new(EngineConfig::default(), move || {
        let snapshot = form.capture()?;
        let _ = snapshot;
        Ok(OperationPlan::new(OperationKind::StandardProcessing, None))
    });
    assert_eq!(controller.start(), StartOutcome::Rejected);
    assert_eq!(controller.join(), RunState::Finished(RunResult::Failure));

    let messages = controller.feedback().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Error);
    assert!(messages[0].text.contains("mandatory parameter 'base' is not set"));
}

/// A failing best-effort step degrades to a warning; the run still
/// succeeds and progress reaches 100.
#[test]
fn test_best_effort_failure_degrades_to_warning() {
    let mut controller = Controller::new(EngineConfig::default(), || {
        let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
        plan.push(ProcessingStep::essential("work", 60, |_| Ok(())));
        plan.push(ProcessingStep::best_effort("extra save", 20, |_| {
            Err(OpsError::Artifact("disk full".into()))
        }));
        plan.push(ProcessingStep::essential("finish", 20, |_| Ok(())));
        Ok(plan)
    });
    controller.start();
    assert_eq!(
        controller.join(),
        RunState::Finished(RunResult::SuccessNoArtifact)
    );
    assert_eq!(controller.feedback().progress(), 100);

    let feedback = controller.feedback();
    assert_eq!(feedback.count_at_least(Severity::Error), 0);
    let warnings: Vec<_> = feedback
        .messages()
        .into_iter()
        .filter(|m| m.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].text.contains("disk full"));
    assert!(warnings[0].text.contains("continuing"));
}

/// Starting while a run is active is a no-op: one worker, one terminal
/// state, one completion message.
#[test]
fn test_double_start_is_single_run() {
    let (entered_tx, entered_rx): (Sender<()>, Receiver<()>) = channel();
    let (resume_tx, resume_rx): (Sender<()>, Receiver<()>) = channel();
    let resume_rx = Arc::new(Mutex::new(resume_rx));

    let mut controller = Controller::new(EngineConfig::default(), move || {
        let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
        plan.push(ProcessingStep::essential("hold", 100, {
            let entered_tx = entered_tx.clone();
            let resume_rx = resume_rx.clone();
            move |_| {
                entered_tx.send(()).map_err(|_| OpsError::Artifact("handshake".into()))?;
                resume_rx
                    .lock()
                    .unwrap()
                    .recv()
                    .map_err(|_| OpsError::Artifact("handshake".into()))?;
                Ok(())
            }
        }));
        Ok(plan)
    });

    assert_eq!(controller.start(), StartOutcome::Started);
    entered_rx.recv().unwrap();
    assert_eq!(controller.start(), StartOutcome::AlreadyRunning);
    resume_tx.send(()).unwrap();

    assert_eq!(
        controller.join(),
        RunState::Finished(RunResult::SuccessNoArtifact)
    );
    let completions = controller
        .feedback()
        .messages()
        .iter()
        .filter(|m| m.text.contains("finished successfully"))
        .count();
    assert_eq!(completions, 1);
}

/// Stopping with nothing running emits nothing.
#[test]
fn test_stop_idle_emits_nothing() {
    let mut controller = Controller::new(EngineConfig::default(), || {
        Ok(OperationPlan::new(OperationKind::StandardProcessing, None))
    });
    controller.stop();
    assert!(controller.feedback().messages().is_empty());
    assert_eq!(controller.join(), RunState::Idle);
}

/// A failing essential step emits its own error plus the two abort lines,
/// and the run is a `Failure`, not `Canceled`.
#[test]
fn test_essential_failure_emits_abort_lines() {
    let mut controller = Controller::new(EngineConfig::default(), || {
        let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
        plan.push(ProcessingStep::essential("doomed", 100, |_| {
            Err(OpsError::Artifact("cannot stage".into()))
        }));
        Ok(plan)
    });
    controller.start();
    assert_eq!(controller.join(), RunState::Finished(RunResult::Failure));

    let messages = controller.feedback().messages();
    let errors = error_lines(&messages);
    assert_eq!(errors.len(), 3);
    assert!(errors[0].contains("cannot stage"));
    assert_eq!(errors[1], ABORT_LINE_1);
    assert_eq!(errors[2], ABORT_LINE_2);
}

/// A terminal run can be restarted; the second run re-captures through the
/// plan source and finishes on its own.
#[test]
fn test_restart_after_terminal_state() {
    let builds = Arc::new(Mutex::new(0usize));
    let mut controller = Controller::new(EngineConfig::default(), {
        let builds = builds.clone();
        move || {
            *builds.lock().unwrap() += 1;
            let mut plan = OperationPlan::new(OperationKind::StandardProcessing, None);
            plan.push(ProcessingStep::essential("work", 100, |_| Ok(())));
            Ok(plan)
        }
    });

    controller.start();
    assert_eq!(
        controller.join(),
        RunState::Finished(RunResult::SuccessNoArtifact)
    );
    controller.start();
    assert_eq!(
        controller.join(),
        RunState::Finished(RunResult::SuccessNoArtifact)
    );
    assert_eq!(*builds.lock().unwrap(), 2);
}
