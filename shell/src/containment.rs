//! Fault containment around every call into the computation module.
//!
//! A fault is either an `Err` returned by the module or a panic unwinding out of
//! it. Both are caught at the boundary where they happen, rendered for the host
//! log sink, forwarded to the notification channel and never propagated further.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use anyhow::Result;
use tracing::{error, warn};

use crate::io::config::ShellConfig;
use crate::io::host::{Host, colorize, stamp};

/// Recovery boundary a fault was caught at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// Load, instance initialization and one-time setup.
    Setup,
    /// Periodic invocation.
    Loop,
    /// Externally triggered command, by name.
    Command(&'static str),
}

impl Boundary {
    /// Whether a fault here leaves the module unusable for the rest of the process.
    ///
    /// Command faults stay local to the command.
    pub fn escalates(&self) -> bool {
        matches!(self, Boundary::Setup | Boundary::Loop)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Setup => f.write_str("setup"),
            Boundary::Loop => f.write_str("loop"),
            Boundary::Command(name) => write!(f, "command {name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Error,
    Panic,
}

/// A fault caught at a recovery boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub boundary: Boundary,
    pub kind: FaultKind,
    /// Every message in the error chain, outermost first.
    pub message: String,
    pub backtrace: Option<String>,
}

impl Fault {
    pub fn from_error(boundary: Boundary, err: &anyhow::Error) -> Self {
        Self {
            boundary,
            kind: FaultKind::Error,
            message: format!("{err:#}"),
            backtrace: captured(err.backtrace()),
        }
    }

    /// `backtrace` is the trace recorded at the panic site, if any.
    pub fn from_panic(
        boundary: Boundary,
        payload: &(dyn Any + Send),
        backtrace: Option<&Backtrace>,
    ) -> Self {
        Self {
            boundary,
            kind: FaultKind::Panic,
            message: panic_payload_to_string(payload),
            backtrace: backtrace.and_then(captured),
        }
    }

    /// Human-readable text: boundary, message and backtrace when available.
    pub fn render(&self) -> String {
        let kind = match self.kind {
            FaultKind::Error => "error",
            FaultKind::Panic => "panic",
        };
        let mut text = format!("{} {kind}: {}", self.boundary, self.message);
        if self.boundary.escalates() {
            text.push_str(" (restart requested)");
        }
        if let Some(backtrace) = &self.backtrace {
            text.push('\n');
            text.push_str(backtrace.trim_end());
        }
        text
    }
}

fn captured(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

thread_local! {
    /// Nesting depth of [`catch`] on this thread.
    static CATCH_DEPTH: Cell<u32> = const { Cell::new(0) };
    /// Trace of the last panic raised inside [`catch`] on this thread.
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a process-wide hook in front of the existing one.
///
/// Panics inside [`catch`] have their backtrace recorded for the fault report
/// and print nothing. Panics anywhere else go to the previous hook untouched.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CATCH_DEPTH.with(Cell::get) > 0 {
                let trace = Backtrace::capture();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `action` and turn any error or panic into a [`Fault`].
///
/// Backtraces follow `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE` for both kinds.
pub fn catch<T>(boundary: Boundary, action: impl FnOnce() -> Result<T>) -> Result<T, Fault> {
    install_panic_hook();
    PANIC_TRACE.with(|slot| *slot.borrow_mut() = None);
    CATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let outcome = panic::catch_unwind(AssertUnwindSafe(action));
    CATCH_DEPTH.with(|depth| depth.set(depth.get() - 1));

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Fault::from_error(boundary, &err)),
        Err(payload) => {
            let trace = PANIC_TRACE.with(|slot| slot.borrow_mut().take());
            Err(Fault::from_panic(boundary, &*payload, trace.as_ref()))
        }
    }
}

/// Write a fault to the host log sink and the notification channel.
pub fn report<H: Host>(host: &mut H, config: &ShellConfig, fault: &Fault) {
    if fault.boundary.escalates() {
        error!(boundary = %fault.boundary, kind = ?fault.kind, message = %fault.message, "module fault");
    } else {
        warn!(boundary = %fault.boundary, kind = ?fault.kind, message = %fault.message, "contained command fault");
    }
    let text = fault.render();
    host.log(&colorize(&text, &config.fault_color));
    if config.notify_faults {
        let time = host.time();
        host.notify(&stamp(time, &text));
    }
}

/// Run `action` inside a recovery boundary, reporting any fault.
///
/// The returned fault has already been logged and notified. The caller decides
/// the state transition from the boundary it passed in.
pub fn contain<H: Host, T>(
    host: &mut H,
    config: &ShellConfig,
    boundary: Boundary,
    action: impl FnOnce() -> Result<T>,
) -> Result<T, Fault> {
    catch(boundary, action).inspect_err(|fault| report(host, config, fault))
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingHost;
    use anyhow::{Context, anyhow, bail};

    #[test]
    fn catch_passes_value_through() {
        let value = catch(Boundary::Loop, || Ok(7)).expect("no fault");
        assert_eq!(value, 7);
    }

    #[test]
    fn catch_joins_error_chain() {
        let fault = catch::<()>(Boundary::Setup, || {
            Err(anyhow!("boom")).context("run setup")
        })
        .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Error);
        assert_eq!(fault.message, "run setup: boom");
    }

    #[test]
    fn catch_turns_panic_into_fault() {
        let fault = catch::<()>(Boundary::Loop, || panic!("oops {}", 1)).unwrap_err();
        assert_eq!(fault.kind, FaultKind::Panic);
        assert_eq!(fault.message, "oops 1");
    }

    #[test]
    fn panic_fault_carries_backtrace_when_enabled() {
        let enabled = Backtrace::capture().status() == BacktraceStatus::Captured;

        let fault = catch::<()>(Boundary::Loop, || panic!("oops")).unwrap_err();

        assert_eq!(fault.backtrace.is_some(), enabled);
        if enabled {
            let rendered = fault.render();
            assert!(rendered.starts_with("loop panic: oops (restart requested)\n"));
            assert!(rendered.lines().count() > 1);
        }
    }

    #[test]
    fn nested_catch_keeps_outer_boundary_usable() {
        let outer = catch(Boundary::Loop, || {
            let inner = catch::<()>(Boundary::Command("set_named_blueprint"), || panic!("inner"));
            assert!(inner.is_err());
            Ok(1)
        });
        assert_eq!(outer.expect("outer completes"), 1);

        let fault = catch::<()>(Boundary::Loop, || panic!("after")).unwrap_err();
        assert_eq!(fault.message, "after");
    }

    #[test]
    fn only_critical_boundaries_escalate() {
        assert!(Boundary::Setup.escalates());
        assert!(Boundary::Loop.escalates());
        assert!(!Boundary::Command("set_named_blueprint").escalates());
    }

    #[test]
    fn contain_reports_to_log_and_notifications() {
        let mut host = RecordingHost::new(vec![800]);
        let config = ShellConfig::default();

        let fault = contain::<_, ()>(&mut host, &config, Boundary::Setup, || bail!("boom"))
            .unwrap_err();

        assert_eq!(fault.message, "boom");
        assert_eq!(host.logs.len(), 1);
        assert!(host.logs[0].starts_with("<span style=\"color: #ff9999\">"));
        assert!(host.logs[0].contains("setup error: boom"));
        assert_eq!(host.notifications.len(), 1);
        assert!(host.notifications[0].contains("boom"));
        assert!(!host.notifications[0].contains("<span"));
    }

    #[test]
    fn contain_respects_notify_toggle() {
        let mut host = RecordingHost::new(vec![800]);
        let config = ShellConfig {
            notify_faults: false,
            ..ShellConfig::default()
        };

        let result = contain::<_, ()>(&mut host, &config, Boundary::Loop, || bail!("oops"));

        assert!(result.is_err());
        assert_eq!(host.logs.len(), 1);
        assert!(host.notifications.is_empty());
    }

    #[test]
    fn command_fault_render_omits_restart_note() {
        let fault = Fault {
            boundary: Boundary::Command("set_named_blueprint"),
            kind: FaultKind::Error,
            message: "bad payload".to_string(),
            backtrace: Some("0: frame\n".to_string()),
        };
        assert_eq!(
            fault.render(),
            "command set_named_blueprint error: bad payload\n0: frame"
        );
    }
}
