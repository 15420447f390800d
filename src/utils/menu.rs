//! Operator interface: test selection, PID gain editing and line-based prompts.
//!
//! The gain editor is a small state machine. Turning the knob only changes a
//! working copy; `Commit` hands out an immutable `PidGains` snapshot that the
//! next PID run is built from, `Cancel` throws the edits away.

use std::io::{BufRead, Write};

use log::{debug, warn};

use crate::component_b::pid::PidGains;

/// Test selected from the two slide switches or the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    BangBang,
    StepLoHi,
    StepHiLo,
    Characterize,
    Pid,
    Track,
}

impl TestKind {
    /// `sw[1:0]`: 00 bang-bang, 01 step lo→hi, 10 step hi→lo, 11 characterize.
    pub fn from_switches(sw: u8) -> Self {
        match sw & 0b11 {
            0b00 => TestKind::BangBang,
            0b01 => TestKind::StepLoHi,
            0b10 => TestKind::StepHiLo,
            _ => TestKind::Characterize,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TestKind::BangBang => "Bang-Bang",
            TestKind::StepLoHi => "Step Lo->Hi",
            TestKind::StepHiLo => "Step Hi->Lo",
            TestKind::Characterize => "Characterization",
            TestKind::Pid => "PID",
            TestKind::Track => "Tracking",
        }
    }

    /// Needs a setpoint from the operator.
    pub fn is_closed_loop(self) -> bool {
        matches!(self, TestKind::BangBang | TestKind::Pid)
    }
}

pub const MAX_GAIN: i32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainField {
    P,
    I,
    D,
}

impl GainField {
    fn next(self) -> Self {
        match self {
            GainField::P => GainField::I,
            GainField::I => GainField::D,
            GainField::D => GainField::P,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Editing(GainField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorEvent {
    Begin,
    Turn(i32),
    Next,
    Commit,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct GainEditor {
    state: EditorState,
    committed: PidGains,
    working: PidGains,
}

impl GainEditor {
    pub fn new(initial: PidGains) -> Self {
        Self {
            state: EditorState::Idle,
            committed: initial,
            working: initial,
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn committed(&self) -> PidGains {
        self.committed
    }

    pub fn working(&self) -> PidGains {
        self.working
    }

    /// Feed one event. Returns the new snapshot on `Commit`.
    pub fn handle(&mut self, event: EditorEvent) -> Option<PidGains> {
        match (self.state, event) {
            (EditorState::Idle, EditorEvent::Begin) => {
                self.working = self.committed;
                self.state = EditorState::Editing(GainField::P);
                None
            }
            (EditorState::Editing(field), EditorEvent::Turn(delta)) => {
                let slot = match field {
                    GainField::P => &mut self.working.p,
                    GainField::I => &mut self.working.i,
                    GainField::D => &mut self.working.d,
                };
                *slot = slot.saturating_add(delta).clamp(0, MAX_GAIN);
                None
            }
            (EditorState::Editing(field), EditorEvent::Next) => {
                self.state = EditorState::Editing(field.next());
                None
            }
            (EditorState::Editing(_), EditorEvent::Commit) => {
                self.committed = self.working;
                self.state = EditorState::Idle;
                debug!("[Gains] committed {:?}", self.committed);
                Some(self.committed)
            }
            (EditorState::Editing(_), EditorEvent::Cancel) => {
                self.working = self.committed;
                self.state = EditorState::Idle;
                None
            }
            _ => None,
        }
    }
}

/// Line-oriented operator console.
pub trait UserIo {
    fn show(&mut self, text: &str);

    /// Next input line, trimmed; `None` once input is closed.
    fn read_line(&mut self) -> Option<String>;
}

/// `UserIo` over any reader/writer pair (stdin/stdout in the binary).
pub struct ConsoleIo<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleIo<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }
}

impl<R: BufRead, W: Write> UserIo for ConsoleIo<R, W> {
    fn show(&mut self, text: &str) {
        if let Err(e) = write!(self.output, "{}", text).and_then(|_| self.output.flush()) {
            warn!("[Menu] console write failed: {}", e);
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

/// Prompt for an integer; blank or unparsable input keeps the default.
pub fn prompt_number(io: &mut dyn UserIo, prompt: &str, default: i32) -> i32 {
    io.show(&format!("{} [default: {}]: ", prompt, default));
    io.read_line()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(default)
}

/// Walk the editor through P, I and D with typed values.
pub fn prompt_gains(io: &mut dyn UserIo, editor: &mut GainEditor) -> Option<PidGains> {
    editor.handle(EditorEvent::Begin);
    let current = editor.working();
    for (name, value) in [("P gain", current.p), ("I gain", current.i), ("D gain", current.d)] {
        let wanted = prompt_number(io, name, value);
        editor.handle(EditorEvent::Turn(wanted.saturating_sub(value)));
        editor.handle(EditorEvent::Next);
    }
    io.show("Commit gains? [Y/n]: ");
    match io.read_line().as_deref() {
        Some("n") | Some("N") => {
            editor.handle(EditorEvent::Cancel);
            None
        }
        _ => editor.handle(EditorEvent::Commit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn switches_select_tests() {
        assert_eq!(TestKind::from_switches(0b00), TestKind::BangBang);
        assert_eq!(TestKind::from_switches(0b01), TestKind::StepLoHi);
        assert_eq!(TestKind::from_switches(0b10), TestKind::StepHiLo);
        assert_eq!(TestKind::from_switches(0b11), TestKind::Characterize);
        assert_eq!(TestKind::from_switches(0b1110), TestKind::StepHiLo);
        assert!(TestKind::Pid.is_closed_loop());
        assert!(!TestKind::StepLoHi.is_closed_loop());
    }

    #[test]
    fn edits_are_invisible_until_commit() {
        let mut editor = GainEditor::new(PidGains::new(1, 2, 3));
        assert_eq!(editor.handle(EditorEvent::Turn(5)), None);
        assert_eq!(editor.working(), PidGains::new(1, 2, 3));

        editor.handle(EditorEvent::Begin);
        editor.handle(EditorEvent::Turn(4));
        editor.handle(EditorEvent::Next);
        editor.handle(EditorEvent::Turn(-10));
        assert_eq!(editor.state(), EditorState::Editing(GainField::I));
        assert_eq!(editor.committed(), PidGains::new(1, 2, 3));

        let snapshot = editor.handle(EditorEvent::Commit);
        assert_eq!(snapshot, Some(PidGains::new(5, 0, 3)));
        assert_eq!(editor.state(), EditorState::Idle);
    }

    #[test]
    fn cancel_restores_committed_gains() {
        let mut editor = GainEditor::new(PidGains::new(1, 1, 1));
        editor.handle(EditorEvent::Begin);
        editor.handle(EditorEvent::Turn(5_000));
        assert_eq!(editor.working().p, MAX_GAIN);
        assert_eq!(editor.handle(EditorEvent::Cancel), None);
        assert_eq!(editor.working(), PidGains::new(1, 1, 1));
    }

    #[test]
    fn next_wraps_around() {
        let mut editor = GainEditor::new(PidGains::default());
        editor.handle(EditorEvent::Begin);
        for _ in 0..3 {
            editor.handle(EditorEvent::Next);
        }
        assert_eq!(editor.state(), EditorState::Editing(GainField::P));
    }

    #[test]
    fn typed_gains_go_through_the_editor() {
        let mut io = ConsoleIo::new(Cursor::new("8\n\nabc\ny\n"), Vec::new());
        let mut editor = GainEditor::new(PidGains::new(1, 2, 3));
        let gains = prompt_gains(&mut io, &mut editor);
        assert_eq!(gains, Some(PidGains::new(8, 2, 3)));

        let shown = String::from_utf8(io.output_mut().clone()).unwrap();
        assert!(shown.contains("P gain [default: 1]: "));
    }

    #[test]
    fn closed_input_falls_back_to_default() {
        let mut io = ConsoleIo::new(Cursor::new(""), Vec::new());
        assert_eq!(prompt_number(&mut io, "Setpoint", 42), 42);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn broken_console_output_is_not_fatal() {
        let mut io = ConsoleIo::new(Cursor::new("7\n"), BrokenPipe);
        io.show("menu");
        assert_eq!(prompt_number(&mut io, "Setpoint", 42), 7);
    }
}
