
// Component B: Control
// PWM actuator, control laws (bang-bang, PID, step stimulus) and the loop
// driver that runs them against the lamp.

pub mod actuator;
pub mod bang_bang;
pub mod pid;
pub mod step_response;
pub mod driver;
