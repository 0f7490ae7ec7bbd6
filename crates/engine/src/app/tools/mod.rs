mod console;
pub(crate) mod console_commands;
mod overlay;
mod params;
pub(crate) mod text;

pub(crate) use console::{draw_console, ConsoleState};
pub(crate) use console_commands::{ConsoleCommandProcessor, DebugCommand};
pub(crate) use overlay::{draw_overlay, draw_param_panel, OverlayData};
pub use params::{ParamError, ParamKind, ParamSet, ParamSpec, ParamValue};
