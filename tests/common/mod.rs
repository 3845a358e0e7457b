//! Shared helpers for the render system integration tests.

#![allow(dead_code)]

use render_system::backend::dummy::Command;
use render_system::backend::{BindGroupEntry, BindGroupHandle};
use render_system::prelude::*;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Backend plus a render system already sized to `WIDTH` x `HEIGHT`.
pub fn setup() -> (DummyBackend, RenderSystem) {
    init_logging();
    let mut backend = DummyBackend::new();
    let mut system = RenderSystem::new(&mut backend, RenderConfig::default())
        .expect("render system creation");
    system
        .resize(&mut backend, WIDTH, HEIGHT)
        .expect("initial resize");
    (backend, system)
}

/// Commands recorded inside the last pass labelled `label`, excluding the
/// begin and end markers.
pub fn pass_commands(backend: &DummyBackend, label: &str) -> Vec<Command> {
    let commands = backend.commands();
    let Some(start) = commands.iter().rposition(|c| {
        matches!(c, Command::BeginRenderPass { label: Some(l), .. } if l == label)
    }) else {
        return Vec::new();
    };
    commands[start + 1..]
        .iter()
        .take_while(|c| !matches!(c, Command::EndRenderPass))
        .cloned()
        .collect()
}

pub fn count(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().filter(|c| pred(c)).count()
}

pub fn is_indexed_draw(c: &Command) -> bool {
    matches!(c, Command::DrawIndexed { .. })
}

/// Bind groups set at `index`, in recording order.
pub fn bind_groups_at(commands: &[Command], index: u32) -> Vec<BindGroupHandle> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::SetBindGroup { index: i, bind_group } if *i == index => Some(*bind_group),
            _ => None,
        })
        .collect()
}

/// Contents of the uniform buffer behind the first entry of `bind_group`,
/// read back as floats.
pub fn uniform_floats(backend: &DummyBackend, bind_group: BindGroupHandle) -> Vec<f32> {
    let entries = backend
        .bind_group_entries(bind_group)
        .expect("bind group is alive");
    let buffer = entries
        .iter()
        .find_map(|(_, entry)| match entry {
            BindGroupEntry::Buffer { buffer, .. } => Some(*buffer),
            _ => None,
        })
        .expect("bind group has a buffer entry");
    backend
        .buffer(buffer)
        .expect("buffer is alive")
        .data
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
