//! Terminal rendering of agent events.

use std::io::{self, Write};

use strands_agent::{AgentEvent, ResponseMetadata, StopReason, TokenTracker, ToolStatus};

/// Writes the chat transcript to `out` as events arrive.
pub struct Renderer<W: Write> {
    out: W,
    mid_line: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, mid_line: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, event: &AgentEvent) -> io::Result<()> {
        match event {
            AgentEvent::TextDelta(delta) => {
                write!(self.out, "{delta}")?;
                self.mid_line = !delta.ends_with('\n');
            }
            AgentEvent::ToolCallStarted { name, arguments, .. } => {
                self.end_line()?;
                writeln!(self.out, "  → {name} {arguments}")?;
            }
            AgentEvent::ToolCallFinished { name, status, output, .. } => {
                let mark = match status {
                    ToolStatus::Ok => "✓",
                    ToolStatus::Error => "✗",
                };
                writeln!(self.out, "  {mark} {name}: {}", output.to_text())?;
            }
            AgentEvent::Completed { metadata, .. } => {
                self.end_line()?;
                if let Some(meta) = metadata {
                    writeln!(self.out, "{}", usage_caption(meta))?;
                }
            }
            AgentEvent::Failed(err) => {
                self.end_line()?;
                writeln!(self.out, "error: {err}")?;
            }
            AgentEvent::Cancelled => {
                self.end_line()?;
                writeln!(self.out, "(cancelled)")?;
            }
        }
        self.out.flush()
    }

    pub fn render_usage(&mut self, tracker: &TokenTracker) -> io::Result<()> {
        let total = tracker.total();
        writeln!(
            self.out,
            "{} calls · {} in · {} out · {} cached",
            tracker.call_count(),
            thousands(total.input_tokens),
            thousands(total.output_tokens),
            thousands(total.cache_read_tokens),
        )
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        Ok(())
    }
}

/// One-line summary shown under each answer.
pub fn usage_caption(meta: &ResponseMetadata) -> String {
    let usage = &meta.usage;
    let mut parts = vec![format!(
        "{} in / {} out",
        thousands(usage.input_tokens),
        thousands(usage.output_tokens)
    )];
    if usage.cache_read_tokens > 0 {
        parts.push(format!("cache read {}", thousands(usage.cache_read_tokens)));
    }
    if usage.cache_write_tokens > 0 {
        parts.push(format!("cache write {}", thousands(usage.cache_write_tokens)));
    }
    if let Some(ms) = meta.latency_ms.filter(|&ms| ms > 0) {
        parts.push(format!("⏱️ {}ms", thousands(ms)));
    }
    match &meta.stop_reason {
        None | Some(StopReason::EndTurn) => {}
        Some(other) => parts.push(format!("stop: {other:?}")),
    }
    format!("[{}]", parts.join(" · "))
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
