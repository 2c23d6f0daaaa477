//! Packet and message tracing
//!
//! The session reports what it sends and receives through a [`Tracer`]. The
//! default forwards to `tracing` under the `oracle_tns` target so a subscriber
//! filter like `RUST_LOG=oracle_tns=trace` turns on packet dumps.

use std::fmt::Write as _;
use std::sync::Arc;

/// Target used for every event emitted by the crate
pub const TRACE_TARGET: &str = "oracle_tns";

/// Sink for session diagnostics
pub trait Tracer: Send + Sync {
    /// Log a free-form message
    fn print(&self, msg: &str);

    /// Log a packet body under a label such as "Write packet:"
    fn log_packet(&self, label: &str, data: &[u8]);

    /// Whether packet dumps are worth formatting
    fn is_on(&self) -> bool {
        true
    }
}

/// Tracer that forwards to `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn print(&self, msg: &str) {
        tracing::debug!(target: "oracle_tns", "{}", msg);
    }

    fn log_packet(&self, label: &str, data: &[u8]) {
        if tracing::enabled!(target: "oracle_tns", tracing::Level::TRACE) {
            tracing::trace!(target: "oracle_tns", len = data.len(), "{}\n{}", label, hex_dump(data));
        }
    }

    fn is_on(&self) -> bool {
        tracing::enabled!(target: "oracle_tns", tracing::Level::TRACE)
    }
}

/// Tracer that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn print(&self, _msg: &str) {}

    fn log_packet(&self, _label: &str, _data: &[u8]) {}

    fn is_on(&self) -> bool {
        false
    }
}

/// Shared tracer handle held by sessions
pub type SharedTracer = Arc<dyn Tracer>;

/// Default tracer for new sessions
pub fn default_tracer() -> SharedTracer {
    Arc::new(TracingTracer)
}

/// Format bytes as 16-byte rows of hex followed by printable ASCII
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", row * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        for &b in chunk {
            out.push(if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}
