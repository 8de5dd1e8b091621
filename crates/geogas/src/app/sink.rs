//! Render targets for marker operations

use geogas_lib::{IconResolver, MarkerOp, RenderedMarker, ResourceNames};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Something that draws station markers
///
/// Operations arrive in application order. Sinks must only touch the
/// markers they are told about.
pub trait MapSink {
    fn apply(&mut self, ops: &[MarkerOp]) -> std::io::Result<()>;
}

/// Writes one JSON object per operation, with the icon resource name
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

#[derive(Serialize)]
struct OpLine<'a> {
    #[serde(flatten)]
    op: &'a MarkerOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_resource: Option<&'static str>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MapSink for JsonLinesSink<W> {
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn apply(&mut self, ops: &[MarkerOp]) -> std::io::Result<()> {
        for op in ops {
            let icon_resource = match op {
                MarkerOp::Create(marker) | MarkerOp::Update(marker) => Some(ResourceNames.resolve(marker.icon)),
                MarkerOp::Delete { .. } => None,
            };
            serde_json::to_writer(&mut self.writer, &OpLine { op, icon_resource })?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

/// Overlays drawn by the map itself, never touched by marker operations
pub const OVERLAYS: [&str; 3] = ["my_location", "compass", "scale_bar"];

/// In-memory map: fixed overlays plus the station markers
#[derive(Debug, Clone)]
pub struct MemoryMap {
    pub overlays: Vec<String>,
    pub markers: BTreeMap<String, RenderedMarker>,
    /// Number of operations applied so far
    pub applied: usize,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            overlays: OVERLAYS.iter().map(|s| s.to_string()).collect(),
            markers: BTreeMap::new(),
            applied: 0,
        }
    }
}

impl MapSink for MemoryMap {
    fn apply(&mut self, ops: &[MarkerOp]) -> std::io::Result<()> {
        for op in ops {
            match op {
                MarkerOp::Create(marker) | MarkerOp::Update(marker) => {
                    self.markers.insert(marker.id.clone(), marker.clone());
                }
                MarkerOp::Delete { id } => {
                    self.markers.remove(id);
                }
            }
        }
        self.applied += ops.len();
        Ok(())
    }
}
