/// JSON format manifests.
///
/// A manifest names the root of a format tree. Value nodes are bare kind
/// names; every other node is a single-key object:
///
/// ```json
/// {
///   "root": {
///     "block": {
///       "loop": {
///         "count": "varuint32",
///         "body": { "sequence": ["varuint32", "uint32", { "action": 1 }] }
///       }
///     }
///   }
/// }
/// ```
///
/// ```text
/// ┌───────────────┬───────────────────────────────────────────────┐
/// │ Node          │ JSON                                          │
/// ├───────────────┼───────────────────────────────────────────────┤
/// │ value         │ "uint8" … "fixed_varuint64"                   │
/// │ action        │ { "action": <u32> }                           │
/// │ sequence      │ { "sequence": [<node>, …] }                   │
/// │ counted loop  │ { "loop": { "count": <kind>, "body": <node> } }│
/// │ block         │ { "block": <node> }                           │
/// │ until eof     │ { "until_eof": <node> }                       │
/// └───────────────┴───────────────────────────────────────────────┘
/// ```
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use cwasm_format::{Format, FormatBuilder, NodeId, ValueKind};

#[derive(serde::Deserialize)]
struct Manifest {
    root: NodeSpec,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NodeSpec {
    Value(String),
    Compound(CompoundSpec),
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum CompoundSpec {
    Action(u32),
    Sequence(Vec<NodeSpec>),
    Loop { count: String, body: Box<NodeSpec> },
    Block(Box<NodeSpec>),
    UntilEof(Box<NodeSpec>),
}

/// Read and build the format manifest at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or names an
/// unknown value kind.
pub fn load(path: &Path) -> Result<Arc<Format>> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let format = parse(&src).with_context(|| format!("bad format manifest {}", path.display()))?;
    Ok(Arc::new(format))
}

/// Build a format from manifest JSON.
///
/// # Errors
///
/// Returns an error on malformed JSON or an unknown value kind.
pub fn parse(src: &str) -> Result<Format> {
    let manifest: Manifest = serde_json::from_str(src)?;
    let mut builder = FormatBuilder::new();
    let root = build(&manifest.root, &mut builder)?;
    Ok(builder.finish(root)?)
}

pub fn parse_kind(name: &str) -> Result<ValueKind> {
    ValueKind::from_name(name).ok_or_else(|| anyhow!("unknown value kind {name:?}"))
}

/// Children are built before their parent, so every reference points
/// backwards.
fn build(spec: &NodeSpec, b: &mut FormatBuilder) -> Result<NodeId> {
    let id = match spec {
        NodeSpec::Value(name) => b.value(parse_kind(name)?),
        NodeSpec::Compound(CompoundSpec::Action(action)) => b.action(*action),
        NodeSpec::Compound(CompoundSpec::Sequence(children)) => {
            let ids = children
                .iter()
                .map(|c| build(c, b))
                .collect::<Result<Vec<_>>>()?;
            b.sequence(ids)
        }
        NodeSpec::Compound(CompoundSpec::Loop { count, body }) => {
            let count = parse_kind(count)?;
            let body = build(body, b)?;
            b.counted_loop(count, body)
        }
        NodeSpec::Compound(CompoundSpec::Block(body)) => {
            let body = build(body, b)?;
            b.block(body)
        }
        NodeSpec::Compound(CompoundSpec::UntilEof(body)) => {
            let body = build(body, b)?;
            b.until_eof(body)
        }
    };
    Ok(id)
}
