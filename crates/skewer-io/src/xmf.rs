//! Plain-text XDMF companion describing a snapshot series.
//!
//! The companion is a temporal collection with one spatial collection per
//! snapshot. Each output strips the closing tags, appends its entry and
//! writes them back, so the file is well-formed between outputs.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use skewer_core::{ElementType, FieldMeta};

use crate::error::OutputError;
use crate::kind::PartKind;

const HEADER: &str = "<?xml version=\"1.0\" ?>\n\
<!DOCTYPE Xdmf SYSTEM \"Xdmf.dtd\" []>\n\
<Xdmf xmlns:xi=\"http://www.w3.org/2003/XInclude\" Version=\"2.1\">\n\
<Domain>\n\
<Grid Name=\"TimeSeries\" GridType=\"Collection\" CollectionType=\"Temporal\">\n";

const FOOTER: &str = "</Grid>\n</Domain>\n</Xdmf>\n";

/// One particle kind within a snapshot entry.
#[derive(Clone, Debug)]
pub struct XmfKind {
    /// The kind.
    pub kind: PartKind,
    /// Global number of particles.
    pub count: u64,
    /// Datasets written for the kind.
    pub fields: Vec<FieldMeta>,
}

/// One snapshot entry.
#[derive(Clone, Debug)]
pub struct XmfSnapshot {
    /// File name of the snapshot, relative to the companion.
    pub file_name: String,
    /// Simulation time of the snapshot.
    pub time: f64,
    /// Kinds with a non-zero count.
    pub kinds: Vec<XmfKind>,
}

/// The companion file of one snapshot series.
#[derive(Clone, Debug)]
pub struct XmfSeries {
    path: PathBuf,
}

impl XmfSeries {
    /// The companion at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The companion path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry`. A `first` entry starts a fresh file; later entries
    /// extend the existing one.
    pub fn append(&self, entry: &XmfSnapshot, first: bool) -> Result<(), OutputError> {
        let mut text = if first {
            HEADER.to_string()
        } else {
            let existing = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
            match existing.rfind(FOOTER) {
                Some(at) => existing[..at].to_string(),
                None => existing,
            }
        };
        render_entry(&mut text, entry);
        text.push_str(FOOTER);
        fs::write(&self.path, text).map_err(|e| self.error(e))?;
        tracing::debug!(path = %self.path.display(), file = %entry.file_name, "xmf entry appended");
        Ok(())
    }

    fn error(&self, e: std::io::Error) -> OutputError {
        OutputError::Xmf {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        }
    }
}

fn number_type(element: ElementType) -> (&'static str, usize) {
    let name = match element {
        ElementType::F32 | ElementType::F64 => "Float",
        ElementType::I32 | ElementType::I64 => "Int",
        ElementType::U32 | ElementType::U64 => "UInt",
        ElementType::U8 => "UChar",
    };
    (name, element.size())
}

/// Escape `text` for use in XML attribute values and character data.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_entry(out: &mut String, entry: &XmfSnapshot) {
    let file = escape(&entry.file_name);
    let _ = writeln!(
        out,
        "<Grid GridType=\"Collection\" CollectionType=\"Spatial\" Name=\"{file}\">"
    );
    let _ = writeln!(out, "<Time Type=\"Single\" Value=\"{:e}\"/>", entry.time);
    for kind in &entry.kinds {
        let group = escape(&kind.kind.group_name());
        let n = kind.count;
        let _ = writeln!(
            out,
            "<Grid Name=\"{}\" GridType=\"Uniform\">",
            group.trim_start_matches('/')
        );
        let _ = writeln!(
            out,
            "<Topology TopologyType=\"Polyvertex\" Dimensions=\"{n}\"/>"
        );
        let (coord_number, coord_precision) = kind
            .fields
            .iter()
            .find(|f| f.name == "Coordinates")
            .map_or(("Float", 8), |f| number_type(f.element));
        let _ = writeln!(out, "<Geometry GeometryType=\"XYZ\">");
        let _ = writeln!(
            out,
            "<DataItem Dimensions=\"{n} 3\" NumberType=\"{coord_number}\" \
             Precision=\"{coord_precision}\" Format=\"HDF\">{file}:{group}/Coordinates</DataItem>"
        );
        let _ = writeln!(out, "</Geometry>");
        for field in kind.fields.iter().filter(|f| f.name != "Coordinates") {
            let name = escape(&field.name);
            let (number, precision) = number_type(field.element);
            let (attribute, dims) = if field.dim == 1 {
                ("Scalar", n.to_string())
            } else {
                ("Vector", format!("{n} {}", field.dim))
            };
            let _ = writeln!(
                out,
                "<Attribute Name=\"{name}\" AttributeType=\"{attribute}\" Center=\"Node\">"
            );
            let _ = writeln!(
                out,
                "<DataItem Dimensions=\"{dims}\" NumberType=\"{number}\" \
                 Precision=\"{precision}\" Format=\"HDF\">{file}:{group}/{name}</DataItem>"
            );
            let _ = writeln!(out, "</Attribute>");
        }
        let _ = writeln!(out, "</Grid>");
    }
    let _ = writeln!(out, "</Grid>");
}
