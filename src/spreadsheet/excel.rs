//! Office Open XML package helpers shared by workbook readers.
use crate::error::SheetError;
use crate::helpers::cfb::SIGNATURE;
use crate::helpers::xml::StartTagExt;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

pub(crate) type PackageReader = BufReader<File>;

/// Opens the zip package of a workbook, rejecting encrypted workbooks.
pub(super) fn open_package(path: &Path) -> Result<ZipArchive<PackageReader>, SheetError> {
    let mut reader = BufReader::new(File::open(path)?);
    if is_password_protected(&mut reader)? {
        Err(SpreadsheetError::PasswordProtected(path.display().to_string()))?;
    }
    Ok(ZipArchive::new(reader)?)
}

/// Loads worksheet relationships (id -> part path) from a `.rels` part.
pub(super) fn load_relationships(zip: &mut ZipArchive<PackageReader>, path: &str) -> Result<HashMap<String, String>, SheetError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
    let mut relationships = HashMap::<String, String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.attr("Id")?;
            let kind = event.attr("Type")?;
            let target = event.attr("Target")?;
            if kind.map(|kind| kind.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each cell style to the cell type its number format implies.
pub(super) fn resolve_number_formats(
    format_ids: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    is_1904: bool,
) -> Vec<CellType> {
    format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the package.
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

/// An `.xlsx` that is an OLE compound file instead of a zip is an encrypted package.
fn is_password_protected<R: Read + Seek>(reader: &mut R) -> Result<bool, SheetError> {
    let mut signature = [0u8; 8];
    let protected = match reader.read_exact(&mut signature) {
        Ok(()) => signature == SIGNATURE,
        Err(_) => false,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(protected)
}
