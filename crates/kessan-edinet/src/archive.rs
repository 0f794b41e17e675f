//! Document archive handling.
//!
//! EDINET serves each submission (`type=1`) as a ZIP holding the XBRL
//! instance under `XBRL/PublicDoc/` next to the audit report, schemas and
//! linkbases.

use kessan_core::{DataError, Result};
use std::io::{Cursor, Read};

// Declared entry sizes come from the archive and are not trusted beyond this.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Returns the primary XBRL instance of a submission archive.
///
/// Prefers the first `.xbrl` under `PublicDoc/`, falling back to any `.xbrl`
/// entry. `None` when the archive holds no instance document.
pub fn extract_primary_xbrl(zip_bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| DataError::Parse(format!("Invalid document archive: {}", e)))?;

    let instances: Vec<String> = archive
        .file_names()
        .filter(|name| name.to_ascii_lowercase().ends_with(".xbrl"))
        .map(str::to_string)
        .collect();

    let chosen = instances
        .iter()
        .find(|name| name.contains("PublicDoc/"))
        .or_else(|| instances.first());

    let Some(name) = chosen else {
        return Ok(None);
    };

    let mut entry = archive
        .by_name(name)
        .map_err(|e| DataError::Parse(format!("Failed to open {}: {}", name, e)))?;
    let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn initial_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATION)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_prefers_public_doc() {
        let zip = archive(&[
            ("XBRL/AuditDoc/jpaud-aar-cn-001.xbrl", b"audit"),
            ("XBRL/PublicDoc/jpcrp030000-asr-001.xsd", b"schema"),
            ("XBRL/PublicDoc/jpcrp030000-asr-001.xbrl", b"instance"),
        ]);
        assert_eq!(extract_primary_xbrl(&zip).unwrap(), Some(b"instance".to_vec()));
    }

    #[test]
    fn test_falls_back_to_any_instance() {
        let zip = archive(&[("XBRL/AuditDoc/jpaud.XBRL", b"audit")]);
        assert_eq!(extract_primary_xbrl(&zip).unwrap(), Some(b"audit".to_vec()));
    }

    #[test]
    fn test_no_instance() {
        let zip = archive(&[("XBRL/PublicDoc/manifest.xml", b"<manifest/>")]);
        assert_eq!(extract_primary_xbrl(&zip).unwrap(), None);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            extract_primary_xbrl(b"<html>error</html>"),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(4096), 4096);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION as usize);
    }
}
