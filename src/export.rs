//! CSV export of flat report tables.

use std::path::Path;

use serde::Serialize;

use crate::error::{OpsError, Result};

/// Serializes rows to CSV bytes with a header row taken from the field names.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| OpsError::Io(std::io::Error::other(e.to_string())))
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_csv(rows)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::capacity::CapacityRow;

    #[test]
    fn test_capacity_csv_renders_sentinel() {
        let rows = vec![CapacityRow {
            handler: None,
            op_type: Some("A".to_string()),
            open: 5,
            closed: 1,
            quota: 15,
            available: 10,
        }];
        let text = String::from_utf8(to_csv(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("handler,op_type,open,closed,quota,available"));
        assert_eq!(lines.next(), Some("NOT SPECIFIED,A,5,1,15,10"));
    }

    #[test]
    fn test_write_csv_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("empty.csv");
        write_csv::<CapacityRow>(&path, &[]).unwrap();
        assert!(path.exists());
    }
}
